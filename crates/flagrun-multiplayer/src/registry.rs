//! Entity storage, lookup by id, and deferred removal.

use flagrun_physics::Body;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::entity::Entity;
use crate::ids::EntityId;

/// All live entities of one world, in registration order.
///
/// Removal is deferred: [`mark_dead`](Self::mark_dead) queues an id and
/// [`sweep_dead`](Self::sweep_dead) removes the queued entities at the end
/// of a tick, so ids stay valid for the rest of the tick.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    index: FxHashMap<EntityId, usize>,
    dead: Vec<EntityId>,
    dead_set: FxHashSet<EntityId>,
    next_id: i32,
}

impl EntityRegistry {
    /// Empty registry; the first assigned id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id to `entity` and store it (server).
    pub fn register(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        entity.set_id(id);
        self.push(entity);
        id
    }

    /// Store an entity that already carries a server id (client).
    ///
    /// Returns `false` and drops `entity` when the id is taken.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.index.contains_key(&entity.id()) {
            return false;
        }
        self.push(entity);
        true
    }

    fn push(&mut self, entity: Entity) {
        self.index.insert(entity.id(), self.entities.len());
        self.entities.push(entity);
    }

    /// Entity with `id`.
    pub fn lookup(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&slot| &self.entities[slot])
    }

    /// Mutable entity with `id`.
    pub fn lookup_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(&id)?;
        self.entities.get_mut(slot)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Queue `id` for removal at the next sweep. Repeated marks are ignored.
    pub fn mark_dead(&mut self, id: EntityId) {
        if self.dead_set.insert(id) {
            self.dead.push(id);
        }
    }

    /// Ids queued for removal, in marking order.
    pub fn pending_dead(&self) -> &[EntityId] {
        &self.dead
    }

    /// Remove every queued entity and return them, in marking order.
    ///
    /// Ids that are not registered are skipped.
    pub fn sweep_dead(&mut self) -> Vec<Entity> {
        if self.dead.is_empty() {
            return Vec::new();
        }
        let dead = std::mem::take(&mut self.dead);
        self.dead_set.clear();

        let mut removed: Vec<Option<Entity>> = Vec::with_capacity(dead.len());
        let mut kept = Vec::with_capacity(self.entities.len());
        let mut slots: FxHashMap<EntityId, usize> = FxHashMap::default();
        for (position, id) in dead.iter().enumerate() {
            slots.insert(*id, position);
            removed.push(None);
        }

        for entity in self.entities.drain(..) {
            match slots.get(&entity.id()) {
                Some(&position) => removed[position] = Some(entity),
                None => kept.push(entity),
            }
        }

        self.entities = kept;
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(slot, entity)| (entity.id(), slot))
            .collect();

        removed.into_iter().flatten().collect()
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Mutable entities in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Collision bodies of every active entity.
    pub fn bodies(&self) -> Vec<Body> {
        self.entities
            .iter()
            .filter(|entity| entity.is_active())
            .map(Entity::body)
            .collect()
    }

    /// Drop every entity and pending removal. Id assignment continues.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
        self.dead.clear();
        self.dead_set.clear();
    }
}
