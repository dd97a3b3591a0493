//! Entities: identity, position, replicated fields and motion.
//!
//! The set of entity types is closed. Each type declares its fields in one
//! fixed order inside [`Entity::build`], which every construction path goes
//! through:
//!
//! - direct construction on the server ([`Entity::player`] and friends),
//! - decoding a creation record on the client ([`Entity::decode`]),
//! - building from a map description ([`crate::map::EntityDescription`]).
//!
//! so a field id means the same thing on both ends of the connection.

use bytes::{BufMut, Bytes, BytesMut};
use flagrun_net::{DecodeError, WireRead, WireWrite};
use flagrun_physics::{Body, BodyClass};
use glam::Vec2;

use crate::error::ApplyError;
use crate::field::{ErasedField, FieldId, FieldIdAllocator, Outbox, ReplicatedField, Role};
use crate::ids::EntityId;
use crate::kinds::{
    BOUNDARY_TEXTURE, Block, CAPTURE_REGION_SIZE, FLAG_SIZE, Flag, PLAYER_SIZE, Player,
    PlayerClass,
};
use crate::reconciliation::{Kinematics, MotionReconciler, ReconcileOutcome, ReconcilerConfig};
use crate::velocity::VelocitySnapshot;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Closed set of entity types, named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// A player avatar.
    Player,
    /// A carryable flag.
    Flag,
    /// A team's flag drop zone.
    FlagCaptureRegion,
    /// A solid textured obstacle.
    TexturedBlock,
    /// A solid map edge.
    Boundary,
}

impl EntityType {
    /// Every type.
    pub const ALL: [EntityType; 5] = [
        Self::Player,
        Self::Flag,
        Self::FlagCaptureRegion,
        Self::TexturedBlock,
        Self::Boundary,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Flag => "Flag",
            Self::FlagCaptureRegion => "FlagCaptureRegion",
            Self::TexturedBlock => "TexturedBlock",
            Self::Boundary => "Boundary",
        }
    }

    /// Type for a wire name.
    pub fn from_name(name: &str) -> Result<Self, DecodeError> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| DecodeError::UnknownEntityType(name.to_owned()))
    }

    /// Whether entities of this type carry velocity.
    pub fn is_moveable(self) -> bool {
        matches!(self, Self::Player | Self::Flag)
    }
}

/// Type-specific state.
#[derive(Debug, Clone)]
pub enum EntityKind {
    /// See [`Player`].
    Player(Player),
    /// See [`Flag`].
    Flag(Flag),
    /// No extra state.
    FlagCaptureRegion,
    /// Static block payload.
    TexturedBlock(Block),
    /// Static block payload with the boundary texture.
    Boundary(Block),
}

impl EntityKind {
    /// Type tag of this state.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Player(_) => EntityType::Player,
            Self::Flag(_) => EntityType::Flag,
            Self::FlagCaptureRegion => EntityType::FlagCaptureRegion,
            Self::TexturedBlock(_) => EntityType::TexturedBlock,
            Self::Boundary(_) => EntityType::Boundary,
        }
    }

    fn fields(&self) -> Vec<&dyn ErasedField> {
        match self {
            Self::Player(player) => player.fields().to_vec(),
            Self::Flag(flag) => vec![&flag.holder],
            Self::FlagCaptureRegion | Self::TexturedBlock(_) | Self::Boundary(_) => Vec::new(),
        }
    }

    fn fields_mut(&mut self) -> Vec<&mut dyn ErasedField> {
        match self {
            Self::Player(player) => player.fields_mut().into_iter().collect(),
            Self::Flag(flag) => vec![&mut flag.holder],
            Self::FlagCaptureRegion | Self::TexturedBlock(_) | Self::Boundary(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Velocity state of a moveable entity.
#[derive(Debug, Clone)]
pub struct Motion {
    /// Replicated snapshot of the last server-side velocity change.
    snapshot: ReplicatedField<VelocitySnapshot>,
    velocity: Vec2,
    /// Local velocity change counter, compared against snapshot sequences.
    sequence: i32,
    prediction_error: Option<Vec2>,
    predicted: bool,
    reconciler: MotionReconciler,
}

impl Motion {
    fn declare(ids: &mut FieldIdAllocator) -> Self {
        Self {
            snapshot: ReplicatedField::new(ids, VelocitySnapshot::default()),
            velocity: Vec2::ZERO,
            sequence: 0,
            prediction_error: None,
            predicted: false,
            reconciler: MotionReconciler::new(),
        }
    }

    /// Last snapshot set or received.
    pub fn snapshot(&self) -> &VelocitySnapshot {
        self.snapshot.get()
    }

    /// Local velocity sequence.
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Correction waiting for the next local velocity change.
    pub fn prediction_error(&self) -> Option<Vec2> {
        self.prediction_error
    }

    /// Snapshot queue and playback state.
    pub fn reconciler(&self) -> &MotionReconciler {
        &self.reconciler
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One object in a world.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    position: ReplicatedField<Vec2>,
    motion: Option<Motion>,
    kind: EntityKind,
    outbox: Outbox,
}

impl Entity {
    fn build(
        role: Role,
        id: EntityId,
        position: Vec2,
        moveable: bool,
        declare: impl FnOnce(&mut FieldIdAllocator) -> EntityKind,
    ) -> Self {
        let mut ids = FieldIdAllocator::new();
        let position = ReplicatedField::new(&mut ids, position);
        let motion = if moveable {
            Some(Motion::declare(&mut ids))
        } else {
            None
        };
        let kind = declare(&mut ids);
        Self {
            id,
            position,
            motion,
            kind,
            outbox: Outbox::new(role),
        }
    }

    fn unregistered(
        role: Role,
        position: Vec2,
        ty: EntityType,
        declare: impl FnOnce(&mut FieldIdAllocator) -> EntityKind,
    ) -> Self {
        Self::build(
            role,
            EntityId(EntityId::NONE),
            position,
            ty.is_moveable(),
            declare,
        )
    }

    /// A living player of `class`.
    pub fn player(role: Role, position: Vec2, class: PlayerClass) -> Self {
        Self::unregistered(role, position, EntityType::Player, |ids| {
            EntityKind::Player(Player::declare(ids, class))
        })
    }

    /// An unheld flag.
    pub fn flag(role: Role, position: Vec2) -> Self {
        Self::unregistered(role, position, EntityType::Flag, |ids| {
            EntityKind::Flag(Flag::declare(ids))
        })
    }

    /// A capture region.
    pub fn capture_region(role: Role, position: Vec2) -> Self {
        Self::unregistered(role, position, EntityType::FlagCaptureRegion, |_| {
            EntityKind::FlagCaptureRegion
        })
    }

    /// A textured obstacle.
    pub fn textured_block(role: Role, position: Vec2, block: Block) -> Self {
        Self::unregistered(role, position, EntityType::TexturedBlock, |_| {
            EntityKind::TexturedBlock(block)
        })
    }

    /// A map edge of the given extents.
    pub fn boundary(role: Role, position: Vec2, width: i32, height: i32) -> Self {
        Self::unregistered(role, position, EntityType::Boundary, |_| {
            EntityKind::Boundary(Block {
                width,
                height,
                texture: BOUNDARY_TEXTURE.to_owned(),
            })
        })
    }

    /// Decode one creation record (type name, id, fields, static payload)
    /// into a client-side entity.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let ty = EntityType::from_name(&buf.read_string()?)?;
        let id = EntityId(buf.read_int()?);

        let placeholder = Block {
            width: 0,
            height: 0,
            texture: String::new(),
        };
        let mut entity = Self::build(Role::Client, id, Vec2::ZERO, ty.is_moveable(), |ids| {
            match ty {
                EntityType::Player => EntityKind::Player(Player::declare(ids, PlayerClass::Goat)),
                EntityType::Flag => EntityKind::Flag(Flag::declare(ids)),
                EntityType::FlagCaptureRegion => EntityKind::FlagCaptureRegion,
                EntityType::TexturedBlock => EntityKind::TexturedBlock(placeholder),
                EntityType::Boundary => EntityKind::Boundary(placeholder),
            }
        });

        for field in entity.fields_mut() {
            field.decode_value(buf)?;
        }
        match &mut entity.kind {
            EntityKind::TexturedBlock(block) | EntityKind::Boundary(block) => {
                *block = Block::decode(buf)?;
            }
            _ => {}
        }

        if let Some(motion) = entity.motion.as_mut() {
            let snapshot = *motion.snapshot.get();
            motion.velocity = snapshot.velocity;
            motion.sequence = snapshot.sequence;
        }
        Ok(entity)
    }

    /// Append this entity's creation record.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_string(self.entity_type().name());
        buf.put_i32(self.id.0);
        for field in self.fields() {
            field.encode_value(buf);
        }
        if let EntityKind::TexturedBlock(block) | EntityKind::Boundary(block) = &self.kind {
            block.encode(buf);
        }
    }

    // -- identity ----------------------------------------------------------

    /// Server-assigned id; `-1` until registered.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Assign the server id. Registries do this on registration.
    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Type tag.
    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    /// Side this entity lives on.
    pub fn role(&self) -> Role {
        self.outbox.role()
    }

    /// Type-specific state.
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Player state, if this is a player.
    pub fn as_player(&self) -> Option<&Player> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Mutable player state and outbox, if this is a player.
    pub fn player_mut(&mut self) -> Option<(&mut Player, &mut Outbox)> {
        match &mut self.kind {
            EntityKind::Player(player) => Some((player, &mut self.outbox)),
            _ => None,
        }
    }

    // -- fields ------------------------------------------------------------

    /// Every field in declaration order, starting with position.
    pub fn fields(&self) -> Vec<&dyn ErasedField> {
        let mut fields: Vec<&dyn ErasedField> = vec![&self.position];
        if let Some(motion) = &self.motion {
            fields.push(&motion.snapshot);
        }
        fields.extend(self.kind.fields());
        fields
    }

    fn fields_mut(&mut self) -> Vec<&mut dyn ErasedField> {
        let mut fields: Vec<&mut dyn ErasedField> = vec![&mut self.position];
        if let Some(motion) = &mut self.motion {
            fields.push(&mut motion.snapshot);
        }
        fields.extend(self.kind.fields_mut());
        fields
    }

    /// Field ids in declaration order.
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields().iter().map(|field| field.id()).collect()
    }

    /// Apply one replicated value received from the server.
    ///
    /// `value` must hold exactly one encoded value. A new velocity snapshot
    /// is queued on the reconciler.
    pub fn apply_update(
        &mut self,
        field: FieldId,
        value: &[u8],
        config: &ReconcilerConfig,
    ) -> Result<(), ApplyError> {
        let entity = self.id;
        let bad_value = |source| ApplyError::BadValue {
            entity,
            field,
            source,
        };

        let target = self
            .fields_mut()
            .into_iter()
            .find(|candidate| candidate.id() == field)
            .ok_or(ApplyError::UnknownField { entity, field })?;

        let mut cursor = value;
        target.decode_value(&mut cursor).map_err(bad_value)?;
        if !cursor.is_empty() {
            return Err(bad_value(DecodeError::LengthMismatch {
                declared: value.len(),
                consumed: value.len() - cursor.len(),
            }));
        }

        if let Some(motion) = self.motion.as_mut() {
            if motion.snapshot.id() == field {
                let snapshot = *motion.snapshot.get();
                motion.reconciler.receive(snapshot, config.movement_delay_ms);
            }
        }
        Ok(())
    }

    /// Take every value set since the last call, clearing dirty flags.
    pub fn take_updates(&mut self) -> Vec<(FieldId, Bytes)> {
        if self.outbox.is_empty() {
            return Vec::new();
        }
        for field in self.fields_mut() {
            field.clear_dirty();
        }
        self.outbox.drain()
    }

    // -- position / motion -------------------------------------------------

    /// Current position.
    pub fn position(&self) -> Vec2 {
        *self.position.get()
    }

    /// Set the position; broadcast on the server.
    pub fn set_position(&mut self, position: Vec2) {
        self.position.set(position, &mut self.outbox);
    }

    /// Set the position without broadcasting (physics steps).
    pub fn set_local_position(&mut self, position: Vec2) {
        self.position.set_local(position);
    }

    /// Whether this entity carries velocity.
    pub fn is_moveable(&self) -> bool {
        self.motion.is_some()
    }

    /// Motion state of a moveable entity.
    pub fn motion(&self) -> Option<&Motion> {
        self.motion.as_ref()
    }

    /// Current velocity; zero for static entities.
    pub fn velocity(&self) -> Vec2 {
        self.motion.as_ref().map_or(Vec2::ZERO, |motion| motion.velocity)
    }

    /// Change velocity at server time `now`.
    ///
    /// On the server a new snapshot (next sequence, current position) is
    /// broadcast even if the velocity did not change. A predicted entity
    /// bumps its local sequence and applies any stored prediction error.
    pub fn set_velocity(&mut self, velocity: Vec2, now: i64) {
        let position = *self.position.get();
        let Some(motion) = self.motion.as_mut() else {
            return;
        };

        if self.outbox.role() == Role::Server {
            let sequence = motion.snapshot.get().sequence + 1;
            let snapshot = VelocitySnapshot::new(position, velocity, now, sequence);
            motion.snapshot.set(snapshot, &mut self.outbox);
        }

        if motion.predicted {
            motion.sequence += 1;
            if let Some(error) = motion.prediction_error.take() {
                self.position.set_local(position + error);
            }
        }

        motion.velocity = velocity;
    }

    /// Whether the local client predicts this entity.
    pub fn is_predicted(&self) -> bool {
        self.motion.as_ref().is_some_and(|motion| motion.predicted)
    }

    /// Mark this entity as locally predicted.
    pub fn set_predicted(&mut self, predicted: bool) {
        if let Some(motion) = self.motion.as_mut() {
            motion.predicted = predicted;
        }
    }

    /// Run one frame of snapshot reconciliation.
    ///
    /// `simulate(start, velocity, elapsed_ms)` must step this entity through
    /// the current world.
    pub fn reconcile<F>(&mut self, config: &ReconcilerConfig, now: i64, simulate: F) -> ReconcileOutcome
    where
        F: FnOnce(Vec2, Vec2, f32) -> Vec2,
    {
        let active = self.is_active();
        let position = *self.position.get();
        let Some(motion) = self.motion.as_mut() else {
            return ReconcileOutcome::Idle;
        };

        let mut kinematics = Kinematics {
            position,
            velocity: motion.velocity,
            sequence: motion.sequence,
            prediction_error: motion.prediction_error,
        };
        let outcome = motion.reconciler.update(
            config,
            now,
            active,
            motion.predicted,
            &mut kinematics,
            simulate,
        );

        motion.velocity = kinematics.velocity;
        motion.sequence = kinematics.sequence;
        motion.prediction_error = kinematics.prediction_error;
        self.position.set_local(kinematics.position);
        outcome
    }

    // -- collision ---------------------------------------------------------

    /// Box width and height.
    pub fn size(&self) -> Vec2 {
        match &self.kind {
            EntityKind::Player(_) => Vec2::splat(PLAYER_SIZE),
            EntityKind::Flag(_) => FLAG_SIZE,
            EntityKind::FlagCaptureRegion => Vec2::splat(CAPTURE_REGION_SIZE),
            EntityKind::TexturedBlock(block) | EntityKind::Boundary(block) => block.size(),
        }
    }

    /// Whether the entity takes part in the simulation at all.
    pub fn is_active(&self) -> bool {
        match &self.kind {
            EntityKind::Player(player) => !player.is_dead(),
            _ => true,
        }
    }

    /// Whether the entity blocks other solid entities.
    pub fn is_solid(&self) -> bool {
        match &self.kind {
            EntityKind::Player(player) => !player.is_dead(),
            EntityKind::Flag(_) | EntityKind::FlagCaptureRegion => false,
            EntityKind::TexturedBlock(_) | EntityKind::Boundary(_) => true,
        }
    }

    /// Whether the entity receives touch events.
    pub fn is_touchable(&self) -> bool {
        match &self.kind {
            EntityKind::Player(player) => !player.is_dead(),
            EntityKind::Flag(_) | EntityKind::FlagCaptureRegion => true,
            EntityKind::TexturedBlock(_) | EntityKind::Boundary(_) => false,
        }
    }

    /// Collision view for the movement stepper.
    pub fn body(&self) -> Body {
        Body {
            id: self.id.0,
            position: self.position(),
            size: self.size(),
            solid: self.is_solid(),
            touchable: self.is_touchable(),
            class: match self.kind {
                EntityKind::Player(_) => BodyClass::Player,
                _ => BodyClass::Other,
            },
        }
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
