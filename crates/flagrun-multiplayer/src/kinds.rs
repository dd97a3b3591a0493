//! Per-type entity state: players, flags and static blocks.

use bytes::{BufMut, BytesMut};
use flagrun_net::{DecodeError, WireRead, WireWrite};
use glam::Vec2;
use rand::Rng;

use crate::field::{ErasedField, FieldIdAllocator, Outbox, ReplicatedField};
use crate::ids::{EntityId, TeamId};
use crate::input::KeyState;

// ---------------------------------------------------------------------------
// PlayerClass
// ---------------------------------------------------------------------------

/// Animal class, fixing a player's speed and starting health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerClass {
    /// Slow and sturdy.
    Elephant,
    /// Fast.
    Goat,
    /// Fast and fragile.
    Monkey,
    /// Middle of the road.
    Zebra,
}

impl PlayerClass {
    /// Every class, in wire-name order.
    pub const ALL: [PlayerClass; 4] = [Self::Elephant, Self::Goat, Self::Monkey, Self::Zebra];

    /// Name carried in the class field.
    pub fn name(self) -> &'static str {
        match self {
            Self::Elephant => "Elephant",
            Self::Goat => "Goat",
            Self::Monkey => "Monkey",
            Self::Zebra => "Zebra",
        }
    }

    /// Class for a name; unknown names fall back to [`PlayerClass::Goat`].
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|class| class.name() == name)
            .unwrap_or(Self::Goat)
    }

    /// Movement speed in velocity units.
    pub fn speed(self) -> f32 {
        match self {
            Self::Elephant => 2.0,
            Self::Goat | Self::Monkey => 5.0,
            Self::Zebra => 3.0,
        }
    }

    /// Starting health.
    pub fn max_health(self) -> i64 {
        match self {
            Self::Elephant => 300,
            Self::Goat => 150,
            Self::Monkey | Self::Zebra => 100,
        }
    }

    /// Uniformly random class.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Player box width and height.
pub const PLAYER_SIZE: f32 = 40.0;

/// Replicated player state. Fields are declared in wire order.
#[derive(Debug, Clone)]
pub struct Player {
    /// Flag being carried.
    pub held_flag: ReplicatedField<Option<EntityId>>,
    /// Gun orientation in degrees, clockwise from +y.
    pub orientation: ReplicatedField<f32>,
    /// Unit vector towards the mouse.
    pub aim: ReplicatedField<Vec2>,
    /// Set on every shot.
    pub muzzle_flash: ReplicatedField<bool>,
    /// Dead players neither collide nor move.
    pub is_dead: ReplicatedField<bool>,
    /// Remaining health.
    pub health: ReplicatedField<i64>,
    /// [`PlayerClass`] name.
    pub class_name: ReplicatedField<String>,
    /// Owning team.
    pub team: ReplicatedField<Option<TeamId>>,
    /// Held movement keys. Server-side input state, not replicated.
    pub keys: KeyState,
}

impl Player {
    pub(crate) fn declare(ids: &mut FieldIdAllocator, class: PlayerClass) -> Self {
        Self {
            held_flag: ReplicatedField::new(ids, None),
            orientation: ReplicatedField::new(ids, 0.0),
            aim: ReplicatedField::new(ids, Vec2::ONE.normalize()),
            muzzle_flash: ReplicatedField::new(ids, false),
            is_dead: ReplicatedField::new(ids, false),
            health: ReplicatedField::new(ids, class.max_health()),
            class_name: ReplicatedField::new(ids, class.name().to_owned()),
            team: ReplicatedField::new(ids, None),
            keys: KeyState::default(),
        }
    }

    /// Class named by the class field.
    pub fn class(&self) -> PlayerClass {
        PlayerClass::from_name(self.class_name.get())
    }

    /// Movement speed of the current class.
    pub fn speed(&self) -> f32 {
        self.class().speed()
    }

    /// Whether the player is dead.
    pub fn is_dead(&self) -> bool {
        *self.is_dead.get()
    }

    /// Switch class and reset health to the class maximum.
    pub fn set_class(&mut self, class: PlayerClass, outbox: &mut Outbox) {
        self.class_name.set(class.name().to_owned(), outbox);
        self.health.set(class.max_health(), outbox);
    }

    /// Point the gun from `position` towards `target`.
    ///
    /// A target on top of the player leaves the aim unchanged.
    pub fn aim_at(&mut self, position: Vec2, target: Vec2, outbox: &mut Outbox) {
        let aim = (target - position).normalize_or_zero();
        if aim == Vec2::ZERO {
            return;
        }
        self.aim.set(aim, outbox);
        self.orientation.set(orientation_degrees(aim), outbox);
    }

    pub(crate) fn fields(&self) -> [&dyn ErasedField; 8] {
        [
            &self.held_flag,
            &self.orientation,
            &self.aim,
            &self.muzzle_flash,
            &self.is_dead,
            &self.health,
            &self.class_name,
            &self.team,
        ]
    }

    pub(crate) fn fields_mut(&mut self) -> [&mut dyn ErasedField; 8] {
        [
            &mut self.held_flag,
            &mut self.orientation,
            &mut self.aim,
            &mut self.muzzle_flash,
            &mut self.is_dead,
            &mut self.health,
            &mut self.class_name,
            &mut self.team,
        ]
    }
}

/// Angle of `aim` in degrees, measured clockwise from +y, in `[0, 360)`.
pub fn orientation_degrees(aim: Vec2) -> f32 {
    let degrees = aim.x.atan2(aim.y).to_degrees();
    if degrees < 0.0 { degrees + 360.0 } else { degrees }
}

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

/// Flag box width and height.
pub const FLAG_SIZE: Vec2 = Vec2::new(16.0, 64.0);

/// Replicated flag state.
#[derive(Debug, Clone)]
pub struct Flag {
    /// Player carrying the flag.
    pub holder: ReplicatedField<Option<EntityId>>,
}

impl Flag {
    pub(crate) fn declare(ids: &mut FieldIdAllocator) -> Self {
        Self {
            holder: ReplicatedField::new(ids, None),
        }
    }
}

/// Capture region box width and height.
pub const CAPTURE_REGION_SIZE: f32 = 100.0;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Texture name boundaries always use.
pub const BOUNDARY_TEXTURE: &str = "boundary";

/// Static payload of textured blocks and boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Box width.
    pub width: i32,
    /// Box height.
    pub height: i32,
    /// Texture name.
    pub texture: String,
}

impl Block {
    /// Box extents as a vector.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.width);
        buf.put_i32(self.height);
        buf.put_string(&self.texture);
    }

    pub(crate) fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            width: buf.read_int()?,
            height: buf.read_int()?,
            texture: buf.read_string()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldId, Role};

    #[test]
    fn test_class_table() {
        assert_eq!(PlayerClass::Elephant.speed(), 2.0);
        assert_eq!(PlayerClass::Elephant.max_health(), 300);
        assert_eq!(PlayerClass::Goat.max_health(), 150);
        assert_eq!(PlayerClass::Monkey.speed(), 5.0);
        assert_eq!(PlayerClass::Zebra.speed(), 3.0);
        assert_eq!(PlayerClass::from_name("Zebra"), PlayerClass::Zebra);
        assert_eq!(PlayerClass::from_name("Unicorn"), PlayerClass::Goat);
    }

    #[test]
    fn test_random_class_is_valid() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let class = PlayerClass::random(&mut rng);
            assert!(PlayerClass::ALL.contains(&class));
        }
    }

    #[test]
    fn test_orientation_clockwise_from_up() {
        assert!((orientation_degrees(Vec2::Y) - 0.0).abs() < 1e-4);
        assert!((orientation_degrees(Vec2::X) - 90.0).abs() < 1e-4);
        assert!((orientation_degrees(-Vec2::Y) - 180.0).abs() < 1e-4);
        assert!((orientation_degrees(-Vec2::X) - 270.0).abs() < 1e-4);
    }

    #[test]
    fn test_aim_at_sets_aim_and_orientation() {
        let mut ids = FieldIdAllocator::new();
        let mut outbox = Outbox::new(Role::Server);
        let mut player = Player::declare(&mut ids, PlayerClass::Goat);

        player.aim_at(Vec2::new(10.0, 10.0), Vec2::new(20.0, 10.0), &mut outbox);

        assert_eq!(*player.aim.get(), Vec2::X);
        assert!((player.orientation.get() - 90.0).abs() < 1e-4);
        let queued: Vec<FieldId> = outbox.drain().into_iter().map(|(id, _)| id).collect();
        assert_eq!(queued, vec![player.aim.id(), player.orientation.id()]);
    }

    #[test]
    fn test_aim_at_own_position_is_ignored() {
        let mut ids = FieldIdAllocator::new();
        let mut outbox = Outbox::new(Role::Server);
        let mut player = Player::declare(&mut ids, PlayerClass::Goat);
        let before = *player.aim.get();

        player.aim_at(Vec2::ONE, Vec2::ONE, &mut outbox);

        assert_eq!(*player.aim.get(), before);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_set_class_resets_health() {
        let mut ids = FieldIdAllocator::new();
        let mut outbox = Outbox::new(Role::Server);
        let mut player = Player::declare(&mut ids, PlayerClass::Monkey);
        player.health.set(3, &mut outbox);

        player.set_class(PlayerClass::Elephant, &mut outbox);

        assert_eq!(player.class(), PlayerClass::Elephant);
        assert_eq!(*player.health.get(), 300);
    }
}
