//! Map descriptions loaded from RON files.
//!
//! A map lists the background texture, the teams with their spawn points and
//! capture regions, and the static entities. Building an entity from a
//! description goes through the same constructors as direct spawning, so the
//! field layout matches what clients decode.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::field::Role;
use crate::ids::{EntityId, TeamId};
use crate::kinds::Block;
use crate::world::{DEFAULT_BACKGROUND, World};

/// Errors raised while loading a map file.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Failed to read the map file.
    #[error("failed to read map file {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid map description.
    #[error("failed to parse map file {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// RON error with position.
        #[source]
        source: ron::error::SpannedError,
    },
}

/// One team slot on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDescription {
    /// Display name.
    pub name: String,
    /// Where members spawn.
    pub spawn: Vec2,
    /// Centre of the team's capture region.
    pub capture_region: Vec2,
}

/// One static entity on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityDescription {
    /// A textured obstacle.
    TexturedBlock {
        /// Centre.
        position: Vec2,
        /// Box width.
        width: i32,
        /// Box height.
        height: i32,
        /// Texture name.
        texture: String,
    },
    /// A map edge.
    Boundary {
        /// Centre.
        position: Vec2,
        /// Box width.
        width: i32,
        /// Box height.
        height: i32,
    },
    /// A flag resting on the ground.
    Flag {
        /// Centre.
        position: Vec2,
    },
    /// A capture region not owned by any team.
    FlagCaptureRegion {
        /// Centre.
        position: Vec2,
    },
}

impl EntityDescription {
    /// Construct the described entity for `role`.
    pub fn build(&self, role: Role) -> Entity {
        match self {
            Self::TexturedBlock {
                position,
                width,
                height,
                texture,
            } => Entity::textured_block(
                role,
                *position,
                Block {
                    width: *width,
                    height: *height,
                    texture: texture.clone(),
                },
            ),
            Self::Boundary {
                position,
                width,
                height,
            } => Entity::boundary(role, *position, *width, *height),
            Self::Flag { position } => Entity::flag(role, *position),
            Self::FlagCaptureRegion { position } => Entity::capture_region(role, *position),
        }
    }
}

/// A whole map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDescription {
    /// Background texture name.
    pub background: String,
    /// Teams in id order.
    pub teams: Vec<TeamDescription>,
    /// Static entities.
    pub entities: Vec<EntityDescription>,
}

impl Default for MapDescription {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND.to_owned(),
            teams: Vec::new(),
            entities: Vec::new(),
        }
    }
}

impl MapDescription {
    /// Parse a map from RON text.
    pub fn from_ron(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }

    /// Read and parse a map file.
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path).map_err(|source| MapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&contents).map_err(|source| MapError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Two teams facing each other in a walled 1600×1000 field.
    pub fn default_arena() -> Self {
        let half_width = 800.0;
        let half_height = 500.0;
        let wall = 20;

        let mut entities = vec![
            EntityDescription::Boundary {
                position: Vec2::new(0.0, half_height),
                width: 1600,
                height: wall,
            },
            EntityDescription::Boundary {
                position: Vec2::new(0.0, -half_height),
                width: 1600,
                height: wall,
            },
            EntityDescription::Boundary {
                position: Vec2::new(-half_width, 0.0),
                width: wall,
                height: 1000,
            },
            EntityDescription::Boundary {
                position: Vec2::new(half_width, 0.0),
                width: wall,
                height: 1000,
            },
        ];
        for y in [-200.0, 200.0] {
            entities.push(EntityDescription::TexturedBlock {
                position: Vec2::new(0.0, y),
                width: 60,
                height: 160,
                texture: "crate".to_owned(),
            });
        }
        entities.push(EntityDescription::Flag {
            position: Vec2::ZERO,
        });

        Self {
            background: DEFAULT_BACKGROUND.to_owned(),
            teams: vec![
                TeamDescription {
                    name: "Red".to_owned(),
                    spawn: Vec2::new(-650.0, 0.0),
                    capture_region: Vec2::new(-700.0, 380.0),
                },
                TeamDescription {
                    name: "Blue".to_owned(),
                    spawn: Vec2::new(650.0, 0.0),
                    capture_region: Vec2::new(700.0, -380.0),
                },
            ],
            entities,
        }
    }

    /// Register the map's teams, capture regions and entities in `world`.
    ///
    /// Returns the ids of every registered entity.
    pub fn populate(&self, world: &mut World) -> Vec<EntityId> {
        let role = world.role();
        world.set_background(self.background.clone());

        let mut registered = Vec::new();
        for team in &self.teams {
            let id: TeamId = world.teams.create(team.name.clone(), team.spawn);
            let region = world
                .registry
                .register(Entity::capture_region(role, team.capture_region));
            if let Some(team) = world.teams.get_mut(id) {
                team.capture_region = Some(region);
            }
            registered.push(region);
        }

        for description in &self.entities {
            registered.push(world.registry.register(description.build(role)));
        }

        tracing::info!(
            teams = self.teams.len(),
            entities = registered.len(),
            background = %self.background,
            "Map loaded"
        );
        registered
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bytes::BytesMut;

    use super::*;
    use crate::kinds::PlayerClass;

    #[test]
    fn test_default_arena_populates_world() {
        let mut world = World::new(Role::Server);
        let ids = MapDescription::default_arena().populate(&mut world);

        assert_eq!(world.teams.len(), 2);
        assert_eq!(world.registry.len(), ids.len());
        for team in world.teams.iter() {
            let region = team.capture_region.and_then(|id| world.entity(id));
            assert!(region.is_some(), "{} has no capture region", team.name);
        }
    }

    #[test]
    fn test_field_ids_agree_across_creation_paths() {
        let from_map = EntityDescription::Flag {
            position: Vec2::new(4.0, 4.0),
        }
        .build(Role::Server);
        let direct = Entity::flag(Role::Server, Vec2::new(4.0, 4.0));

        let mut buf = BytesMut::new();
        direct.encode(&mut buf);
        let mut cursor: &[u8] = &buf;
        let streamed = Entity::decode(&mut cursor).unwrap();

        assert_eq!(from_map.field_ids(), direct.field_ids());
        assert_eq!(streamed.field_ids(), direct.field_ids());

        let block = EntityDescription::Boundary {
            position: Vec2::ZERO,
            width: 5,
            height: 5,
        }
        .build(Role::Server);
        assert_eq!(block.field_ids(), Entity::boundary(Role::Server, Vec2::ZERO, 5, 5).field_ids());

        let player = Entity::player(Role::Server, Vec2::ZERO, PlayerClass::Zebra);
        let mut buf = BytesMut::new();
        player.encode(&mut buf);
        let mut cursor: &[u8] = &buf;
        assert_eq!(Entity::decode(&mut cursor).unwrap().field_ids(), player.field_ids());
    }

    #[test]
    fn test_load_map_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(
                background: "sand",
                teams: [(name: "Solo", spawn: (10.0, 0.0), capture_region: (0.0, 0.0))],
                entities: [Flag(position: (1.0, 2.0))],
            )"#
        )
        .unwrap();

        let map = MapDescription::load(file.path()).unwrap();
        assert_eq!(map.background, "sand");
        assert_eq!(map.teams[0].spawn, Vec2::new(10.0, 0.0));
        assert_eq!(
            map.entities,
            vec![EntityDescription::Flag {
                position: Vec2::new(1.0, 2.0)
            }]
        );
    }

    #[test]
    fn test_bad_map_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not a map").unwrap();
        let err = MapDescription::load(file.path()).unwrap_err();
        assert!(matches!(err, MapError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse map file"));
    }

    #[test]
    fn test_missing_sections_default() {
        let map = MapDescription::from_ron("(teams: [])").unwrap();
        assert_eq!(map.background, DEFAULT_BACKGROUND);
        assert!(map.entities.is_empty());
    }
}
