//! Errors raised while applying replicated state.

use flagrun_net::DecodeError;

use crate::field::FieldId;
use crate::ids::{EntityId, TeamId};

/// A server message that could not be applied to the local world.
///
/// None of these desynchronize the stream: the message was fully read, only
/// its effect is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The message names an entity this world does not hold.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The entity exists but has no field with this id.
    #[error("entity {entity} has no field {}", field.0)]
    UnknownField {
        /// Target entity.
        entity: EntityId,
        /// Missing field id.
        field: FieldId,
    },

    /// The message names a team this world does not hold.
    #[error("unknown {0}")]
    UnknownTeam(TeamId),

    /// A length-delimited field value did not parse.
    #[error("bad value for field {} of entity {entity}: {source}", field.0)]
    BadValue {
        /// Target entity.
        entity: EntityId,
        /// Target field.
        field: FieldId,
        /// Parse failure.
        #[source]
        source: DecodeError,
    },
}
