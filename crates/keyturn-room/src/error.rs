//! Error types for the room layer.

use keyturn_protocol::RoomId;

/// Errors that can occur while loading or validating room definitions.
///
/// Everything except `NotFound` is a structural defect in the definition
/// itself, caught at load time so it can never corrupt an in-flight session.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room has no stages at all.
    #[error("room {0} has no stages")]
    NoStages(RoomId),

    /// Two stages share the same order value.
    #[error("room {room} has duplicate stage order {order}")]
    DuplicateStageOrder { room: RoomId, order: u32 },

    /// Team size bounds are unsatisfiable (requires 1 ≤ min ≤ max).
    #[error("room {room} has invalid team bounds [{min}, {max}]")]
    InvalidTeamBounds { room: RoomId, min: usize, max: usize },

    /// The time limit is zero seconds. Use `None` for untimed rooms.
    #[error("room {0} has a zero time limit")]
    InvalidTimeLimit(RoomId),

    /// A hotspot references a stage or item that doesn't exist.
    #[error("room {room}: hotspot {hotspot} targets missing {target}")]
    DanglingHotspot {
        room: RoomId,
        hotspot: String,
        target: String,
    },
}
