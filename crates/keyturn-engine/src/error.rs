//! Error types for the progression engine.

use keyturn_protocol::{RoomId, SessionId};
use keyturn_session::SessionStatus;

use crate::Transition;

/// Errors produced by progression-engine operations.
///
/// Per the error taxonomy: `StaleSubmission` is recoverable by re-fetching
/// current state; `SessionNotActive` and `SessionExpired` are terminal-state
/// failures; `NoMoreHints` and `StageOutOfRange` are validation failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The session is in a state that accepts no operations.
    #[error("session {session} is not active (status {status})")]
    SessionNotActive {
        session: SessionId,
        status: SessionStatus,
    },

    /// The room's time limit elapsed before this call. The carried
    /// [`Transition`] moves the session to `TimedOut` and emits the
    /// `SessionTimedOut` event — the caller must still commit and broadcast
    /// it even though the triggering operation itself failed.
    #[error("session {session} exceeded the room's time limit")]
    SessionExpired {
        session: SessionId,
        timeout: Box<Transition>,
    },

    /// The submission targeted a stage other than the current one.
    /// Protects against out-of-order client replays; re-fetch and retry.
    #[error("stale submission for stage {submitted}; current stage is {current}")]
    StaleSubmission { submitted: usize, current: usize },

    /// Every hint for this stage has already been revealed.
    #[error("no more hints for stage {stage_index} (all {available} revealed)")]
    NoMoreHints {
        stage_index: usize,
        available: usize,
    },

    /// The stage index doesn't exist in this room. Indicates a session
    /// paired with the wrong room definition.
    #[error("stage index {index} out of range for room {room}")]
    StageOutOfRange { room: RoomId, index: usize },
}
