//! Error types for the session layer.

use keyturn_protocol::SessionId;

/// Errors that can occur while creating, loading, or saving sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The team's size falls outside the room's `[min, max]` bounds.
    /// Rejected before any state is allocated.
    #[error("team size {actual} outside required range [{min}, {max}]")]
    TeamSizeRejected {
        min: usize,
        max: usize,
        actual: usize,
    },

    /// No session exists with the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// A session with this id is already stored.
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    /// The compare-and-swap on save failed: someone else committed a newer
    /// version after the caller read theirs. Re-fetch and retry.
    #[error("session {session}: concurrent modification (read version {expected}, stored {found})")]
    ConcurrentModification {
        session: SessionId,
        expected: u64,
        found: u64,
    },
}
