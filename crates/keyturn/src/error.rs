//! Unified error type for the Keyturn service layer.

use keyturn_engine::EngineError;
use keyturn_protocol::SessionId;
use keyturn_room::RoomError;
use keyturn_session::SessionError;

/// Top-level error that wraps all layer-specific errors.
///
/// Callers of [`EscapeService`](crate::EscapeService) deal with this single
/// type; the `#[from]` attributes let `?` convert layer errors
/// automatically. The request layer maps each failure to an HTTP status via
/// [`status_code`](Self::status_code).
#[derive(Debug, thiserror::Error)]
pub enum KeyturnError {
    /// A room-definition error (not found, failed validation).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A session-state error (team gating, persistence, CAS conflict).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A progression-engine error (staleness, expiry, terminal state).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The session's actor is gone (command channel closed mid-call).
    #[error("session {0} is unavailable")]
    SessionUnavailable(SessionId),
}

impl KeyturnError {
    /// The HTTP status the request layer should answer with.
    ///
    /// Taxonomy: validation → 400, missing → 404, staleness/conflict → 409,
    /// expired/terminal → 410, infrastructure → 503.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Room(RoomError::NotFound(_)) => 404,
            Self::Room(_) => 400,

            Self::Session(SessionError::TeamSizeRejected { .. }) => 400,
            Self::Session(SessionError::NotFound(_)) => 404,
            Self::Session(SessionError::AlreadyExists(_)) => 409,
            Self::Session(SessionError::ConcurrentModification { .. }) => 409,

            Self::Engine(EngineError::StaleSubmission { .. }) => 409,
            Self::Engine(EngineError::SessionNotActive { .. }) => 410,
            Self::Engine(EngineError::SessionExpired { .. }) => 410,
            Self::Engine(EngineError::NoMoreHints { .. }) => 400,
            Self::Engine(EngineError::StageOutOfRange { .. }) => 400,

            Self::SessionUnavailable(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyturn_protocol::RoomId;

    #[test]
    fn test_from_room_error() {
        let err: KeyturnError = RoomError::NotFound(RoomId(1)).into();
        assert!(matches!(err, KeyturnError::Room(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let team: KeyturnError = SessionError::TeamSizeRejected {
            min: 4,
            max: 8,
            actual: 3,
        }
        .into();
        assert_eq!(team.status_code(), 400);

        let room: KeyturnError = RoomError::NoStages(RoomId(1)).into();
        assert_eq!(room.status_code(), 400);
    }

    #[test]
    fn test_conflict_errors_map_to_409() {
        let stale: KeyturnError = EngineError::StaleSubmission {
            submitted: 2,
            current: 1,
        }
        .into();
        assert_eq!(stale.status_code(), 409);

        let cas: KeyturnError = SessionError::ConcurrentModification {
            session: SessionId("s".into()),
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(cas.status_code(), 409);
    }

    #[test]
    fn test_terminal_errors_map_to_410() {
        let err: KeyturnError = EngineError::SessionNotActive {
            session: SessionId("s".into()),
            status: keyturn_session::SessionStatus::Completed,
        }
        .into();
        assert_eq!(err.status_code(), 410);
    }
}
