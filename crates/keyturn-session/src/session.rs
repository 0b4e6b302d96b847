//! Session state: one team's live run through a room.
//!
//! A [`Session`] is a plain value. The progression engine computes each
//! transition as a pure function from one session value to the next; nothing
//! here mutates in place behind the caller's back. The two monotone counters
//! (`version`, `next_seq`) back the store's compare-and-swap and the relay's
//! duplicate detection respectively.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use keyturn_protocol::{ParticipantId, RoomId, SessionId};
use keyturn_room::RoomDefinition;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// ```text
/// NotStarted → InProgress → { Completed, Abandoned, TimedOut }
/// ```
///
/// The three right-hand states are terminal and absorbing: once a session
/// reaches one of them, no transition leaves it and no engine operation
/// may change any session field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Created but not yet running. Sessions made through
    /// [`Session::create`] skip straight past this to `InProgress`.
    NotStarted,
    /// The team is actively playing.
    InProgress,
    /// The last stage was solved. Terminal.
    Completed,
    /// The team gave up. Terminal.
    Abandoned,
    /// The time limit elapsed. Terminal.
    TimedOut,
}

impl SessionStatus {
    /// Returns `true` if engine operations are accepted in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` for the absorbing end states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned | Self::TimedOut)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::NotStarted => target == Self::InProgress,
            Self::InProgress => target.is_terminal(),
            Self::Completed | Self::Abandoned | Self::TimedOut => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Abandoned => write!(f, "Abandoned"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// One logged answer submission, correct or not.
///
/// The raw submitted text is kept verbatim for audit; comparison always
/// happens on the normalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Which stage the answer was aimed at.
    pub stage_index: usize,
    /// The answer exactly as submitted.
    pub answer: String,
    /// Whether it matched.
    pub correct: bool,
    /// Milliseconds since the Unix epoch at submission time.
    pub timestamp: u64,
    /// Who submitted it.
    pub participant: ParticipantId,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live instance of a team attempting a room.
///
/// Owns its attempt log and hint counters outright; holds the room only by
/// id (read-only relation). Equality compares every field, which is what
/// lets tests assert a rejected operation left the session untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Random, unguessable session handle.
    pub id: SessionId,

    /// The room this session is running.
    pub room_id: RoomId,

    /// The participants. Fixed at creation.
    pub team: BTreeSet<ParticipantId>,

    /// Lifecycle state.
    pub status: SessionStatus,

    /// Index into the room's sorted stage sequence. Equals the stage count
    /// once the room is completed.
    pub current_stage: usize,

    /// Hints revealed so far, keyed by *stage order* (not index) so the
    /// counters stay attached to their stages even across room re-versioning.
    /// Counters only ever grow.
    pub hints_revealed: BTreeMap<u32, usize>,

    /// Every submission, in arrival order.
    pub attempts: Vec<Attempt>,

    /// Milliseconds since the Unix epoch when the session started.
    pub started_at: u64,

    /// Set exactly once, when the last stage is solved.
    pub completed_at: Option<u64>,

    /// Optimistic-concurrency version. The store's compare-and-swap
    /// rejects a save whose version doesn't match what's stored.
    pub version: u64,

    /// Next event sequence number to stamp. Strictly increasing across
    /// every envelope this session ever emits.
    pub next_seq: u64,
}

impl Session {
    /// Creates a session for `team` attempting `room`, starting now.
    ///
    /// # Errors
    /// [`SessionError::TeamSizeRejected`] if the team is smaller than
    /// `room.min_team_size` or larger than `room.max_team_size`. Nothing is
    /// allocated or mutated on rejection.
    pub fn create(
        room: &RoomDefinition,
        team: BTreeSet<ParticipantId>,
        now_ms: u64,
    ) -> Result<Self, SessionError> {
        let actual = team.len();
        if actual < room.min_team_size || actual > room.max_team_size {
            return Err(SessionError::TeamSizeRejected {
                min: room.min_team_size,
                max: room.max_team_size,
                actual,
            });
        }

        let session = Self {
            id: SessionId(generate_session_id()),
            room_id: room.id,
            team,
            status: SessionStatus::InProgress,
            current_stage: 0,
            hints_revealed: BTreeMap::new(),
            attempts: Vec::new(),
            started_at: now_ms,
            completed_at: None,
            version: 0,
            next_seq: 0,
        };

        tracing::info!(
            session_id = %session.id,
            room_id = %session.room_id,
            team_size = actual,
            "session created"
        );

        Ok(session)
    }

    /// How many hints have been revealed for the stage with this order.
    pub fn hints_revealed_for(&self, stage_order: u32) -> usize {
        self.hints_revealed.get(&stage_order).copied().unwrap_or(0)
    }

    /// Wall-clock time spent in this session so far.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at)
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// Session ids double as access handles, so they must be infeasible to
/// guess. Same construction as a reconnection token.
fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use keyturn_protocol::PuzzlePayload;
    use keyturn_room::StageDefinition;
    use serde_json::json;

    fn room(min: usize, max: usize) -> RoomDefinition {
        RoomDefinition {
            id: RoomId(1),
            name: "Cellar".into(),
            stages: vec![StageDefinition {
                order: 0,
                puzzle: PuzzlePayload::Narrative(json!({})),
                correct_answer: None,
                hints: vec![],
            }],
            min_team_size: min,
            max_team_size: max,
            time_limit_seconds: None,
            items: vec![],
            layout: vec![],
        }
        .validated()
        .unwrap()
    }

    fn team(ids: &[u64]) -> BTreeSet<ParticipantId> {
        ids.iter().map(|i| ParticipantId(*i)).collect()
    }

    #[test]
    fn test_status_transitions_follow_state_machine() {
        use SessionStatus::*;
        assert!(NotStarted.can_transition_to(InProgress));
        assert!(!NotStarted.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Abandoned));
        assert!(InProgress.can_transition_to(TimedOut));
        assert!(!InProgress.can_transition_to(NotStarted));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        use SessionStatus::*;
        for terminal in [Completed, Abandoned, TimedOut] {
            assert!(terminal.is_terminal());
            for target in [NotStarted, InProgress, Completed, Abandoned, TimedOut] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_create_with_valid_team_starts_in_progress() {
        let session = Session::create(&room(2, 4), team(&[1, 2, 3]), 1_000).unwrap();

        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.current_stage, 0);
        assert_eq!(session.started_at, 1_000);
        assert_eq!(session.version, 0);
        assert_eq!(session.next_seq, 0);
        assert!(session.completed_at.is_none());
        assert!(session.attempts.is_empty());
    }

    #[test]
    fn test_create_rejects_undersized_team_with_bounds() {
        let result = Session::create(&room(4, 8), team(&[1, 2, 3]), 0);
        assert!(matches!(
            result,
            Err(SessionError::TeamSizeRejected {
                min: 4,
                max: 8,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_create_rejects_oversized_team() {
        let result = Session::create(&room(1, 2), team(&[1, 2, 3]), 0);
        assert!(matches!(
            result,
            Err(SessionError::TeamSizeRejected { actual: 3, .. })
        ));
    }

    #[test]
    fn test_session_ids_are_random_hex() {
        let a = Session::create(&room(1, 4), team(&[1]), 0).unwrap();
        let b = Session::create(&room(1, 4), team(&[1]), 0).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.id.0.len(), 32);
        assert!(a.id.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hints_revealed_for_defaults_to_zero() {
        let session = Session::create(&room(1, 4), team(&[1]), 0).unwrap();
        assert_eq!(session.hints_revealed_for(0), 0);
        assert_eq!(session.hints_revealed_for(99), 0);
    }

    #[test]
    fn test_elapsed_ms_saturates_on_clock_skew() {
        let session = Session::create(&room(1, 4), team(&[1]), 5_000).unwrap();
        assert_eq!(session.elapsed_ms(12_000), 7_000);
        // A caller-supplied clock reading before started_at must not panic.
        assert_eq!(session.elapsed_ms(1_000), 0);
    }
}
