//! The progression state machine.
//!
//! Every operation here is a pure function: it takes the current session
//! value, the (immutable) room definition, and an explicit wall-clock
//! reading, and produces a [`Transition`] — a complete new session value
//! plus the envelopes to broadcast. Nothing is partially updated: the
//! caller either commits the whole transition or none of it.
//!
//! Time never comes from a background timer. Expiry is checked lazily
//! against `now_ms` at the top of each call (after the active-status check),
//! so a late submission on an expired session is uniformly rejected and the
//! session is moved to `TimedOut` in the same breath.

use std::collections::BTreeSet;

use keyturn_protocol::{EventEnvelope, ParticipantId, SessionEvent};
use keyturn_room::{RoomDefinition, normalize_answer};
use keyturn_session::{Attempt, Session, SessionStatus};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// The output of one engine operation: the next session value and the
/// events it produced, already stamped with sequence numbers.
///
/// The caller commits `session` to the store first, then hands `events` to
/// the broadcaster. Events are ordered; their `seq` values continue the
/// session's monotone counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The complete new session value.
    pub session: Session,
    /// Envelopes to broadcast, in production order.
    pub events: Vec<EventEnvelope>,
}

/// Stamps `events` onto `session`, consuming sequence numbers from its
/// counter. The counter advances even for events that later fail to
/// deliver — delivery is the relay's problem, ordering is ours.
fn stamp(session: &mut Session, now_ms: u64, events: Vec<SessionEvent>) -> Vec<EventEnvelope> {
    events
        .into_iter()
        .map(|event| {
            let seq = session.next_seq;
            session.next_seq += 1;
            EventEnvelope {
                session_id: session.id.clone(),
                seq,
                timestamp: now_ms,
                event,
            }
        })
        .collect()
}

fn ensure_active(session: &Session) -> Result<(), EngineError> {
    if session.status.is_active() {
        Ok(())
    } else {
        Err(EngineError::SessionNotActive {
            session: session.id.clone(),
            status: session.status,
        })
    }
}

// ---------------------------------------------------------------------------
// start_session
// ---------------------------------------------------------------------------

/// Creates a session for `team` attempting `room` and emits the
/// `SessionStarted` event carrying the first stage's public data.
///
/// # Errors
/// [`keyturn_session::SessionError::TeamSizeRejected`] if the team size is
/// outside the room's bounds.
pub fn start_session(
    room: &RoomDefinition,
    team: BTreeSet<ParticipantId>,
    now_ms: u64,
) -> Result<Transition, keyturn_session::SessionError> {
    let mut session = Session::create(room, team, now_ms)?;

    // A validated room always has a first stage; an unvalidated one may
    // not, in which case the session simply starts without an event.
    let events = match room.stage_view(0, 0) {
        Some(stage) => stamp(
            &mut session,
            now_ms,
            vec![SessionEvent::SessionStarted {
                room_id: room.id,
                stage,
            }],
        ),
        None => Vec::new(),
    };

    Ok(Transition { session, events })
}

// ---------------------------------------------------------------------------
// check_timeout
// ---------------------------------------------------------------------------

/// Lazily applies the room's time limit.
///
/// Returns `Some(transition)` moving the session to `TimedOut` (with the
/// `SessionTimedOut` event) when an active session of a timed room has
/// reached its limit; `None` for untimed rooms, unexpired sessions, and
/// sessions that already left `InProgress`.
pub fn check_timeout(session: &Session, room: &RoomDefinition, now_ms: u64) -> Option<Transition> {
    if !session.status.is_active() {
        return None;
    }
    let limit_ms = room.time_limit_ms()?;
    let elapsed_ms = session.elapsed_ms(now_ms);
    if elapsed_ms < limit_ms {
        return None;
    }

    let mut next = session.clone();
    next.status = SessionStatus::TimedOut;
    let events = stamp(
        &mut next,
        now_ms,
        vec![SessionEvent::SessionTimedOut { elapsed_ms }],
    );

    tracing::info!(
        session_id = %next.id,
        elapsed_ms,
        limit_ms,
        "session timed out"
    );

    Some(Transition {
        session: next,
        events,
    })
}

// ---------------------------------------------------------------------------
// submit_answer
// ---------------------------------------------------------------------------

/// Processes one answer submission against the current stage.
///
/// Preconditions are evaluated in a fixed order: active status, time limit,
/// stage staleness. Then the answer is normalized and compared (a stage
/// with no answer auto-passes), the attempt is logged either way, and a
/// correct answer advances the stage — completing the room if it was the
/// last one.
///
/// # Errors
/// - [`EngineError::SessionNotActive`] — session already terminal
/// - [`EngineError::SessionExpired`] — time limit reached; the error
///   carries the timeout transition the caller must still commit
/// - [`EngineError::StaleSubmission`] — `stage_index` isn't current
/// - [`EngineError::StageOutOfRange`] — session/room mismatch
pub fn submit_answer(
    session: &Session,
    room: &RoomDefinition,
    stage_index: usize,
    raw_answer: &str,
    participant: ParticipantId,
    now_ms: u64,
) -> Result<Transition, EngineError> {
    ensure_active(session)?;

    if let Some(timeout) = check_timeout(session, room, now_ms) {
        return Err(EngineError::SessionExpired {
            session: session.id.clone(),
            timeout: Box::new(timeout),
        });
    }

    if stage_index != session.current_stage {
        return Err(EngineError::StaleSubmission {
            submitted: stage_index,
            current: session.current_stage,
        });
    }

    let stage = room
        .stage(stage_index)
        .ok_or(EngineError::StageOutOfRange {
            room: room.id,
            index: stage_index,
        })?;

    // A null answer means a no-check stage: any submission passes.
    let correct = match &stage.correct_answer {
        None => true,
        Some(expected) => normalize_answer(raw_answer) == *expected,
    };

    let mut next = session.clone();
    next.attempts.push(Attempt {
        stage_index,
        answer: raw_answer.to_string(),
        correct,
        timestamp: now_ms,
        participant,
    });

    if !correct {
        tracing::debug!(
            session_id = %next.id,
            stage_index,
            %participant,
            "incorrect answer"
        );
        let events = stamp(
            &mut next,
            now_ms,
            vec![SessionEvent::AnswerRejected {
                stage_index,
                participant,
            }],
        );
        return Ok(Transition {
            session: next,
            events,
        });
    }

    next.current_stage += 1;

    let produced = if next.current_stage == room.stage_count() {
        next.status = SessionStatus::Completed;
        next.completed_at = Some(now_ms);
        tracing::info!(
            session_id = %next.id,
            elapsed_ms = next.elapsed_ms(now_ms),
            "room completed"
        );
        vec![SessionEvent::RoomCompleted {
            elapsed_ms: next.elapsed_ms(now_ms),
        }]
    } else {
        tracing::debug!(
            session_id = %next.id,
            stage_index = next.current_stage,
            "stage advanced"
        );
        match room.stage_view(next.current_stage, 0) {
            Some(stage) => vec![SessionEvent::StageAdvanced { stage }],
            None => Vec::new(),
        }
    };

    let events = stamp(&mut next, now_ms, produced);
    Ok(Transition {
        session: next,
        events,
    })
}

// ---------------------------------------------------------------------------
// request_hint
// ---------------------------------------------------------------------------

/// Reveals the next hint for the current stage, strictly in order.
///
/// Hint `k` can only be revealed when exactly `k - 1` hints are already
/// revealed for that stage; each call increments the stage's counter by
/// exactly one. Counters are keyed by stage order and never decrease.
///
/// # Errors
/// Same preconditions as [`submit_answer`], plus
/// [`EngineError::NoMoreHints`] once the stage's hint list is exhausted.
pub fn request_hint(
    session: &Session,
    room: &RoomDefinition,
    stage_index: usize,
    now_ms: u64,
) -> Result<Transition, EngineError> {
    ensure_active(session)?;

    if let Some(timeout) = check_timeout(session, room, now_ms) {
        return Err(EngineError::SessionExpired {
            session: session.id.clone(),
            timeout: Box::new(timeout),
        });
    }

    if stage_index != session.current_stage {
        return Err(EngineError::StaleSubmission {
            submitted: stage_index,
            current: session.current_stage,
        });
    }

    let stage = room
        .stage(stage_index)
        .ok_or(EngineError::StageOutOfRange {
            room: room.id,
            index: stage_index,
        })?;

    let revealed = session.hints_revealed_for(stage.order);
    if revealed >= stage.hints.len() {
        return Err(EngineError::NoMoreHints {
            stage_index,
            available: stage.hints.len(),
        });
    }

    let mut next = session.clone();
    next.hints_revealed.insert(stage.order, revealed + 1);

    let text = stage.hints[revealed].clone();
    tracing::debug!(
        session_id = %next.id,
        stage_index,
        hint = revealed + 1,
        "hint revealed"
    );

    let events = stamp(
        &mut next,
        now_ms,
        vec![SessionEvent::HintRevealed {
            stage_index,
            index: revealed + 1,
            text,
        }],
    );

    Ok(Transition {
        session: next,
        events,
    })
}

// ---------------------------------------------------------------------------
// abandon
// ---------------------------------------------------------------------------

/// Abandons an in-progress session. Terminal and idempotent: abandoning an
/// already-Abandoned session is a no-op with no events, not an error.
///
/// # Errors
/// [`EngineError::SessionNotActive`] when called on a `Completed`,
/// `TimedOut`, or `NotStarted` session.
pub fn abandon(session: &Session, now_ms: u64) -> Result<Transition, EngineError> {
    match session.status {
        SessionStatus::Abandoned => Ok(Transition {
            session: session.clone(),
            events: Vec::new(),
        }),
        SessionStatus::InProgress => {
            let mut next = session.clone();
            next.status = SessionStatus::Abandoned;
            tracing::info!(session_id = %next.id, "session abandoned");
            let events = stamp(&mut next, now_ms, vec![SessionEvent::SessionAbandoned]);
            Ok(Transition {
                session: next,
                events,
            })
        }
        status => Err(EngineError::SessionNotActive {
            session: session.id.clone(),
            status,
        }),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for individual precondition and stamping behavior.
    //! Full multi-stage scenarios live in `tests/progression.rs`.

    use super::*;
    use keyturn_protocol::{PuzzlePayload, RoomId};
    use keyturn_room::StageDefinition;
    use serde_json::json;

    fn stage(order: u32, answer: Option<&str>, hints: &[&str]) -> StageDefinition {
        StageDefinition {
            order,
            puzzle: PuzzlePayload::Riddle(json!({ "prompt": "?" })),
            correct_answer: answer.map(String::from),
            hints: hints.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn timed_room(limit: Option<u64>) -> RoomDefinition {
        RoomDefinition {
            id: RoomId(1),
            name: "Attic".into(),
            stages: vec![stage(0, Some("lantern"), &["it glows"]), stage(1, None, &[])],
            min_team_size: 1,
            max_team_size: 4,
            time_limit_seconds: limit,
            items: vec![],
            layout: vec![],
        }
        .validated()
        .unwrap()
    }

    fn one_player() -> BTreeSet<ParticipantId> {
        BTreeSet::from([ParticipantId(1)])
    }

    #[test]
    fn test_start_session_emits_session_started_at_seq_zero() {
        let room = timed_room(None);
        let t = start_session(&room, one_player(), 100).unwrap();

        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].seq, 0);
        assert_eq!(t.session.next_seq, 1);
        assert!(matches!(
            t.events[0].event,
            SessionEvent::SessionStarted { room_id: RoomId(1), .. }
        ));
    }

    #[test]
    fn test_check_timeout_none_for_untimed_room() {
        let room = timed_room(None);
        let session = start_session(&room, one_player(), 0).unwrap().session;
        assert!(check_timeout(&session, &room, u64::MAX).is_none());
    }

    #[test]
    fn test_check_timeout_none_before_limit() {
        let room = timed_room(Some(60));
        let session = start_session(&room, one_player(), 0).unwrap().session;
        assert!(check_timeout(&session, &room, 59_999).is_none());
    }

    #[test]
    fn test_check_timeout_fires_at_limit() {
        let room = timed_room(Some(60));
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let t = check_timeout(&session, &room, 60_000).unwrap();
        assert_eq!(t.session.status, SessionStatus::TimedOut);
        assert!(matches!(
            t.events[0].event,
            SessionEvent::SessionTimedOut { elapsed_ms: 60_000 }
        ));
    }

    #[test]
    fn test_check_timeout_none_for_terminal_session() {
        let room = timed_room(Some(60));
        let mut session = start_session(&room, one_player(), 0).unwrap().session;
        session.status = SessionStatus::Completed;
        assert!(check_timeout(&session, &room, u64::MAX).is_none());
    }

    #[test]
    fn test_submit_answer_expired_session_carries_timeout_transition() {
        let room = timed_room(Some(60));
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let err = submit_answer(&session, &room, 0, "lantern", ParticipantId(1), 61_000)
            .unwrap_err();
        match err {
            EngineError::SessionExpired { timeout, .. } => {
                assert_eq!(timeout.session.status, SessionStatus::TimedOut);
                assert_eq!(timeout.events.len(), 1);
            }
            other => panic!("expected SessionExpired, got {other:?}"),
        }
    }

    #[test]
    fn test_submit_answer_stale_index_leaves_no_transition() {
        let room = timed_room(None);
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let err = submit_answer(&session, &room, 1, "lantern", ParticipantId(1), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::StaleSubmission { submitted: 1, current: 0 }
        ));
    }

    #[test]
    fn test_submit_answer_logs_attempt_on_both_outcomes() {
        let room = timed_room(None);
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let wrong = submit_answer(&session, &room, 0, "torch", ParticipantId(1), 10).unwrap();
        assert_eq!(wrong.session.attempts.len(), 1);
        assert!(!wrong.session.attempts[0].correct);
        assert_eq!(wrong.session.attempts[0].answer, "torch");

        let right =
            submit_answer(&wrong.session, &room, 0, "lantern", ParticipantId(1), 20).unwrap();
        assert_eq!(right.session.attempts.len(), 2);
        assert!(right.session.attempts[1].correct);
    }

    #[test]
    fn test_sequence_numbers_strictly_increase_across_operations() {
        let room = timed_room(None);
        let start = start_session(&room, one_player(), 0).unwrap();

        let t1 = request_hint(&start.session, &room, 0, 5).unwrap();
        let t2 = submit_answer(&t1.session, &room, 0, "nope", ParticipantId(1), 6).unwrap();
        let t3 = submit_answer(&t2.session, &room, 0, "lantern", ParticipantId(1), 7).unwrap();

        let seqs: Vec<u64> = start
            .events
            .iter()
            .chain(&t1.events)
            .chain(&t2.events)
            .chain(&t3.events)
            .map(|e| e.seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_abandon_from_in_progress_is_terminal() {
        let room = timed_room(None);
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let t = abandon(&session, 50).unwrap();
        assert_eq!(t.session.status, SessionStatus::Abandoned);
        assert!(matches!(t.events[0].event, SessionEvent::SessionAbandoned));
    }

    #[test]
    fn test_abandon_twice_is_noop_not_error() {
        let room = timed_room(None);
        let session = start_session(&room, one_player(), 0).unwrap().session;

        let once = abandon(&session, 50).unwrap();
        let twice = abandon(&once.session, 60).unwrap();

        assert_eq!(twice.session, once.session);
        assert!(twice.events.is_empty());
    }

    #[test]
    fn test_abandon_completed_session_fails() {
        let room = timed_room(None);
        let mut session = start_session(&room, one_player(), 0).unwrap().session;
        session.status = SessionStatus::Completed;

        assert!(matches!(
            abandon(&session, 50),
            Err(EngineError::SessionNotActive {
                status: SessionStatus::Completed,
                ..
            })
        ));
    }
}
