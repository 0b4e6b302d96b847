//! Integration tests for the progression engine: full multi-stage runs.

use std::collections::BTreeSet;

use keyturn_engine::{EngineError, abandon, request_hint, start_session, submit_answer};
use keyturn_protocol::{ParticipantId, PuzzlePayload, RoomId, SessionEvent};
use keyturn_room::{RoomDefinition, StageDefinition};
use keyturn_session::{Session, SessionStatus};
use serde_json::json;

// =========================================================================
// Fixtures
// =========================================================================

fn stage(order: u32, answer: Option<&str>, hints: &[&str]) -> StageDefinition {
    StageDefinition {
        order,
        puzzle: PuzzlePayload::Riddle(json!({ "prompt": format!("stage {order}") })),
        correct_answer: answer.map(String::from),
        hints: hints.iter().map(|h| h.to_string()).collect(),
    }
}

/// Two stages: a keyed answer, then a narrative auto-advance stage.
fn vault_room() -> RoomDefinition {
    RoomDefinition {
        id: RoomId(7),
        name: "The Vault".into(),
        stages: vec![
            stage(0, Some("golden_key"), &["check the desk", "under the blotter"]),
            stage(1, None, &[]),
        ],
        min_team_size: 2,
        max_team_size: 6,
        time_limit_seconds: None,
        items: vec![],
        layout: vec![],
    }
    .validated()
    .unwrap()
}

fn three_stage_room() -> RoomDefinition {
    RoomDefinition {
        id: RoomId(8),
        name: "The Warehouse".into(),
        stages: vec![
            stage(0, Some("warehouse"), &["hint a"]),
            stage(2, Some("crate"), &["hint b", "hint c"]),
            stage(5, Some("manifest"), &[]),
        ],
        min_team_size: 1,
        max_team_size: 8,
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

fn started(room: &RoomDefinition, ids: &[u64]) -> Session {
    start_session(room, team(ids), 1_000).unwrap().session
}

// =========================================================================
// Full runs: golden_key then a null-answer stage
// =========================================================================

#[test]
fn test_full_run_with_normalized_answer_and_auto_advance_stage() {
    let room = vault_room();
    let session = started(&room, &[1, 2, 3, 4]);

    // Normalized match: trailing space and capitals don't matter.
    let t1 = submit_answer(&session, &room, 0, "Golden_Key ", ParticipantId(2), 2_000).unwrap();
    assert_eq!(t1.session.current_stage, 1);
    assert_eq!(t1.session.status, SessionStatus::InProgress);
    assert!(matches!(t1.events[0].event, SessionEvent::StageAdvanced { .. }));

    // The null-answer stage accepts an empty submission.
    let t2 = submit_answer(&t1.session, &room, 1, "", ParticipantId(3), 3_000).unwrap();
    assert_eq!(t2.session.status, SessionStatus::Completed);
    assert_eq!(t2.session.current_stage, 2);
    assert_eq!(t2.session.completed_at, Some(3_000));
    assert!(matches!(
        t2.events[0].event,
        SessionEvent::RoomCompleted { elapsed_ms: 2_000 }
    ));
}

#[test]
fn test_answer_comparison_is_case_and_trim_insensitive() {
    let room = three_stage_room();
    for raw in ["Warehouse", " warehouse ", "WAREHOUSE"] {
        let session = started(&room, &[1]);
        let t = submit_answer(&session, &room, 0, raw, ParticipantId(1), 2_000).unwrap();
        assert_eq!(t.session.current_stage, 1, "{raw:?} should match");
    }
}

#[test]
fn test_correct_answer_mid_room_keeps_in_progress() {
    let room = three_stage_room();
    let session = started(&room, &[1]);

    let t = submit_answer(&session, &room, 0, "warehouse", ParticipantId(1), 2_000).unwrap();
    assert_eq!(t.session.current_stage, 1);
    assert_eq!(t.session.status, SessionStatus::InProgress);
    assert!(t.session.completed_at.is_none());
}

// =========================================================================
// Staleness and immutability of rejected operations
// =========================================================================

#[test]
fn test_stale_submission_leaves_session_unchanged() {
    let room = three_stage_room();
    let session = started(&room, &[1]);

    let before = session.clone();
    let err = submit_answer(&session, &room, 2, "crate", ParticipantId(1), 2_000).unwrap_err();
    assert!(matches!(err, EngineError::StaleSubmission { submitted: 2, current: 0 }));
    assert_eq!(session, before);
}

#[test]
fn test_incorrect_answer_only_appends_attempt() {
    let room = three_stage_room();
    let session = started(&room, &[1, 2]);

    let t = submit_answer(&session, &room, 0, "garage", ParticipantId(2), 2_000).unwrap();
    assert_eq!(t.session.current_stage, 0);
    assert_eq!(t.session.status, SessionStatus::InProgress);
    assert_eq!(t.session.hints_revealed, session.hints_revealed);
    assert_eq!(t.session.attempts.len(), 1);
    assert!(matches!(
        t.events[0].event,
        SessionEvent::AnswerRejected { stage_index: 0, participant: ParticipantId(2) }
    ));

    // A teammate's retry is not blocked by the earlier wrong answer.
    let t2 = submit_answer(&t.session, &room, 0, "warehouse", ParticipantId(1), 2_100).unwrap();
    assert_eq!(t2.session.current_stage, 1);
}

#[test]
fn test_current_stage_is_monotone_over_attempt_log() {
    let room = three_stage_room();
    let mut session = started(&room, &[1]);

    let submissions = [
        (0, "wrong"),
        (0, "warehouse"),
        (1, "also wrong"),
        (1, "crate"),
        (2, "manifest"),
    ];
    let mut last_stage = session.current_stage;
    for (i, (stage_index, answer)) in submissions.iter().enumerate() {
        let t = submit_answer(
            &session,
            &room,
            *stage_index,
            answer,
            ParticipantId(1),
            2_000 + i as u64,
        )
        .unwrap();
        assert!(t.session.current_stage >= last_stage);
        last_stage = t.session.current_stage;
        session = t.session;
    }

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.attempts.len(), 5);
}

// =========================================================================
// Hint disclosure
// =========================================================================

#[test]
fn test_hints_reveal_strictly_in_order() {
    let room = vault_room();
    let session = started(&room, &[1, 2]);

    let t1 = request_hint(&session, &room, 0, 2_000).unwrap();
    assert!(matches!(
        &t1.events[0].event,
        SessionEvent::HintRevealed { index: 1, text, .. } if text == "check the desk"
    ));

    let t2 = request_hint(&t1.session, &room, 0, 2_500).unwrap();
    assert!(matches!(
        &t2.events[0].event,
        SessionEvent::HintRevealed { index: 2, text, .. } if text == "under the blotter"
    ));

    let err = request_hint(&t2.session, &room, 0, 3_000).unwrap_err();
    assert!(matches!(err, EngineError::NoMoreHints { stage_index: 0, available: 2 }));
}

#[test]
fn test_hint_counters_are_per_stage() {
    let room = three_stage_room();
    let session = started(&room, &[1]);

    let t1 = request_hint(&session, &room, 0, 2_000).unwrap();
    let t2 = submit_answer(&t1.session, &room, 0, "warehouse", ParticipantId(1), 2_100).unwrap();

    // Stage 1 (order 2) starts with a fresh counter regardless of stage 0.
    let t3 = request_hint(&t2.session, &room, 1, 2_200).unwrap();
    assert!(matches!(
        &t3.events[0].event,
        SessionEvent::HintRevealed { stage_index: 1, index: 1, text } if text == "hint b"
    ));

    // Stage 0's counter is still recorded against its order.
    assert_eq!(t3.session.hints_revealed_for(0), 1);
    assert_eq!(t3.session.hints_revealed_for(2), 1);
}

#[test]
fn test_hint_on_stage_without_hints_fails_immediately() {
    let room = three_stage_room();
    let mut session = started(&room, &[1]);
    session.current_stage = 2;

    let err = request_hint(&session, &room, 2, 2_000).unwrap_err();
    assert!(matches!(err, EngineError::NoMoreHints { available: 0, .. }));
}

#[test]
fn test_hint_for_non_current_stage_is_stale() {
    let room = vault_room();
    let session = started(&room, &[1, 2]);

    let err = request_hint(&session, &room, 1, 2_000).unwrap_err();
    assert!(matches!(err, EngineError::StaleSubmission { submitted: 1, current: 0 }));
}

// =========================================================================
// Terminal states are absorbing
// =========================================================================

#[test]
fn test_no_operation_mutates_a_terminal_session() {
    let room = vault_room();
    let session = started(&room, &[1, 2]);

    let t1 = submit_answer(&session, &room, 0, "golden_key", ParticipantId(1), 2_000).unwrap();
    let done = submit_answer(&t1.session, &room, 1, "", ParticipantId(1), 3_000)
        .unwrap()
        .session;
    assert_eq!(done.status, SessionStatus::Completed);

    let frozen = done.clone();

    assert!(matches!(
        submit_answer(&done, &room, 2, "anything", ParticipantId(1), 4_000),
        Err(EngineError::SessionNotActive { .. })
    ));
    assert!(matches!(
        request_hint(&done, &room, 2, 4_000),
        Err(EngineError::SessionNotActive { .. })
    ));
    assert!(matches!(
        abandon(&done, 4_000),
        Err(EngineError::SessionNotActive { .. })
    ));
    assert_eq!(done, frozen);
}

#[test]
fn test_timed_out_session_rejects_every_followup() {
    let room = RoomDefinition {
        id: RoomId(9),
        name: "Timed".into(),
        stages: vec![stage(0, Some("x"), &["h"])],
        min_team_size: 1,
        max_team_size: 2,
        time_limit_seconds: Some(10),
        items: vec![],
        layout: vec![],
    }
    .validated()
    .unwrap();
    let session = started(&room, &[1]);

    // The first late call carries the timeout transition.
    let err = submit_answer(&session, &room, 0, "x", ParticipantId(1), 12_000).unwrap_err();
    let timed_out = match err {
        EngineError::SessionExpired { timeout, .. } => timeout.session,
        other => panic!("expected SessionExpired, got {other:?}"),
    };
    assert_eq!(timed_out.status, SessionStatus::TimedOut);

    // After the timeout is applied, further calls are plain terminal-state
    // rejections with no new transition attached.
    assert!(matches!(
        submit_answer(&timed_out, &room, 0, "x", ParticipantId(1), 13_000),
        Err(EngineError::SessionNotActive { status: SessionStatus::TimedOut, .. })
    ));
    assert!(matches!(
        request_hint(&timed_out, &room, 0, 13_000),
        Err(EngineError::SessionNotActive { .. })
    ));
}

// =========================================================================
// Team gating
// =========================================================================

#[test]
fn test_team_of_three_rejected_by_four_to_eight_room() {
    let mut def = vault_room();
    def.min_team_size = 4;
    def.max_team_size = 8;
    let room = def.validated().unwrap();

    let err = start_session(&room, team(&[1, 2, 3]), 0).unwrap_err();
    assert!(matches!(
        err,
        keyturn_session::SessionError::TeamSizeRejected { min: 4, max: 8, actual: 3 }
    ));
}
