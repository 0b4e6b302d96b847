//! Core types shared across the Keyturn stack.
//!
//! Everything here either travels on the wire to session participants or is
//! embedded in persisted room/session records, so all of it derives serde
//! traits. The engine produces [`EventEnvelope`]s; the relay delivers them.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant (one member of a team).
///
/// Newtype over `u64` so a participant id can't be confused with a room id.
/// `#[serde(transparent)]` keeps the JSON representation a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A unique identifier for a live session (one team's run through a room).
///
/// Sessions are created at runtime, so the id is a random 128-bit hex token
/// rather than a sequential number — it doubles as the handle clients
/// present on every request, so it must not be guessable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PuzzlePayload — opaque stage content
// ---------------------------------------------------------------------------

/// The presentation payload of a stage, keyed by puzzle type.
///
/// The engine never interprets the contents — it only copies the payload
/// into [`StageView`]s when a stage becomes current. The inner
/// `serde_json::Value` is whatever the authoring tool produced and whatever
/// the presentation layer expects for that puzzle type.
///
/// `#[serde(tag = "puzzle_type", content = "puzzle_data")]` produces:
///   `{ "puzzle_type": "riddle", "puzzle_data": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "puzzle_type", content = "puzzle_data", rename_all = "snake_case")]
pub enum PuzzlePayload {
    /// Free-text riddle: prompt, optional imagery.
    Riddle(serde_json::Value),
    /// Cipher/decoding puzzle.
    Cipher(serde_json::Value),
    /// Scene-search puzzle driven by the room's hotspot layout.
    Scene(serde_json::Value),
    /// Narrative-only stage (typically paired with a null answer).
    Narrative(serde_json::Value),
    /// Escape hatch for puzzle types this build doesn't know about.
    Custom {
        kind: String,
        data: serde_json::Value,
    },
}

// ---------------------------------------------------------------------------
// StageView — public stage data carried in events
// ---------------------------------------------------------------------------

/// What participants are allowed to see about the stage in front of them.
///
/// This is the "public" projection of a stage definition: the puzzle payload
/// and hint bookkeeping, but never the correct answer or the hint texts
/// themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageView {
    /// Position in the room's stage sequence (0-based).
    pub stage_index: usize,
    /// Presentation payload, opaque to the engine.
    pub puzzle: PuzzlePayload,
    /// Total number of hints authored for this stage.
    pub hints_available: usize,
    /// How many of them have been revealed so far.
    pub hints_revealed: usize,
}

// ---------------------------------------------------------------------------
// SessionEvent — what the engine tells the team
// ---------------------------------------------------------------------------

/// An outward event produced by a progression-engine transition.
///
/// Every event is delivered to all current session participants. Internally
/// tagged (`{ "type": "StageAdvanced", ... }`) so client code can switch on
/// a single discriminator field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// The session was created and the first stage is live.
    SessionStarted { room_id: RoomId, stage: StageView },

    /// A correct answer advanced the team to a new stage.
    StageAdvanced { stage: StageView },

    /// An incorrect answer was submitted. The session is otherwise
    /// unchanged; teammates may retry immediately.
    AnswerRejected {
        stage_index: usize,
        participant: ParticipantId,
    },

    /// A hint was revealed for the current stage. `index` is 1-based:
    /// the first hint of a stage is index 1.
    HintRevealed {
        stage_index: usize,
        index: usize,
        text: String,
    },

    /// The last stage was solved. Terminal.
    RoomCompleted { elapsed_ms: u64 },

    /// The room's time limit elapsed before completion. Terminal.
    SessionTimedOut { elapsed_ms: u64 },

    /// The team gave up. Terminal.
    SessionAbandoned,
}

// ---------------------------------------------------------------------------
// EventEnvelope — the delivery wrapper
// ---------------------------------------------------------------------------

/// The wrapper the relay delivers to participants.
///
/// `seq` is a per-session monotonically increasing sequence number stamped
/// by the engine. The relay's transport is allowed to deliver at-least-once
/// and out of order; receivers discard duplicates and reorder by `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Which session this event belongs to.
    pub session_id: SessionId,

    /// Per-session sequence number, strictly increasing.
    pub seq: u64,

    /// Milliseconds since the Unix epoch, read at transition time.
    pub timestamp: u64,

    /// The event itself.
    pub event: SessionEvent,
}

// =========================================================================
// Tests
// =========================================================================
