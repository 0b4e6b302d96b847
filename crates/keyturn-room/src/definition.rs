//! Room and stage definitions, plus load-time validation.
//!
//! A [`RoomDefinition`] is immutable for the lifetime of any session that
//! references it. All structural invariants — unique stage ordering,
//! resolvable hotspot targets, sane team bounds — are checked once in
//! [`RoomDefinition::validated`] so a corrupt definition is rejected when it
//! is loaded, not mid-session when a team trips over it.

use serde::{Deserialize, Serialize};

use keyturn_protocol::{PuzzlePayload, RoomId, StageView};

use crate::RoomError;

// ---------------------------------------------------------------------------
// Answer normalization
// ---------------------------------------------------------------------------

/// Normalizes an answer for comparison: trims surrounding whitespace and
/// case-folds via Unicode lowercasing.
///
/// Applied to `correct_answer` once at validation time and to every raw
/// submission at check time, so `"Warehouse"`, `" warehouse "`, and
/// `"WAREHOUSE"` all compare equal.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// StageDefinition
// ---------------------------------------------------------------------------

/// One stage of a room: a puzzle, its answer, and its hint ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Position in the room (0-based in spirit, but only uniqueness and
    /// relative order matter — gaps are allowed).
    pub order: u32,

    /// Presentation payload. Opaque to the engine; see
    /// [`PuzzlePayload`](keyturn_protocol::PuzzlePayload).
    pub puzzle: PuzzlePayload,

    /// The normalized comparison string, or `None` for a no-check stage
    /// that accepts any submission (narrative beats, cutscenes).
    pub correct_answer: Option<String>,

    /// Hints in reveal order. May be empty.
    #[serde(default)]
    pub hints: Vec<String>,
}

// ---------------------------------------------------------------------------
// Hotspots and items
// ---------------------------------------------------------------------------

/// An interactive region of the room's visual layout.
///
/// Clicking a hotspot is a presentation concern; the engine only guarantees
/// at load time that the target it points at actually exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// Identifier unique within the room's layout.
    pub id: String,

    /// What the hotspot opens when activated.
    pub target: HotspotTarget,

    /// Bounding box in layout coordinate space.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// The target a hotspot resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HotspotTarget {
    /// Opens the stage with this order value.
    Stage { order: u32 },
    /// Opens an inspectable item.
    Item { id: String },
}

impl std::fmt::Display for HotspotTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage { order } => write!(f, "stage {order}"),
            Self::Item { id } => write!(f, "item {id}"),
        }
    }
}

/// An inspectable prop referenced by hotspots (a note, a photo, a keypad).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Identifier unique within the room.
    pub id: String,

    /// Presentation data, opaque to the engine.
    #[serde(default)]
    pub detail: serde_json::Value,
}

// ---------------------------------------------------------------------------
// RoomDefinition
// ---------------------------------------------------------------------------

/// A complete, immutable room: the ordered stages plus the optional visual
/// layout around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDefinition {
    /// The room's unique id.
    pub id: RoomId,

    /// Display name shown in listings.
    pub name: String,

    /// Stages sorted by `order` after validation.
    pub stages: Vec<StageDefinition>,

    /// Smallest team allowed to start this room. At least 1.
    pub min_team_size: usize,

    /// Largest team allowed. At least `min_team_size`.
    pub max_team_size: usize,

    /// Optional time limit. `None` means untimed; `Some(0)` is rejected
    /// at validation.
    pub time_limit_seconds: Option<u64>,

    /// Inspectable items hotspots may reference.
    #[serde(default)]
    pub items: Vec<ItemDefinition>,

    /// Interactive layout. Empty for rooms without a scene.
    #[serde(default)]
    pub layout: Vec<Hotspot>,
}

impl RoomDefinition {
    /// Validates the definition and returns it in canonical form.
    ///
    /// Run once at load/insert time. On success the stages are sorted by
    /// `order` and every `correct_answer` is normalized, so the engine can
    /// index stages positionally and compare answers directly.
    ///
    /// # Errors
    /// - [`RoomError::NoStages`] — a room must have at least one stage
    /// - [`RoomError::InvalidTeamBounds`] — requires `1 ≤ min ≤ max`
    /// - [`RoomError::InvalidTimeLimit`] — a time limit of zero seconds
    /// - [`RoomError::DuplicateStageOrder`] — two stages share an order
    /// - [`RoomError::DanglingHotspot`] — a hotspot targets a stage order
    ///   or item id that doesn't exist in this room
    pub fn validated(mut self) -> Result<Self, RoomError> {
        if self.stages.is_empty() {
            return Err(RoomError::NoStages(self.id));
        }
        if self.min_team_size < 1 || self.min_team_size > self.max_team_size {
            return Err(RoomError::InvalidTeamBounds {
                room: self.id,
                min: self.min_team_size,
                max: self.max_team_size,
            });
        }
        if self.time_limit_seconds == Some(0) {
            return Err(RoomError::InvalidTimeLimit(self.id));
        }

        self.stages.sort_by_key(|s| s.order);
        for pair in self.stages.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(RoomError::DuplicateStageOrder {
                    room: self.id,
                    order: pair[0].order,
                });
            }
        }

        for stage in &mut self.stages {
            if let Some(answer) = &stage.correct_answer {
                stage.correct_answer = Some(normalize_answer(answer));
            }
        }

        for hotspot in &self.layout {
            let resolves = match &hotspot.target {
                HotspotTarget::Stage { order } => {
                    self.stages.iter().any(|s| s.order == *order)
                }
                HotspotTarget::Item { id } => self.items.iter().any(|i| i.id == *id),
            };
            if !resolves {
                return Err(RoomError::DanglingHotspot {
                    room: self.id,
                    hotspot: hotspot.id.clone(),
                    target: hotspot.target.to_string(),
                });
            }
        }

        Ok(self)
    }

    /// Number of stages in the room.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The stage at the given position, if any. Positions follow the
    /// canonical sorted order established by [`validated`](Self::validated).
    pub fn stage(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    /// The public projection of the stage at `index` — what participants
    /// get to see. Never includes the answer or hint texts.
    pub fn stage_view(&self, index: usize, hints_revealed: usize) -> Option<StageView> {
        self.stage(index).map(|stage| StageView {
            stage_index: index,
            puzzle: stage.puzzle.clone(),
            hints_available: stage.hints.len(),
            hints_revealed,
        })
    }

    /// The time limit in milliseconds, if the room is timed. Saturates so
    /// an absurdly large limit behaves as "effectively untimed" instead of
    /// overflowing.
    pub fn time_limit_ms(&self) -> Option<u64> {
        self.time_limit_seconds.map(|s| s.saturating_mul(1_000))
    }
}

// =========================================================================
// Tests
// =========================================================================
