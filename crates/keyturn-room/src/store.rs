//! The room store collaborator: where validated definitions come from.
//!
//! The engine only ever *reads* room definitions, so the trait is a single
//! lookup. Production deployments back it with a relational store; tests
//! and single-node setups use [`InMemoryRoomStore`]. Either way, validation
//! happens before a definition becomes loadable — a store must never hand
//! out a room that [`RoomDefinition::validated`] would reject.

use std::collections::HashMap;
use std::sync::Arc;

use keyturn_protocol::RoomId;
use tokio::sync::RwLock;

use crate::{RoomDefinition, RoomError};

/// Read access to room definitions.
///
/// Returns `Arc`s because a single definition is shared read-only by every
/// session running that room.
pub trait RoomStore: Send + Sync + 'static {
    /// Loads the room with the given id, stages sorted by order.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no such room exists.
    fn load_room(
        &self,
        id: RoomId,
    ) -> impl std::future::Future<Output = Result<Arc<RoomDefinition>, RoomError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryRoomStore
// ---------------------------------------------------------------------------

/// A [`RoomStore`] backed by a process-local map.
///
/// `insert` runs full validation, so anything loadable from this store is
/// already in canonical form.
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<RoomDefinition>>>,
}

impl InMemoryRoomStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a definition, replacing any previous version.
    ///
    /// # Errors
    /// Any validation error from [`RoomDefinition::validated`].
    pub async fn insert(&self, room: RoomDefinition) -> Result<(), RoomError> {
        let room = room.validated()?;
        let id = room.id;
        self.rooms.write().await.insert(id, Arc::new(room));
        tracing::debug!(room_id = %id, "room definition stored");
        Ok(())
    }
}

impl RoomStore for InMemoryRoomStore {
    async fn load_room(&self, id: RoomId) -> Result<Arc<RoomDefinition>, RoomError> {
        self.rooms
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RoomError::NotFound(id))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageDefinition;
    use keyturn_protocol::PuzzlePayload;
    use serde_json::json;

    fn minimal_room(id: u64) -> RoomDefinition {
        RoomDefinition {
            id: RoomId(id),
            name: "Test".into(),
            stages: vec![StageDefinition {
                order: 0,
                puzzle: PuzzlePayload::Narrative(json!({})),
                correct_answer: None,
                hints: vec![],
            }],
            min_team_size: 1,
            max_team_size: 8,
            time_limit_seconds: None,
            items: vec![],
            layout: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_then_load_round_trips() {
        let store = InMemoryRoomStore::new();
        store.insert(minimal_room(1)).await.unwrap();

        let loaded = store.load_room(RoomId(1)).await.unwrap();
        assert_eq!(loaded.id, RoomId(1));
        assert_eq!(loaded.stage_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_room_returns_not_found() {
        let store = InMemoryRoomStore::new();
        let result = store.load_room(RoomId(404)).await;
        assert!(matches!(result, Err(RoomError::NotFound(RoomId(404)))));
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_definition() {
        let store = InMemoryRoomStore::new();
        let mut bad = minimal_room(2);
        bad.stages.clear();

        assert!(matches!(store.insert(bad).await, Err(RoomError::NoStages(_))));
        // Nothing was stored.
        assert!(store.load_room(RoomId(2)).await.is_err());
    }
}
