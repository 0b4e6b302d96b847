//! Registry of live session actors.

use std::collections::HashMap;

use keyturn_protocol::SessionId;

use crate::actor::SessionHandle;

/// Tracks the actor handle for every session currently resident in this
/// process. Not thread-safe on its own — the service owns it behind a
/// mutex, the same way a connection accept loop owns its session map.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    handles: HashMap<SessionId, SessionHandle>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, handle: SessionHandle) {
        self.handles.insert(handle.session_id().clone(), handle);
    }

    pub(crate) fn get(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.handles.get(session_id).cloned()
    }

    pub(crate) fn remove(&mut self, session_id: &SessionId) -> Option<SessionHandle> {
        self.handles.remove(session_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}
