//! The session store collaborator: versioned persistence for sessions.
//!
//! `save_session` performs a compare-and-swap on the session's `version`
//! field. That CAS is how single-writer-per-session discipline is enforced
//! across a possibly distributed request layer: whoever read an older
//! version loses with [`SessionError::ConcurrentModification`] and must
//! re-fetch. State authority lives here, not in successful broadcast.

use std::collections::HashMap;

use keyturn_protocol::SessionId;
use tokio::sync::RwLock;

use crate::{Session, SessionError};

/// Versioned persistence for sessions.
pub trait SessionStore: Send + Sync + 'static {
    /// Loads the current state of a session.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no such session exists.
    fn load_session(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Session, SessionError>> + Send;

    /// Stores a brand-new session at version 0.
    ///
    /// # Errors
    /// [`SessionError::AlreadyExists`] if the id is taken.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// Commits a new session value, compare-and-swapping on `version`.
    ///
    /// On success the stored version is bumped by one and the committed
    /// value (with the bumped version) is returned — keep working with
    /// that, not with the value you passed in.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — the session was never created
    /// - [`SessionError::ConcurrentModification`] — the stored version no
    ///   longer matches `session.version`
    fn save_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

/// A [`SessionStore`] backed by a process-local map.
///
/// The CAS here is trivially atomic because every operation holds the map's
/// write lock; a relational implementation gets the same effect from a
/// `WHERE version = $expected` guard on the UPDATE.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn load_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    async fn create_session(&self, session: &Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionError::AlreadyExists(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session.clone());
        tracing::debug!(session_id = %session.id, "session stored");
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get(&session.id)
            .ok_or_else(|| SessionError::NotFound(session.id.clone()))?;

        if stored.version != session.version {
            return Err(SessionError::ConcurrentModification {
                session: session.id.clone(),
                expected: session.version,
                found: stored.version,
            });
        }

        let mut committed = session.clone();
        committed.version += 1;
        sessions.insert(committed.id.clone(), committed.clone());
        Ok(committed)
    }
}

// =========================================================================
// Tests
// =========================================================================
