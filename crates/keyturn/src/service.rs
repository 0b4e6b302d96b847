//! `EscapeService`: the engine's operations wired to stores and relay.
//!
//! This is what the request layer calls. Each operation resolves the
//! session's actor (lazily respawning it from the store after a restart),
//! sends the command, and returns the committed session value. The service
//! never touches session state directly — the actor owns it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use keyturn_engine::start_session;
use keyturn_protocol::{ParticipantId, RoomId, SessionId};
use keyturn_relay::Relay;
use keyturn_room::RoomStore;
use keyturn_session::{Session, SessionStore};
use tokio::sync::Mutex;

use crate::actor::{SessionHandle, spawn_session};
use crate::registry::SessionRegistry;
use crate::KeyturnError;

/// Command channel size for session actors. A full channel applies
/// backpressure to the request layer instead of buffering unboundedly.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Milliseconds since the Unix epoch, read at call time.
///
/// The engine has no background timers; this is the wall-clock reading
/// every transition is evaluated against. A system clock before 1970
/// degrades to 0 rather than panicking.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The assembled progression service.
///
/// Generic over its collaborators so deployments can swap the in-memory
/// stores for durable ones and the in-process broadcaster for an external
/// relay without touching this code.
pub struct EscapeService<RS: RoomStore, SS: SessionStore, R: Relay> {
    rooms: Arc<RS>,
    sessions: Arc<SS>,
    relay: Arc<R>,
    registry: Mutex<SessionRegistry>,
}

impl<RS: RoomStore, SS: SessionStore, R: Relay> EscapeService<RS, SS, R> {
    /// Wires a service from its three collaborators.
    pub fn new(rooms: Arc<RS>, sessions: Arc<SS>, relay: Arc<R>) -> Self {
        Self {
            rooms,
            sessions,
            relay,
            registry: Mutex::new(SessionRegistry::new()),
        }
    }

    /// Starts a session for `team` in the given room.
    ///
    /// Loads and (re)checks the room, gates on team size, persists the new
    /// session, spawns its actor, and broadcasts `SessionStarted`.
    ///
    /// # Errors
    /// - [`keyturn_room::RoomError::NotFound`] — unknown room
    /// - [`keyturn_session::SessionError::TeamSizeRejected`] — team outside
    ///   the room's bounds
    pub async fn create_session(
        &self,
        room_id: RoomId,
        team: BTreeSet<ParticipantId>,
    ) -> Result<Session, KeyturnError> {
        let room = self.rooms.load_room(room_id).await?;
        let transition = start_session(&room, team, now_ms())?;

        self.sessions.create_session(&transition.session).await?;

        let handle = spawn_session(
            transition.session.clone(),
            room,
            Arc::clone(&self.sessions),
            Arc::clone(&self.relay),
            DEFAULT_CHANNEL_SIZE,
        );
        self.registry.lock().await.insert(handle);

        let relay = Arc::clone(&self.relay);
        let events = transition.events;
        tokio::spawn(async move {
            for envelope in &events {
                relay.publish(envelope).await;
            }
        });

        tracing::info!(
            session_id = %transition.session.id,
            room_id = %room_id,
            "session started"
        );
        Ok(transition.session)
    }

    /// Submits an answer for the given stage.
    pub async fn submit_answer(
        &self,
        session_id: &SessionId,
        stage_index: usize,
        answer: &str,
        participant: ParticipantId,
    ) -> Result<Session, KeyturnError> {
        let handle = self.handle_for(session_id).await?;
        let result = handle
            .submit_answer(stage_index, answer.to_string(), participant)
            .await;
        self.reap_if_finished(session_id, &result).await;
        result
    }

    /// Reveals the next hint for the given stage.
    pub async fn request_hint(
        &self,
        session_id: &SessionId,
        stage_index: usize,
    ) -> Result<Session, KeyturnError> {
        let handle = self.handle_for(session_id).await?;
        let result = handle.request_hint(stage_index).await;
        self.reap_if_finished(session_id, &result).await;
        result
    }

    /// Abandons the session. Idempotent.
    pub async fn abandon(&self, session_id: &SessionId) -> Result<Session, KeyturnError> {
        let handle = self.handle_for(session_id).await?;
        let result = handle.abandon().await;
        self.reap_if_finished(session_id, &result).await;
        result
    }

    /// Idempotent read of the session's current persisted state.
    ///
    /// Goes straight to the store, so it works with no actor resident —
    /// this is the recovery path after a crash between commit and
    /// broadcast.
    pub async fn session_snapshot(&self, session_id: &SessionId) -> Result<Session, KeyturnError> {
        Ok(self.sessions.load_session(session_id).await?)
    }

    /// Brings a persisted session's actor back into this process and
    /// returns the current state.
    ///
    /// Every operation does this implicitly on demand; calling it up front
    /// lets a request layer warm a session after failover. A session whose
    /// actor is already resident is returned as-is.
    pub async fn resume_session(&self, session_id: &SessionId) -> Result<Session, KeyturnError> {
        self.handle_for(session_id).await?;
        self.session_snapshot(session_id).await
    }

    /// Number of session actors resident in this process.
    pub async fn resident_sessions(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Returns the actor handle for a session, respawning it from the
    /// store if this process doesn't have one (restart, failover).
    async fn handle_for(&self, session_id: &SessionId) -> Result<SessionHandle, KeyturnError> {
        let mut registry = self.registry.lock().await;
        if let Some(handle) = registry.get(session_id) {
            return Ok(handle);
        }

        let session = self.sessions.load_session(session_id).await?;
        let room = self.rooms.load_room(session.room_id).await?;
        let handle = spawn_session(
            session,
            room,
            Arc::clone(&self.sessions),
            Arc::clone(&self.relay),
            DEFAULT_CHANNEL_SIZE,
        );
        registry.insert(handle.clone());
        tracing::debug!(%session_id, "session actor resumed from store");
        Ok(handle)
    }

    /// Shuts down the actor of a session that just reached a terminal
    /// state. Later calls fall through to the store and get the proper
    /// terminal-state rejection.
    async fn reap_if_finished(
        &self,
        session_id: &SessionId,
        result: &Result<Session, KeyturnError>,
    ) {
        let finished = match result {
            Ok(session) => session.status.is_terminal(),
            Err(KeyturnError::Engine(keyturn_engine::EngineError::SessionExpired {
                ..
            })) => true,
            Err(_) => false,
        };
        if !finished {
            return;
        }

        if let Some(handle) = self.registry.lock().await.remove(session_id) {
            handle.shutdown().await;
            tracing::debug!(%session_id, "terminal session actor reaped");
        }
    }
}
