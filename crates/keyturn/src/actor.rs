//! Session actor: an isolated Tokio task that owns one live session.
//!
//! The session is the unit of mutual exclusion. All operations against it
//! flow through this actor's command channel, so stage-index comparisons
//! and hint-counter increments are linearizable — two near-simultaneous
//! correct answers on the same stage can never both advance it. Operations
//! against different sessions run on independent actors with no shared
//! mutable state.
//!
//! Commit order per command: run the pure engine, save the produced session
//! through the store's compare-and-swap, *then* hand the events to the
//! relay on a detached task. A crash after commit loses only the broadcast,
//! which participants recover from by re-fetching the session snapshot.

use std::sync::Arc;

use keyturn_engine::{EngineError, Transition, abandon, request_hint, submit_answer};
use keyturn_protocol::{ParticipantId, SessionId};
use keyturn_relay::Relay;
use keyturn_room::RoomDefinition;
use keyturn_session::{Session, SessionError, SessionStore};
use tokio::sync::{mpsc, oneshot};

use crate::KeyturnError;
use crate::service::now_ms;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    SubmitAnswer {
        stage_index: usize,
        answer: String,
        participant: ParticipantId,
        reply: oneshot::Sender<Result<Session, KeyturnError>>,
    },
    RequestHint {
        stage_index: usize,
        reply: oneshot::Sender<Result<Session, KeyturnError>>,
    },
    Abandon {
        reply: oneshot::Sender<Result<Session, KeyturnError>>,
    },
    Shutdown,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The session this handle serializes access to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Submits an answer for the given stage on behalf of a participant.
    pub async fn submit_answer(
        &self,
        stage_index: usize,
        answer: String,
        participant: ParticipantId,
    ) -> Result<Session, KeyturnError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::SubmitAnswer {
                stage_index,
                answer,
                participant,
                reply: reply_tx,
            })
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?
    }

    /// Requests the next hint for the given stage.
    pub async fn request_hint(&self, stage_index: usize) -> Result<Session, KeyturnError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::RequestHint {
                stage_index,
                reply: reply_tx,
            })
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?
    }

    /// Abandons the session.
    pub async fn abandon(&self) -> Result<Session, KeyturnError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Abandon { reply: reply_tx })
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| KeyturnError::SessionUnavailable(self.session_id.clone()))?
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SessionCommand::Shutdown).await;
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<SS: SessionStore, R: Relay> {
    session: Session,
    room: Arc<RoomDefinition>,
    store: Arc<SS>,
    relay: Arc<R>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<SS: SessionStore, R: Relay> SessionActor<SS, R> {
    async fn run(mut self) {
        tracing::debug!(session_id = %self.session.id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::SubmitAnswer {
                    stage_index,
                    answer,
                    participant,
                    reply,
                } => {
                    let result = submit_answer(
                        &self.session,
                        &self.room,
                        stage_index,
                        &answer,
                        participant,
                        now_ms(),
                    );
                    let _ = reply.send(self.apply(result).await);
                }
                SessionCommand::RequestHint { stage_index, reply } => {
                    let result = request_hint(&self.session, &self.room, stage_index, now_ms());
                    let _ = reply.send(self.apply(result).await);
                }
                SessionCommand::Abandon { reply } => {
                    let result = abandon(&self.session, now_ms());
                    let _ = reply.send(self.apply(result).await);
                }
                SessionCommand::Shutdown => break,
            }
        }

        tracing::debug!(session_id = %self.session.id, "session actor stopped");
    }

    /// Commits the transition behind an engine result, including the
    /// timeout transition carried inside a `SessionExpired` failure.
    async fn apply(
        &mut self,
        result: Result<Transition, EngineError>,
    ) -> Result<Session, KeyturnError> {
        match result {
            Ok(transition) => self.commit(transition).await,
            Err(EngineError::SessionExpired { session, timeout }) => {
                // The operation failed, but the lazily detected timeout is
                // real state: commit it before surfacing the failure.
                self.commit((*timeout).clone()).await?;
                Err(EngineError::SessionExpired { session, timeout }.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn commit(&mut self, transition: Transition) -> Result<Session, KeyturnError> {
        // Idempotent no-ops (double abandon) produce no events and an
        // unchanged session; skip the store round trip.
        if transition.events.is_empty() && transition.session == self.session {
            return Ok(self.session.clone());
        }

        let committed = match self.store.save_session(&transition.session).await {
            Ok(session) => session,
            Err(err @ SessionError::ConcurrentModification { .. }) => {
                // Someone committed through another path. Resync our copy
                // so the next command sees current state, and let the
                // caller re-fetch and retry.
                if let Ok(current) = self.store.load_session(&transition.session.id).await {
                    self.session = current;
                }
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        self.session = committed.clone();

        // Broadcast strictly after commit, detached from the caller. A
        // terminal transition also tears down the session's subscriptions,
        // after its final events have gone out.
        let relay = Arc::clone(&self.relay);
        let events = transition.events;
        let retired = committed.status.is_terminal().then(|| committed.id.clone());
        tokio::spawn(async move {
            for envelope in &events {
                relay.publish(envelope).await;
            }
            if let Some(session_id) = retired {
                relay.drop_session(&session_id).await;
            }
        });

        Ok(committed)
    }
}

/// Spawns an actor owning `session` and returns its handle.
pub(crate) fn spawn_session<SS: SessionStore, R: Relay>(
    session: Session,
    room: Arc<RoomDefinition>,
    store: Arc<SS>,
    relay: Arc<R>,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let session_id = session.id.clone();

    let actor = SessionActor {
        session,
        room,
        store,
        relay,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
