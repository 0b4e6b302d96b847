//! Event fan-out to session participants.
//!
//! The engine commits a transition and then hands the resulting envelopes
//! here, fire-and-forget. Delivery to one participant failing (closed
//! channel, slow client already gone) is logged and skipped — it never
//! blocks the other participants and never rolls back the state change.
//! Envelopes already carry per-session sequence numbers, so a receiver on
//! an unreliable transport can discard duplicates and reorder on its own.

use std::collections::HashMap;

use keyturn_protocol::{Codec, EventEnvelope, ParticipantId, SessionId};
use tokio::sync::{RwLock, mpsc};

use crate::RelayError;

/// Channel sender delivering envelopes to one participant's connection.
pub type ParticipantSender = mpsc::UnboundedSender<EventEnvelope>;

/// The receiving half handed to a participant's connection handler.
pub type ParticipantReceiver = mpsc::UnboundedReceiver<EventEnvelope>;

// ---------------------------------------------------------------------------
// Relay trait
// ---------------------------------------------------------------------------

/// The engine's only contract with the real-time layer: "publish this
/// event object". Delivery guarantees and transport are the relay's
/// concern; publishing is infallible by design.
pub trait Relay: Send + Sync + 'static {
    /// Delivers one envelope to whoever should see it.
    fn publish(&self, envelope: &EventEnvelope) -> impl std::future::Future<Output = ()> + Send;

    /// Tears down per-session delivery state once the session has reached
    /// a terminal state and its final events are published. Relays with no
    /// per-session state keep the default no-op.
    fn drop_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = ()> + Send {
        let _ = session_id;
        async {}
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// In-process fan-out: one unbounded channel per subscribed participant,
/// grouped by session.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SessionId, HashMap<ParticipantId, ParticipantSender>>>,
}

impl Broadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a participant to a session's event stream.
    ///
    /// Returns the receiving half. Subscribing again replaces the previous
    /// channel (reconnect case) — the old receiver just stops getting
    /// events.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        participant: ParticipantId,
    ) -> ParticipantReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .await
            .entry(session_id)
            .or_default()
            .insert(participant, tx);
        rx
    }

    /// Removes one participant's subscription.
    pub async fn unsubscribe(&self, session_id: &SessionId, participant: ParticipantId) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(session_subs) = subscribers.get_mut(session_id) {
            session_subs.remove(&participant);
            if session_subs.is_empty() {
                subscribers.remove(session_id);
            }
        }
    }

    /// Number of participants currently subscribed to a session.
    pub async fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.subscribers
            .read()
            .await
            .get(session_id)
            .map_or(0, HashMap::len)
    }
}

impl Relay for Broadcaster {
    /// Drops every subscription for the session. Their receivers see the
    /// channel close after the final delivered event.
    async fn drop_session(&self, session_id: &SessionId) {
        self.subscribers.write().await.remove(session_id);
    }

    async fn publish(&self, envelope: &EventEnvelope) {
        let subscribers = self.subscribers.read().await;
        let Some(session_subs) = subscribers.get(&envelope.session_id) else {
            tracing::trace!(
                session_id = %envelope.session_id,
                seq = envelope.seq,
                "no subscribers for event"
            );
            return;
        };

        for (participant, sender) in session_subs {
            if sender.send(envelope.clone()).is_err() {
                tracing::debug!(
                    session_id = %envelope.session_id,
                    %participant,
                    seq = envelope.seq,
                    "participant channel closed, delivery dropped"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EncodingRelay
// ---------------------------------------------------------------------------

/// A [`Relay`] that encodes envelopes through a [`Codec`] and forwards the
/// bytes to an external transport's sink.
///
/// This is the seam to a real fan-out service: the engine stays oblivious
/// to what's on the other end of the channel.
pub struct EncodingRelay<C: Codec> {
    codec: C,
    sink: mpsc::UnboundedSender<Vec<u8>>,
}

impl<C: Codec> EncodingRelay<C> {
    /// Wraps a byte sink with the given codec.
    pub fn new(codec: C, sink: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { codec, sink }
    }

    fn forward(&self, envelope: &EventEnvelope) -> Result<(), RelayError> {
        let bytes = self.codec.encode(envelope)?;
        self.sink.send(bytes).map_err(|_| RelayError::SinkClosed)
    }
}

impl<C: Codec> Relay for EncodingRelay<C> {
    async fn publish(&self, envelope: &EventEnvelope) {
        if let Err(error) = self.forward(envelope) {
            tracing::warn!(
                session_id = %envelope.session_id,
                seq = envelope.seq,
                %error,
                "relay publish failed"
            );
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
