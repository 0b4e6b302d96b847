//! Wire protocol for Keyturn.
//!
//! This crate defines the event vocabulary the progression engine speaks to
//! session participants:
//!
//! - **Types** ([`EventEnvelope`], [`SessionEvent`], [`StageView`], identity
//!   newtypes) — the structures delivered to clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become bytes
//!   for an external transport.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer is the leaf of the stack. It knows nothing about
//! rooms, sessions, or storage — only the shapes that travel outward.
//!
//! ```text
//! Engine (transitions) → Protocol (EventEnvelope) → Relay (delivery)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    EventEnvelope, ParticipantId, PuzzlePayload, RoomId, SessionEvent, SessionId, StageView,
};
