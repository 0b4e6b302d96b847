//! Synchronization broadcasting for Keyturn.
//!
//! Converts committed engine transitions into deliveries to every current
//! session participant, in production order. The engine's contract with
//! this layer is one method: [`Relay::publish`]. State authority lives in
//! the session store — a failed delivery is logged and forgotten, never
//! surfaced as a failure of the state change that produced it.
//!
//! # Key types
//!
//! - [`Relay`] — the publish seam the facade talks to
//! - [`Broadcaster`] — in-process per-participant channel fan-out
//! - [`EncodingRelay`] — codec-encodes envelopes for an external transport

#![allow(async_fn_in_trait)]

mod broadcaster;
mod error;

pub use broadcaster::{
    Broadcaster, EncodingRelay, ParticipantReceiver, ParticipantSender, Relay,
};
pub use error::RelayError;
