//! The Keyturn progression engine.
//!
//! Pure state-machine logic for advancing a team through a room: answer
//! checking, stage advancement, hint disclosure, lazy time-limit expiry,
//! completion detection, and abandonment.
//!
//! This crate performs no I/O and never reads the clock — every operation
//! takes the current session, the room definition, and an explicit `now_ms`
//! reading, and returns a [`Transition`] holding the complete next session
//! value plus the stamped event envelopes. Persistence, serialization of
//! concurrent callers, and broadcast all live a layer up in the `keyturn`
//! facade crate.
//!
//! # Operations
//!
//! - [`start_session`] — create a gated session, emit `SessionStarted`
//! - [`submit_answer`] — the core answer-check/advance/complete step
//! - [`request_hint`] — strictly ordered hint disclosure
//! - [`abandon`] — idempotent terminal give-up
//! - [`check_timeout`] — lazy time-limit transition

mod engine;
mod error;

pub use engine::{Transition, abandon, check_timeout, request_hint, start_session, submit_answer};
pub use error::EngineError;
