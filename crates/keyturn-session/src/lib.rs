//! Session state for Keyturn.
//!
//! This crate owns the mutable half of the data model:
//!
//! 1. **The session value** — [`Session`], [`Attempt`], [`SessionStatus`]:
//!    where a team is, what they've tried, which hints they've burned.
//! 2. **Creation gating** — [`Session::create`] enforces the room's team
//!    size bounds before anything is allocated.
//! 3. **Persistence** — the [`SessionStore`] trait with compare-and-swap
//!    save semantics, plus [`InMemorySessionStore`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)   ← computes Session → Session transitions
//!     ↕
//! Session layer (this crate)  ← the values and their persistence contract
//!     ↕
//! Room layer (below)  ← the immutable definitions sessions reference
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod session;
mod store;

pub use error::SessionError;
pub use session::{Attempt, Session, SessionStatus};
pub use store::{InMemorySessionStore, SessionStore};
