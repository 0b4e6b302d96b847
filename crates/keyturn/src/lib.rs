//! Keyturn: a progression engine for multiplayer escape rooms.
//!
//! A team starts a session against a room definition, works through its
//! puzzle stages strictly in order, and every state change is fanned out to
//! all connected teammates. This crate assembles the workspace layers into
//! one service:
//!
//! - [`keyturn_room`] — room definitions, validation, the [`RoomStore`]
//! - [`keyturn_session`] — session state and the compare-and-swap
//!   [`SessionStore`]
//! - [`keyturn_engine`] — the pure transition functions
//! - [`keyturn_relay`] — event fan-out to participants
//!
//! The entry point is [`EscapeService`]. It serializes all operations on a
//! session through a per-session actor task, commits transitions to the
//! session store, and broadcasts the resulting events.
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use keyturn::prelude::*;
//!
//! # async fn demo() -> Result<(), KeyturnError> {
//! let rooms = Arc::new(InMemoryRoomStore::new());
//! let sessions = Arc::new(InMemorySessionStore::new());
//! let relay = Arc::new(Broadcaster::new());
//! let service = EscapeService::new(rooms, sessions, Arc::clone(&relay));
//!
//! let team = BTreeSet::from([ParticipantId(1), ParticipantId(2)]);
//! let session = service.create_session(RoomId(1), team).await?;
//! service
//!     .submit_answer(&session.id, 0, "golden key", ParticipantId(1))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod actor;
mod error;
mod registry;
mod service;

pub use actor::SessionHandle;
pub use error::KeyturnError;
pub use service::EscapeService;

/// Everything needed to stand up and drive a service.
pub mod prelude {
    pub use crate::{EscapeService, KeyturnError, SessionHandle};
    pub use keyturn_engine::{EngineError, Transition};
    pub use keyturn_protocol::{
        EventEnvelope, ParticipantId, RoomId, SessionEvent, SessionId, StageView,
    };
    pub use keyturn_relay::{Broadcaster, Relay};
    pub use keyturn_room::{InMemoryRoomStore, RoomDefinition, RoomError, RoomStore};
    pub use keyturn_session::{
        InMemorySessionStore, Session, SessionError, SessionStatus, SessionStore,
    };
}

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info`. Call once at process start.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .init();
}
