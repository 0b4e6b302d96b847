//! Room definitions for Keyturn.
//!
//! A room is the immutable blueprint of an escape experience: an ordered
//! sequence of stages (puzzle, answer, hints) plus an optional hotspot
//! layout. Sessions reference rooms read-only; nothing in a live session
//! ever mutates a definition.
//!
//! # Key types
//!
//! - [`RoomDefinition`] / [`StageDefinition`] — the authored content
//! - [`Hotspot`] / [`HotspotTarget`] / [`ItemDefinition`] — the scene layout
//! - [`RoomStore`] — the storage collaborator trait
//! - [`InMemoryRoomStore`] — process-local store for tests and single nodes
//!
//! All structural invariants are enforced by [`RoomDefinition::validated`]
//! at load time, never patched up afterwards.

#![allow(async_fn_in_trait)]

mod definition;
mod error;
mod store;

pub use definition::{
    Hotspot, HotspotTarget, ItemDefinition, RoomDefinition, StageDefinition, normalize_answer,
};
pub use error::RoomError;
pub use store::{InMemoryRoomStore, RoomStore};
