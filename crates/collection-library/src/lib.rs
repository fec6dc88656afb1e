//! Library model and snapshot providers for smart collections.
//!
//! This crate is the boundary between the collection engine and whatever owns
//! the media library. It defines:
//!
//! - the entity and user snapshots the engine reads ([`models`]),
//! - the change events the engine reacts to ([`events`]),
//! - the provider traits the engine pulls snapshots through ([`provider`]),
//!   plus an in-memory implementation used by the CLI and tests.
//!
//! # Quick Start
//!
//! ```
//! use collection_library_rs::prelude::*;
//!
//! let library = InMemoryLibrary::new();
//! let events = library.upsert_entity(LibraryEntity::new(EntityId(1), EntityKind::Series, "Frieren"));
//! assert_eq!(events[0].change_kind, ChangeKind::Added);
//! ```

pub mod error;
pub mod events;
pub mod models;
pub mod prelude;
pub mod provider;
