//! Smart collection engine.
//!
//! This crate keeps the matching sets of saved filters ("smart collections")
//! current while the library and per-user watch state change:
//!
//! - [`filter`]: the typed operator catalog, validation, evaluation and
//!   dependency classification of filter trees.
//! - [`definitions`]: the store of saved filters.
//! - [`membership`]: the cached matching set per filter and user, with the
//!   generation discipline that keeps installs monotonic.
//! - [`engine`]: the invalidation engine that routes change events to
//!   recomputes on a bounded worker pool.
//! - [`store`]: on-disk persistence of definitions and memberships.

pub mod clock;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod filter;
pub mod membership;
pub mod prelude;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use definitions::{
    DefinitionError, DefinitionStore, FilterDefinition, FilterDraft, FilterId, OwnerScope,
    SavedFilter, UpdateOutcome,
};
pub use engine::{CollectionEngine, EngineBuilder, EngineError, InstallNotification};
pub use membership::{Freshness, MembershipKey, MembershipView, UserScope};
pub use store::{PersistedState, StateStore, StateStoreError};
