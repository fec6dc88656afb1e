//! Convenient re-exports for the most commonly used types.
//!
//! ```
//! use collection_library_rs::prelude::*;
//! ```

pub use crate::error::{ProviderError, Result};
pub use crate::events::{ChangeKind, EntityMutation, UserChangeKind, UserStateChange};
pub use crate::models::{
    AnimeType, EntityId, EntityKind, LibraryEntity, UserId, UserState, WatchRecord,
};
pub use crate::provider::{
    EntitySnapshotProvider, InMemoryLibrary, LibrarySnapshot, UserSnapshotProvider,
};
