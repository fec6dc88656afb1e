//! Convenient re-exports for the most commonly used types.
//!
//! ```
//! use collection_engine_rs::prelude::*;
//! ```

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::EngineConfig;
pub use crate::definitions::{FilterDefinition, FilterDraft, FilterId, OwnerScope, UpdateOutcome};
pub use crate::engine::{CollectionEngine, EngineError, InstallNotification};
pub use crate::filter::{describe_operators, FilterNode, OperatorKind, ValidationErrors};
pub use crate::membership::{Freshness, MembershipKey, MembershipView, UserScope};
pub use crate::store::{PersistedState, StateStore};
