//! Per-user library state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

/// Identifier of a library user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user's progress and preferences for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    /// Episodes the user has watched.
    #[serde(default)]
    pub watched_episodes: u32,

    /// When the user last watched an episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched_at: Option<DateTime<Utc>>,

    /// Whether the user marked the entity as a favorite.
    #[serde(default)]
    pub is_favorite: bool,

    /// The user's own vote, 1-10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
}

/// A snapshot of one user's state across the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    /// Unique user ID.
    pub id: UserId,

    /// Login name.
    pub username: String,

    /// Watch records keyed by entity.
    #[serde(default)]
    pub watch: BTreeMap<EntityId, WatchRecord>,
}

impl UserState {
    /// Creates a user with no watch history.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            watch: BTreeMap::new(),
        }
    }

    /// Returns the watch record for an entity, if the user has one.
    pub fn record(&self, entity: EntityId) -> Option<&WatchRecord> {
        self.watch.get(&entity)
    }
}
