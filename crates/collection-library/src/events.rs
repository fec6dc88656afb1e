//! Change events produced by the library and consumed by the collection engine.

use serde::{Deserialize, Serialize};

use crate::models::{EntityId, EntityKind, UserId};

/// What changed about a library entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The entity was added to the library.
    Added,
    /// The entity was removed from the library.
    Removed,
    /// Files were added, removed or re-hashed (resolutions, languages).
    FilesChanged,
    /// Descriptive metadata changed (name, type, dates, rating).
    MetadataChanged,
    /// The tag set changed.
    TagsChanged,
    /// Episode counts changed.
    EpisodesChanged,
}

/// A single entity mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMutation {
    /// The entity that changed.
    pub entity_id: EntityId,
    /// Its kind.
    pub entity_kind: EntityKind,
    /// What changed.
    pub change_kind: ChangeKind,
}

impl EntityMutation {
    /// Creates a mutation event.
    pub fn new(entity_id: EntityId, entity_kind: EntityKind, change_kind: ChangeKind) -> Self {
        Self {
            entity_id,
            entity_kind,
            change_kind,
        }
    }
}

/// What changed about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChangeKind {
    /// Watch progress, favorites or votes changed.
    WatchStateChanged,
    /// User settings changed.
    PreferencesChanged,
    /// The user account was removed.
    Removed,
}

/// A single user state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserStateChange {
    /// The user whose state changed.
    pub user_id: UserId,
    /// What changed.
    pub change_kind: UserChangeKind,
}

impl UserStateChange {
    /// Creates a user change event.
    pub fn new(user_id: UserId, change_kind: UserChangeKind) -> Self {
        Self {
            user_id,
            change_kind,
        }
    }
}
