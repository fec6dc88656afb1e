//! Snapshot providers.
//!
//! The collection engine never owns library data. It pulls entity and user
//! snapshots through the two traits defined here, and learns about changes
//! through the events in [`crate::events`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::events::{ChangeKind, EntityMutation, UserChangeKind, UserStateChange};
use crate::models::{EntityId, EntityKind, LibraryEntity, UserId, UserState, WatchRecord};

/// Source of entity snapshots.
pub trait EntitySnapshotProvider: Send + Sync {
    /// Returns the IDs of all entities of the given kind.
    fn entity_ids(&self, kind: EntityKind) -> Result<Vec<EntityId>>;

    /// Returns the current snapshot of an entity, or `None` if it no longer exists.
    fn entity(&self, id: EntityId) -> Result<Option<LibraryEntity>>;
}

/// Source of per-user snapshots.
pub trait UserSnapshotProvider: Send + Sync {
    /// Returns the IDs of all known users.
    fn user_ids(&self) -> Result<Vec<UserId>>;

    /// Returns the current snapshot of a user, or `None` if unknown.
    fn user(&self, id: UserId) -> Result<Option<UserState>>;
}

/// Serialized form of a whole library, as read from a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    /// All entities.
    #[serde(default)]
    pub entities: Vec<LibraryEntity>,

    /// All users.
    #[serde(default)]
    pub users: Vec<UserState>,
}

impl LibrarySnapshot {
    /// Reads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// - Returns `ProviderError::Io` if the file cannot be read.
    /// - Returns `ProviderError::Json` if the file contains invalid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ProviderError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// An in-memory library implementing both provider traits.
///
/// Mutating methods return the event that describes the change so the caller
/// can forward it to the engine.
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    entities: RwLock<BTreeMap<EntityId, LibraryEntity>>,
    users: RwLock<BTreeMap<UserId, UserState>>,
}

impl InMemoryLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library populated from a snapshot.
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Self {
        let entities = snapshot.entities.into_iter().map(|e| (e.id, e)).collect();
        let users = snapshot.users.into_iter().map(|u| (u.id, u)).collect();
        Self {
            entities: RwLock::new(entities),
            users: RwLock::new(users),
        }
    }

    fn entities_read(&self) -> RwLockReadGuard<'_, BTreeMap<EntityId, LibraryEntity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entities_write(&self) -> RwLockWriteGuard<'_, BTreeMap<EntityId, LibraryEntity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn users_read(&self) -> RwLockReadGuard<'_, BTreeMap<UserId, UserState>> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn users_write(&self) -> RwLockWriteGuard<'_, BTreeMap<UserId, UserState>> {
        self.users.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces an entity.
    ///
    /// Returns one event per attribute domain that changed: a single `Added`
    /// for a new entity, nothing if the snapshot is identical.
    pub fn upsert_entity(&self, entity: LibraryEntity) -> Vec<EntityMutation> {
        let id = entity.id;
        let kind = entity.kind;
        let previous = self.entities_write().insert(id, entity.clone());

        let Some(old) = previous else {
            return vec![EntityMutation::new(id, kind, ChangeKind::Added)];
        };

        changed_domains(&old, &entity)
            .into_iter()
            .map(|change| EntityMutation::new(id, kind, change))
            .collect()
    }

    /// Removes an entity, returning the event if it existed.
    pub fn remove_entity(&self, id: EntityId) -> Option<EntityMutation> {
        self.entities_write()
            .remove(&id)
            .map(|old| EntityMutation::new(id, old.kind, ChangeKind::Removed))
    }

    /// Inserts or replaces a user.
    pub fn upsert_user(&self, user: UserState) -> UserStateChange {
        let id = user.id;
        self.users_write().insert(id, user);
        UserStateChange::new(id, UserChangeKind::WatchStateChanged)
    }

    /// Replaces one user's watch record for an entity.
    ///
    /// Returns `None` if the user is unknown.
    pub fn record_watch(
        &self,
        user: UserId,
        entity: EntityId,
        record: WatchRecord,
    ) -> Option<UserStateChange> {
        let mut users = self.users_write();
        let state = users.get_mut(&user)?;
        state.watch.insert(entity, record);
        Some(UserStateChange::new(user, UserChangeKind::WatchStateChanged))
    }

    /// Removes a user, returning the event if the user existed.
    pub fn remove_user(&self, id: UserId) -> Option<UserStateChange> {
        self.users_write()
            .remove(&id)
            .map(|_| UserStateChange::new(id, UserChangeKind::Removed))
    }

    /// Returns the number of entities.
    pub fn entity_count(&self) -> usize {
        self.entities_read().len()
    }
}

/// Lists the attribute domains that differ between two snapshots of one entity.
fn changed_domains(old: &LibraryEntity, new: &LibraryEntity) -> Vec<ChangeKind> {
    let mut changes = Vec::new();
    if old.resolutions != new.resolutions
        || old.audio_languages != new.audio_languages
        || old.subtitle_languages != new.subtitle_languages
    {
        changes.push(ChangeKind::FilesChanged);
    }
    if old.tags != new.tags {
        changes.push(ChangeKind::TagsChanged);
    }
    if old.episode_count != new.episode_count
        || old.missing_episode_count != new.missing_episode_count
    {
        changes.push(ChangeKind::EpisodesChanged);
    }
    if old.name != new.name
        || old.anime_type != new.anime_type
        || old.air_date != new.air_date
        || old.end_date != new.end_date
        || old.added_at != new.added_at
        || old.rating != new.rating
    {
        changes.push(ChangeKind::MetadataChanged);
    }
    changes
}

impl EntitySnapshotProvider for InMemoryLibrary {
    fn entity_ids(&self, kind: EntityKind) -> Result<Vec<EntityId>> {
        Ok(self
            .entities_read()
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.id)
            .collect())
    }

    fn entity(&self, id: EntityId) -> Result<Option<LibraryEntity>> {
        Ok(self.entities_read().get(&id).cloned())
    }
}

impl UserSnapshotProvider for InMemoryLibrary {
    fn user_ids(&self) -> Result<Vec<UserId>> {
        Ok(self.users_read().keys().copied().collect())
    }

    fn user(&self, id: UserId) -> Result<Option<UserState>> {
        Ok(self.users_read().get(&id).cloned())
    }
}
