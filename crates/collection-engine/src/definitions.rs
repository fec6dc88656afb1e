//! Saved filter definitions.
//!
//! The [`DefinitionStore`] owns every saved filter. Create and update validate
//! the whole tree before anything is stored, so a rejected change leaves the
//! previous definition untouched. Definitions are handed out as `Arc`s and
//! never mutated in place.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use collection_library_rs::models::{EntityKind, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::{classify, Classification, FilterNode, RawFilterNode, ValidationErrors};

/// Unique ID of a saved filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(Uuid);

impl FilterId {
    /// Generates a new random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FilterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FilterId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Who can see a saved filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerScope {
    /// Visible to everyone.
    Global,
    /// Visible only to this user.
    User(UserId),
}

impl OwnerScope {
    /// Returns true if `viewer` may see filters in this scope.
    pub fn visible_to(&self, viewer: Option<UserId>) -> bool {
        match self {
            OwnerScope::Global => true,
            OwnerScope::User(owner) => viewer == Some(*owner),
        }
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerScope::Global => f.write_str("global"),
            OwnerScope::User(id) => write!(f, "user {id}"),
        }
    }
}

/// A saved filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Unique ID.
    pub id: FilterId,

    /// Display name.
    pub name: String,

    /// Visibility.
    pub owner: OwnerScope,

    /// The entity kind the filter selects from.
    pub target: EntityKind,

    /// The filter tree.
    pub root: FilterNode,

    /// Cached classification of `root`.
    pub classification: Classification,

    /// When the definition was created.
    pub created_at: DateTime<Utc>,

    /// When the definition last changed.
    pub last_modified: DateTime<Utc>,
}

impl FilterDefinition {
    /// Returns true if the filter keeps one membership entry per user.
    pub fn is_user_dependent(&self) -> bool {
        self.classification.flags.user_dependent
    }

    /// Returns true if the filter must be refreshed as time passes.
    pub fn is_time_dependent(&self) -> bool {
        self.classification.flags.time_dependent
    }
}

/// A saved filter as written to the state file.
///
/// The tree is kept in its untyped form, so a file holding one tree the
/// catalog no longer accepts still loads; [`DefinitionStore::restore`]
/// rejects that filter alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    /// Unique ID.
    pub id: FilterId,
    /// Display name.
    pub name: String,
    /// Visibility.
    pub owner: OwnerScope,
    /// The entity kind the filter selects from.
    pub target: EntityKind,
    /// The unvalidated filter tree.
    pub root: RawFilterNode,
    /// When the definition was created.
    pub created_at: DateTime<Utc>,
    /// When the definition last changed.
    pub last_modified: DateTime<Utc>,
}

impl From<&FilterDefinition> for SavedFilter {
    fn from(definition: &FilterDefinition) -> Self {
        Self {
            id: definition.id,
            name: definition.name.clone(),
            owner: definition.owner,
            target: definition.target,
            root: RawFilterNode::from(definition.root.clone()),
            created_at: definition.created_at,
            last_modified: definition.last_modified,
        }
    }
}

/// Input for creating a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDraft {
    /// Display name.
    pub name: String,
    /// Visibility.
    pub owner: OwnerScope,
    /// The entity kind the filter selects from.
    pub target: EntityKind,
    /// The filter tree.
    pub root: FilterNode,
}

impl FilterDraft {
    /// Creates a global draft targeting series.
    pub fn new(name: impl Into<String>, root: FilterNode) -> Self {
        Self {
            name: name.into(),
            owner: OwnerScope::Global,
            target: EntityKind::Series,
            root,
        }
    }

    /// Sets the owner.
    pub fn owned_by(mut self, owner: OwnerScope) -> Self {
        self.owner = owner;
        self
    }

    /// Sets the target entity kind.
    pub fn targeting(mut self, target: EntityKind) -> Self {
        self.target = target;
        self
    }
}

/// Errors from definition store operations.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The tree failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    /// No filter has this ID.
    #[error("filter not found: {0}")]
    NotFound(FilterId),

    /// The filter exists but the viewer may not see it.
    #[error("filter {0} is not visible to this user")]
    NotVisible(FilterId),

    /// Filter names must not be empty.
    #[error("filter name cannot be empty")]
    EmptyName,
}

/// Result type for definition store operations.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Outcome of [`DefinitionStore::update`].
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The new tree is structurally equal to the stored one. Nothing changed.
    Unchanged(Arc<FilterDefinition>),
    /// The tree was replaced.
    Changed {
        /// The definition before the update.
        previous: Arc<FilterDefinition>,
        /// The definition after the update.
        current: Arc<FilterDefinition>,
    },
}

impl UpdateOutcome {
    /// Returns true if the stored tree changed.
    pub fn is_changed(&self) -> bool {
        matches!(self, UpdateOutcome::Changed { .. })
    }

    /// The definition as stored after the update.
    pub fn current(&self) -> &Arc<FilterDefinition> {
        match self {
            UpdateOutcome::Unchanged(current) | UpdateOutcome::Changed { current, .. } => current,
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DefinitionError::EmptyName);
    }
    Ok(name.to_string())
}

/// In-memory store of saved filters.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    filters: RwLock<HashMap<FilterId, Arc<FilterDefinition>>>,
}

impl DefinitionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a new filter.
    pub fn create(&self, draft: FilterDraft) -> Result<Arc<FilterDefinition>> {
        let name = validate_name(&draft.name)?;
        draft.root.validate()?;

        let now = Utc::now();
        let definition = Arc::new(FilterDefinition {
            id: FilterId::new(),
            name,
            owner: draft.owner,
            target: draft.target,
            classification: classify(&draft.root),
            root: draft.root,
            created_at: now,
            last_modified: now,
        });

        self.filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.id, Arc::clone(&definition));
        Ok(definition)
    }

    /// Replaces a filter's tree.
    ///
    /// A tree structurally equal to the stored one is not written, so an
    /// edit-and-save with no real change does not count as a change.
    pub fn update(&self, id: FilterId, root: FilterNode) -> Result<UpdateOutcome> {
        root.validate()?;

        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let previous = filters
            .get(&id)
            .cloned()
            .ok_or(DefinitionError::NotFound(id))?;

        if previous.root == root {
            return Ok(UpdateOutcome::Unchanged(previous));
        }

        let current = Arc::new(FilterDefinition {
            classification: classify(&root),
            root,
            last_modified: Utc::now(),
            ..FilterDefinition::clone(&previous)
        });
        filters.insert(id, Arc::clone(&current));
        Ok(UpdateOutcome::Changed { previous, current })
    }

    /// Renames a filter.
    pub fn rename(&self, id: FilterId, name: &str) -> Result<Arc<FilterDefinition>> {
        let name = validate_name(name)?;

        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let previous = filters.get(&id).ok_or(DefinitionError::NotFound(id))?;
        let renamed = Arc::new(FilterDefinition {
            name,
            last_modified: Utc::now(),
            ..FilterDefinition::clone(previous)
        });
        filters.insert(id, Arc::clone(&renamed));
        Ok(renamed)
    }

    /// Removes a filter, returning it.
    pub fn delete(&self, id: FilterId) -> Result<Arc<FilterDefinition>> {
        self.filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(DefinitionError::NotFound(id))
    }

    /// Returns a filter by ID.
    pub fn get(&self, id: FilterId) -> Option<Arc<FilterDefinition>> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Returns a filter by ID if `viewer` may see it.
    pub fn get_visible(
        &self,
        id: FilterId,
        viewer: Option<UserId>,
    ) -> Result<Arc<FilterDefinition>> {
        let definition = self.get(id).ok_or(DefinitionError::NotFound(id))?;
        if !definition.owner.visible_to(viewer) {
            return Err(DefinitionError::NotVisible(id));
        }
        Ok(definition)
    }

    /// Lists the filters `viewer` may see, sorted by name.
    ///
    /// With no viewer only global filters are listed.
    pub fn list(&self, viewer: Option<UserId>) -> Vec<Arc<FilterDefinition>> {
        let mut visible: Vec<_> = self
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| d.owner.visible_to(viewer))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        visible
    }

    /// Returns every stored filter, in no particular order.
    pub fn all(&self) -> Vec<Arc<FilterDefinition>> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Returns the IDs of saved filters whose tree is structurally equal to `root`.
    pub fn equivalent(&self, root: &FilterNode) -> Vec<FilterId> {
        let mut ids: Vec<_> = self
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| d.root == *root)
            .map(|d| d.id)
            .collect();
        ids.sort();
        ids
    }

    /// Inserts previously persisted filters, replacing any with the same ID.
    ///
    /// Trees are validated and classified; invalid ones are returned
    /// alongside their error instead of being stored.
    pub fn restore(
        &self,
        saved: impl IntoIterator<Item = SavedFilter>,
    ) -> Vec<(FilterId, DefinitionError)> {
        let mut rejected = Vec::new();
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        for filter in saved {
            let root = match FilterNode::try_from(filter.root) {
                Ok(root) => root,
                Err(e) => {
                    rejected.push((filter.id, e.into()));
                    continue;
                }
            };
            let definition = FilterDefinition {
                id: filter.id,
                name: filter.name,
                owner: filter.owner,
                target: filter.target,
                classification: classify(&root),
                root,
                created_at: filter.created_at,
                last_modified: filter.last_modified,
            };
            filters.insert(definition.id, Arc::new(definition));
        }
        rejected
    }

    /// Number of stored filters.
    pub fn len(&self) -> usize {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no filters are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
