//! The invalidation engine.
//!
//! [`CollectionEngine`] ties the definition store and the membership table
//! to the library providers. Reads go straight to the table and never wait.
//! Change events mark entries stale and queue recomputes without waiting for
//! them.
//!
//! # Architecture
//!
//! ```text
//!  events ─▶ mark stale ─▶ unbounded queue ─▶ dispatcher ─▶ worker (≤ N)
//!                                                             │
//!  evaluate() ◀── membership table ◀── install (generation CAS) ◀┘
//! ```
//!
//! - One dispatcher task owns the queue receiver and acquires a semaphore
//!   permit per recompute, bounding concurrency at `workers`.
//! - Each worker evaluates on the blocking pool under a timeout and installs
//!   the result only if its generation is still current.
//! - A ticker task periodically marks time-dependent entries stale.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use collection_engine_rs::prelude::*;
//! use collection_library_rs::models::{EntityId, EntityKind, LibraryEntity};
//! use collection_library_rs::provider::InMemoryLibrary;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Arc::new(InMemoryLibrary::new());
//! library.upsert_entity(
//!     LibraryEntity::new(EntityId(1), EntityKind::Series, "Frieren").with_resolution("1080p"),
//! );
//!
//! let engine = CollectionEngine::over(library).build()?;
//! let id = engine.define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p")?))?;
//!
//! // The first read returns an empty, stale snapshot and queues a recompute.
//! assert_eq!(engine.evaluate(id, None)?.freshness, Freshness::StaleMutation);
//!
//! engine.wait_idle().await;
//! let view = engine.evaluate(id, None)?;
//! assert_eq!(view.freshness, Freshness::Fresh);
//! assert!(view.matching().contains(&EntityId(1)));
//! # Ok(())
//! # }
//! ```

mod worker;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use collection_library_rs::events::{EntityMutation, UserChangeKind, UserStateChange};
use collection_library_rs::models::UserId;
use collection_library_rs::provider::{EntitySnapshotProvider, UserSnapshotProvider};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::definitions::{
    DefinitionError, DefinitionStore, FilterDefinition, FilterDraft, FilterId, SavedFilter,
    UpdateOutcome,
};
use crate::filter::FilterNode;
use crate::membership::{
    Freshness, MembershipKey, MembershipTable, MembershipView, Schedule, UserScope,
};
use crate::store::PersistedState;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A definition store operation failed.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The engine was built outside a tokio runtime.
    #[error("the collection engine must be started inside a tokio runtime")]
    NoRuntime,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Sent on every successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallNotification {
    /// The entry that changed.
    pub key: MembershipKey,
    /// The installed generation.
    pub generation: u64,
    /// Size of the installed set.
    pub matching_count: usize,
}

struct EngineInner {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    entities: Arc<dyn EntitySnapshotProvider>,
    users: Arc<dyn UserSnapshotProvider>,
    definitions: DefinitionStore,
    memberships: MembershipTable,
    queue: mpsc::UnboundedSender<MembershipKey>,
    notifications: broadcast::Sender<InstallNotification>,
    outstanding: AtomicUsize,
    idle: Notify,
    stopped: AtomicBool,
}

impl EngineInner {
    /// Queues a key whose entry is already marked in flight.
    fn schedule(&self, key: MembershipKey) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.stopped.load(Ordering::SeqCst) || self.queue.send(key).is_err() {
            debug!(%key, "engine stopped, dropping recompute");
            self.memberships.abandon(&key);
            self.finish_one();
        }
    }

    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Marks one entry stale, queueing it unless a recompute already covers it.
    fn invalidate(&self, key: MembershipKey, stale: Freshness) -> bool {
        match self.memberships.mark_stale(&key, stale) {
            Some(Schedule::Queue) => {
                debug!(%key, %stale, "queueing recompute");
                self.schedule(key);
                true
            }
            Some(schedule) => {
                debug!(%key, %stale, ?schedule, "recompute already pending");
                true
            }
            None => false,
        }
    }

    fn invalidate_filter(&self, filter: FilterId, stale: Freshness) -> usize {
        self.memberships
            .keys_for_filter(filter)
            .into_iter()
            .filter(|key| self.invalidate(*key, stale))
            .count()
    }

    fn notify(&self, notification: InstallNotification) {
        // No receivers is fine.
        let _ = self.notifications.send(notification);
    }

    fn tick(&self) -> usize {
        self.definitions
            .all()
            .iter()
            .filter(|d| d.is_time_dependent())
            .map(|d| self.invalidate_filter(d.id, Freshness::StaleTime))
            .sum()
    }
}

/// Builder for [`CollectionEngine`].
pub struct EngineBuilder {
    entities: Arc<dyn EntitySnapshotProvider>,
    users: Arc<dyn UserSnapshotProvider>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for time-dependent filters.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the dispatcher and ticker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRuntime`] when called outside a runtime.
    pub fn build(self) -> Result<CollectionEngine> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let (queue, receiver) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(self.config.notification_buffer());
        let inner = Arc::new(EngineInner {
            config: self.config,
            clock: self.clock,
            entities: self.entities,
            users: self.users,
            definitions: DefinitionStore::new(),
            memberships: MembershipTable::new(),
            queue,
            notifications,
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
            stopped: AtomicBool::new(false),
        });

        let mut tasks = vec![runtime.spawn(worker::dispatch(Arc::clone(&inner), receiver))];
        if let Some(period) = inner.config.tick_interval() {
            let ticker = Arc::clone(&inner);
            tasks.push(runtime.spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let marked = ticker.tick();
                    debug!(marked, "time tick");
                }
            }));
        }

        info!(
            workers = inner.config.worker_count(),
            tick_interval_secs = inner.config.tick_interval_secs,
            "collection engine started"
        );
        Ok(CollectionEngine {
            inner,
            tasks: Mutex::new(tasks),
        })
    }
}

/// Maintains the matching sets of saved filters as the library changes.
///
/// Dropping the engine stops its background tasks.
pub struct CollectionEngine {
    inner: Arc<EngineInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CollectionEngine {
    /// Starts building an engine over separate entity and user providers.
    pub fn builder(
        entities: Arc<dyn EntitySnapshotProvider>,
        users: Arc<dyn UserSnapshotProvider>,
    ) -> EngineBuilder {
        EngineBuilder {
            entities,
            users,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Starts building an engine over one value that provides both.
    pub fn over<L>(library: Arc<L>) -> EngineBuilder
    where
        L: EntitySnapshotProvider + UserSnapshotProvider + 'static,
    {
        Self::builder(library.clone(), library)
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ==================== Definitions ====================

    /// Validates and saves a new filter.
    ///
    /// No membership entry exists until the filter is first evaluated.
    pub fn define_filter(&self, draft: FilterDraft) -> Result<FilterId> {
        let definition = self.inner.definitions.create(draft)?;
        debug!(filter = %definition.id, name = %definition.name, "filter defined");
        Ok(definition.id)
    }

    /// Replaces a filter's tree.
    ///
    /// A structurally equal tree changes nothing. Otherwise every entry of
    /// the filter is marked stale and recomputed; if the change switches
    /// between per-user and global entries, the old entries are dropped.
    pub fn update_filter(&self, id: FilterId, root: FilterNode) -> Result<UpdateOutcome> {
        let outcome = self.inner.definitions.update(id, root)?;
        if let UpdateOutcome::Changed { previous, current } = &outcome {
            if previous.is_user_dependent() != current.is_user_dependent() {
                let dropped = self.inner.memberships.remove_filter(id);
                debug!(filter = %id, dropped, "filter changed scope, dropped entries");
            } else {
                let marked = self.inner.invalidate_filter(id, Freshness::StaleMutation);
                debug!(filter = %id, marked, "filter updated");
            }
        }
        Ok(outcome)
    }

    /// Renames a filter. Memberships are unaffected.
    pub fn rename_filter(&self, id: FilterId, name: &str) -> Result<Arc<FilterDefinition>> {
        Ok(self.inner.definitions.rename(id, name)?)
    }

    /// Deletes a filter and all its entries.
    pub fn delete_filter(&self, id: FilterId) -> Result<()> {
        self.inner.definitions.delete(id)?;
        let dropped = self.inner.memberships.remove_filter(id);
        debug!(filter = %id, dropped, "filter deleted");
        Ok(())
    }

    /// Returns a filter definition.
    pub fn filter(&self, id: FilterId) -> Option<Arc<FilterDefinition>> {
        self.inner.definitions.get(id)
    }

    /// Lists the filters `viewer` may see, sorted by name.
    pub fn filters(&self, viewer: Option<UserId>) -> Vec<Arc<FilterDefinition>> {
        self.inner.definitions.list(viewer)
    }

    /// IDs of saved filters structurally equal to `root`.
    pub fn equivalent_filters(&self, root: &FilterNode) -> Vec<FilterId> {
        self.inner.definitions.equivalent(root)
    }

    // ==================== Reads ====================

    /// Returns the best available matching set for a filter, immediately.
    ///
    /// User-dependent filters are keyed per user; all others share one global
    /// entry whatever the viewer. The first read of a key returns an empty
    /// stale snapshot and queues its first recompute.
    ///
    /// # Errors
    ///
    /// Fails if the filter does not exist or `user` may not see it.
    pub fn evaluate(&self, id: FilterId, user: Option<UserId>) -> Result<MembershipView> {
        let definition = self.inner.definitions.get_visible(id, user)?;
        let key = membership_key(&definition, user);
        let (view, created) = self.inner.memberships.get_or_create(key);
        if created {
            debug!(%key, "new membership entry");
            self.inner.schedule(key);
        }
        Ok(view)
    }

    /// Returns an entry without creating it.
    pub fn membership(&self, key: &MembershipKey) -> Option<MembershipView> {
        self.inner.memberships.read(key)
    }

    /// Subscribes to install notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<InstallNotification> {
        self.inner.notifications.subscribe()
    }

    // ==================== Events ====================

    /// Invalidates entries an entity change can affect.
    ///
    /// Only filters targeting the entity's kind whose attributes intersect the
    /// change are touched. Returns how many entries were marked stale.
    pub fn apply_entity_mutation(&self, mutation: &EntityMutation) -> usize {
        let marked = self
            .inner
            .definitions
            .all()
            .iter()
            .filter(|d| {
                d.target == mutation.entity_kind && d.classification.affected_by(mutation.change_kind)
            })
            .map(|d| self.inner.invalidate_filter(d.id, Freshness::StaleMutation))
            .sum();
        debug!(
            entity = %mutation.entity_id,
            change = ?mutation.change_kind,
            marked,
            "entity mutation"
        );
        marked
    }

    /// Invalidates one user's entries of user-dependent filters.
    ///
    /// A removed user's entries are dropped instead. Returns how many entries
    /// were marked stale or dropped.
    pub fn apply_user_change(&self, change: &UserStateChange) -> usize {
        let user = change.user_id;
        let affected = match change.change_kind {
            UserChangeKind::Removed => self.inner.memberships.remove_user(user),
            UserChangeKind::WatchStateChanged | UserChangeKind::PreferencesChanged => self
                .inner
                .definitions
                .all()
                .iter()
                .filter(|d| d.is_user_dependent())
                .filter(|d| {
                    self.inner.invalidate(
                        MembershipKey::new(d.id, UserScope::User(user)),
                        Freshness::StaleMutation,
                    )
                })
                .count(),
        };
        debug!(%user, change = ?change.change_kind, affected, "user change");
        affected
    }

    /// Marks every entry of a time-dependent filter stale.
    ///
    /// The ticker calls this periodically; it can also be called directly.
    pub fn tick(&self) -> usize {
        self.inner.tick()
    }

    // ==================== Lifecycle ====================

    /// Resolves once no recompute is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops the dispatcher and ticker.
    ///
    /// Running recomputes finish on their own; keys still queued are dropped
    /// and later invalidations are ignored.
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if !tasks.is_empty() {
            info!("collection engine stopping");
        }
        for task in tasks {
            task.abort();
        }
    }

    // ==================== Persistence ====================

    /// Copies definitions and computed memberships for persistence.
    pub fn export_state(&self) -> PersistedState {
        let mut filters: Vec<SavedFilter> = self
            .inner
            .definitions
            .all()
            .iter()
            .map(|d| SavedFilter::from(d.as_ref()))
            .collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        PersistedState::new(filters, self.inner.memberships.export())
    }

    /// Loads persisted definitions and memberships.
    ///
    /// Restored entries keep their set and generation, are marked stale and
    /// are recomputed. Entries whose filter is missing or whose scope no longer
    /// matches the filter are skipped. Returns the definitions that failed
    /// validation.
    pub fn restore_state(&self, state: PersistedState) -> Vec<(FilterId, DefinitionError)> {
        let rejected = self.inner.definitions.restore(state.filters);
        let mut restored = 0usize;
        for membership in state.memberships {
            let key = membership.key;
            let Some(definition) = self.inner.definitions.get(key.filter) else {
                continue;
            };
            let scope_matches = match key.user {
                UserScope::Global => !definition.is_user_dependent(),
                UserScope::User(_) => definition.is_user_dependent(),
            };
            if scope_matches && self.inner.memberships.restore(membership) {
                self.inner.schedule(key);
                restored += 1;
            }
        }
        info!(
            filters = self.inner.definitions.len(),
            memberships = restored,
            rejected = rejected.len(),
            "state restored"
        );
        rejected
    }
}

impl Drop for CollectionEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CollectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEngine")
            .field("config", &self.inner.config)
            .field("filters", &self.inner.definitions.len())
            .field("memberships", &self.inner.memberships.len())
            .field("outstanding", &self.inner.outstanding.load(Ordering::SeqCst))
            .finish()
    }
}

/// The entry key a viewer reads for a filter.
fn membership_key(definition: &FilterDefinition, user: Option<UserId>) -> MembershipKey {
    let scope = match user {
        Some(user) if definition.is_user_dependent() => UserScope::User(user),
        _ => UserScope::Global,
    };
    MembershipKey::new(definition.id, scope)
}
