//! The membership table: cached matching sets per (filter, user).
//!
//! Each entry holds the last installed snapshot plus the bookkeeping that
//! keeps recomputes for one key serialized:
//!
//! - `in_flight` is set from the moment a recompute is queued until it
//!   finishes, so a key is never queued twice.
//! - `running` is set once a worker has started it. A stale signal that
//!   arrives while running is remembered in `pending` and triggers exactly
//!   one rerun after the current one finishes. A signal that arrives while
//!   merely queued is absorbed by the queued run.
//! - `issued` is the latest generation handed to a worker. An install is
//!   accepted only if its generation is both the latest issued and strictly
//!   greater than the installed one.
//! - `epoch` is unique per entry across the table's lifetime. A worker's
//!   [`RecomputeRun`] carries the epoch it started under, so a run begun
//!   before its entry was dropped and recreated never touches the new entry.
//!
//! Readers clone an `Arc` to the installed snapshot under a short shard lock
//! and never wait for a recompute.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use collection_library_rs::models::{EntityId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::definitions::FilterId;

/// Whose view of a filter an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserScope {
    /// Shared by all users (user-independent filters).
    Global,
    /// One user's view of a user-dependent filter.
    User(UserId),
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserScope::Global => f.write_str("global"),
            UserScope::User(id) => write!(f, "user {id}"),
        }
    }
}

/// Key of one membership entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipKey {
    /// The filter.
    pub filter: FilterId,
    /// The viewing user, or global.
    pub user: UserScope,
}

impl MembershipKey {
    /// Creates a key.
    pub fn new(filter: FilterId, user: UserScope) -> Self {
        Self { filter, user }
    }
}

impl fmt::Display for MembershipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.filter, self.user)
    }
}

/// How current an entry's matching set is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Computed from the latest known data.
    Fresh,
    /// Time has passed since a time-dependent filter was computed.
    StaleTime,
    /// Library, user or definition data changed since it was computed.
    StaleMutation,
    /// The last recompute failed; the set is from an earlier run.
    Degraded,
}

impl Freshness {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::StaleTime => "stale_time",
            Freshness::StaleMutation => "stale_mutation",
            Freshness::Degraded => "degraded",
        }
    }

    /// Returns true for both stale states.
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::StaleTime | Freshness::StaleMutation)
    }

    /// Combines two stale signals. A mutation outranks a tick.
    fn merge(self, other: Freshness) -> Freshness {
        match (self, other) {
            (Freshness::StaleMutation, _) | (_, Freshness::StaleMutation) => {
                Freshness::StaleMutation
            }
            _ => other,
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installed matching set. Immutable once installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    /// Matching entity IDs.
    pub matching: Arc<BTreeSet<EntityId>>,
    /// Generation that produced this set. Zero means never computed.
    pub generation: u64,
    /// When the set was computed.
    pub computed_at: Option<DateTime<Utc>>,
}

impl MembershipSnapshot {
    fn empty() -> Self {
        Self {
            matching: Arc::new(BTreeSet::new()),
            generation: 0,
            computed_at: None,
        }
    }
}

/// What a reader sees for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipView {
    /// The entry key.
    pub key: MembershipKey,
    /// The installed snapshot.
    pub snapshot: Arc<MembershipSnapshot>,
    /// Freshness of the snapshot.
    pub freshness: Freshness,
    /// True while a recompute is queued or running.
    pub recomputing: bool,
    /// Reason of the last failure, while degraded.
    pub failure: Option<String>,
}

impl MembershipView {
    /// Matching entity IDs.
    pub fn matching(&self) -> &BTreeSet<EntityId> {
        &self.snapshot.matching
    }

    /// Installed generation.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }
}

/// A persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMembership {
    /// The entry key.
    pub key: MembershipKey,
    /// Matching entity IDs.
    pub matching: BTreeSet<EntityId>,
    /// Installed generation.
    pub generation: u64,
    /// When the set was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<DateTime<Utc>>,
}

/// Result of [`MembershipTable::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The set was installed.
    Installed {
        /// Whether another recompute must run immediately.
        rerun: bool,
    },
    /// A newer generation was issued or installed; the set was dropped.
    Superseded {
        /// Whether another recompute must run immediately.
        rerun: bool,
    },
    /// The entry no longer exists.
    Missing,
}

/// A recompute handed to a worker by [`MembershipTable::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeRun {
    epoch: u64,
    /// The generation the result installs with.
    pub generation: u64,
}

/// Result of a stale signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// The caller must queue a recompute.
    Queue,
    /// A queued recompute will pick the change up.
    Coalesced,
    /// A running recompute will be followed by one more.
    Rerun,
}

#[derive(Debug)]
struct EntryState {
    epoch: u64,
    snapshot: Arc<MembershipSnapshot>,
    freshness: Freshness,
    issued: u64,
    in_flight: bool,
    running: bool,
    pending: Option<Freshness>,
    failure: Option<String>,
}

impl EntryState {
    fn new(epoch: u64, snapshot: MembershipSnapshot) -> Self {
        Self {
            epoch,
            issued: snapshot.generation,
            snapshot: Arc::new(snapshot),
            freshness: Freshness::StaleMutation,
            in_flight: false,
            running: false,
            pending: None,
            failure: None,
        }
    }

    fn owns(&self, run: RecomputeRun) -> bool {
        self.epoch == run.epoch
    }

    fn view(&self, key: MembershipKey) -> MembershipView {
        MembershipView {
            key,
            snapshot: Arc::clone(&self.snapshot),
            freshness: self.freshness,
            recomputing: self.in_flight,
            failure: self.failure.clone(),
        }
    }

    /// Ends the current run, keeping the key in flight if a rerun is due.
    fn finish_run(&mut self) -> bool {
        self.running = false;
        match self.pending.take() {
            Some(stale) => {
                if self.freshness != Freshness::Degraded {
                    self.freshness = stale;
                }
                true
            }
            None => {
                self.in_flight = false;
                false
            }
        }
    }
}

/// Concurrent table of membership entries.
#[derive(Debug, Default)]
pub struct MembershipTable {
    entries: DashMap<MembershipKey, EntryState>,
    epochs: AtomicU64,
}

impl MembershipTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the current view of an entry.
    pub fn read(&self, key: &MembershipKey) -> Option<MembershipView> {
        self.entries.get(key).map(|entry| entry.view(*key))
    }

    /// Returns the view of an entry, creating it if needed.
    ///
    /// A new entry starts at generation 0 with an empty set, is stale, and is
    /// marked in flight; the returned flag tells the caller to queue it.
    pub fn get_or_create(&self, key: MembershipKey) -> (MembershipView, bool) {
        let mut created = false;
        let entry = self.entries.entry(key).or_insert_with(|| {
            created = true;
            let mut state = EntryState::new(self.next_epoch(), MembershipSnapshot::empty());
            state.in_flight = true;
            state
        });
        (entry.view(key), created)
    }

    /// Restores a persisted entry as stale and in flight.
    ///
    /// Returns false if the key already exists.
    pub fn restore(&self, persisted: PersistedMembership) -> bool {
        let key = persisted.key;
        let mut restored = false;
        self.entries.entry(key).or_insert_with(|| {
            restored = true;
            let mut state = EntryState::new(self.next_epoch(), MembershipSnapshot {
                matching: Arc::new(persisted.matching),
                generation: persisted.generation,
                computed_at: persisted.computed_at,
            });
            state.in_flight = true;
            state
        });
        restored
    }

    /// Marks an entry stale. Returns `None` if the entry does not exist.
    pub fn mark_stale(&self, key: &MembershipKey, stale: Freshness) -> Option<Schedule> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.running {
            entry.pending = Some(entry.pending.map_or(stale, |p| p.merge(stale)));
            return Some(Schedule::Rerun);
        }

        entry.freshness = if entry.freshness.is_stale() {
            entry.freshness.merge(stale)
        } else {
            stale
        };

        if entry.in_flight {
            Some(Schedule::Coalesced)
        } else {
            entry.in_flight = true;
            Some(Schedule::Queue)
        }
    }

    /// Starts a recompute, returning the run it must finish with.
    ///
    /// Returns `None` if the entry was removed while queued.
    pub fn begin(&self, key: &MembershipKey) -> Option<RecomputeRun> {
        let mut entry = self.entries.get_mut(key)?;
        entry.running = true;
        entry.issued += 1;
        Some(RecomputeRun {
            epoch: entry.epoch,
            generation: entry.issued,
        })
    }

    /// Installs a finished recompute if `generation` is still current.
    ///
    /// `on_installed` runs under the entry lock after a successful install, so
    /// anything it publishes is ordered by generation.
    pub fn install(
        &self,
        key: &MembershipKey,
        run: RecomputeRun,
        matching: BTreeSet<EntityId>,
        computed_at: DateTime<Utc>,
        on_installed: impl FnOnce(),
    ) -> InstallOutcome {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return InstallOutcome::Missing;
        };
        if !entry.owns(run) {
            return InstallOutcome::Missing;
        }

        let generation = run.generation;
        let current = generation == entry.issued && generation > entry.snapshot.generation;
        if current {
            entry.snapshot = Arc::new(MembershipSnapshot {
                matching: Arc::new(matching),
                generation,
                computed_at: Some(computed_at),
            });
            entry.freshness = Freshness::Fresh;
            entry.failure = None;
            on_installed();
        }

        let rerun = entry.finish_run();
        if current {
            InstallOutcome::Installed { rerun }
        } else {
            InstallOutcome::Superseded { rerun }
        }
    }

    /// Installs the result of a recompute that finished after its timeout.
    ///
    /// The run already ended, so the set is accepted only if nothing newer was
    /// issued and no further recompute is queued.
    pub fn install_late(
        &self,
        key: &MembershipKey,
        run: RecomputeRun,
        matching: BTreeSet<EntityId>,
        computed_at: DateTime<Utc>,
        on_installed: impl FnOnce(),
    ) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        let generation = run.generation;
        if !entry.owns(run)
            || entry.in_flight
            || generation != entry.issued
            || generation <= entry.snapshot.generation
        {
            return false;
        }
        entry.snapshot = Arc::new(MembershipSnapshot {
            matching: Arc::new(matching),
            generation,
            computed_at: Some(computed_at),
        });
        entry.freshness = Freshness::Fresh;
        entry.failure = None;
        on_installed();
        true
    }

    /// Records a failed recompute. The installed set is kept.
    ///
    /// Returns whether another recompute must run immediately.
    pub fn fail(&self, key: &MembershipKey, run: RecomputeRun, reason: String) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        if !entry.owns(run) {
            return false;
        }
        if run.generation == entry.issued {
            entry.freshness = Freshness::Degraded;
            entry.failure = Some(reason);
        }
        entry.finish_run()
    }

    /// Clears the in-flight flag of a key whose recompute could not be queued.
    pub fn abandon(&self, key: &MembershipKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.in_flight = false;
            entry.running = false;
            entry.pending = None;
        }
    }

    /// Ends a run without a result, dropping any rerun it owed.
    pub fn cancel(&self, key: &MembershipKey, run: RecomputeRun) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.owns(run) {
                entry.in_flight = false;
                entry.running = false;
                entry.pending = None;
            }
        }
    }

    /// Keys of all entries for a filter.
    pub fn keys_for_filter(&self, filter: FilterId) -> Vec<MembershipKey> {
        self.entries
            .iter()
            .filter(|e| e.key().filter == filter)
            .map(|e| *e.key())
            .collect()
    }

    /// Removes all entries for a filter, returning how many were removed.
    pub fn remove_filter(&self, filter: FilterId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.filter != filter);
        before.saturating_sub(self.entries.len())
    }

    /// Removes all entries for a user, returning how many were removed.
    pub fn remove_user(&self, user: UserId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key.user != UserScope::User(user));
        before.saturating_sub(self.entries.len())
    }

    /// Copies every entry for persistence.
    pub fn export(&self) -> Vec<PersistedMembership> {
        let mut persisted: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.snapshot.generation > 0)
            .map(|e| PersistedMembership {
                key: *e.key(),
                matching: BTreeSet::clone(&e.snapshot.matching),
                generation: e.snapshot.generation,
                computed_at: e.snapshot.computed_at,
            })
            .collect();
        persisted.sort_by_key(|p| p.key);
        persisted
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
