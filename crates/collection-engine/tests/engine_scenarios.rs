//! End-to-end scenarios for the collection engine.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use collection_engine_rs::prelude::*;
use collection_library_rs::error::{ProviderError, Result as ProviderResult};
use collection_library_rs::events::{ChangeKind, EntityMutation};
use collection_library_rs::models::{
    EntityId, EntityKind, LibraryEntity, UserId, UserState, WatchRecord,
};
use collection_library_rs::provider::{
    EntitySnapshotProvider, InMemoryLibrary, UserSnapshotProvider,
};

// ==================== Test Helpers ====================

/// An in-memory library whose entity listing can be held, slowed or failed.
#[derive(Default)]
struct ControlledLibrary {
    inner: InMemoryLibrary,
    listings: AtomicUsize,
    held: Mutex<bool>,
    released: Condvar,
    delay_ms: AtomicUsize,
    failing: AtomicBool,
}

impl ControlledLibrary {
    fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.released.notify_all();
    }

    fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl EntitySnapshotProvider for ControlledLibrary {
    fn entity_ids(&self, kind: EntityKind) -> ProviderResult<Vec<EntityId>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.released.wait(held).unwrap();
        }
        drop(held);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::unavailable("library offline"));
        }
        self.inner.entity_ids(kind)
    }

    fn entity(&self, id: EntityId) -> ProviderResult<Option<LibraryEntity>> {
        self.inner.entity(id)
    }
}

impl UserSnapshotProvider for ControlledLibrary {
    fn user_ids(&self) -> ProviderResult<Vec<UserId>> {
        self.inner.user_ids()
    }

    fn user(&self, id: UserId) -> ProviderResult<Option<UserState>> {
        self.inner.user(id)
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        tick_interval_secs: 0,
        ..Default::default()
    }
}

fn ids(values: &[u64]) -> BTreeSet<EntityId> {
    values.iter().copied().map(EntityId).collect()
}

fn scenario_filter() -> FilterNode {
    FilterNode::and(vec![
        FilterNode::has_resolution("1080p").unwrap(),
        FilterNode::negate(FilterNode::IsWatched),
    ])
}

fn scenario_library() -> ControlledLibrary {
    let library = ControlledLibrary::default();
    library.inner.upsert_entity(
        LibraryEntity::new(EntityId(1), EntityKind::Series, "E1")
            .with_resolution("1080p")
            .with_episodes(12),
    );
    library.inner.upsert_entity(
        LibraryEntity::new(EntityId(2), EntityKind::Series, "E2")
            .with_resolution("720p")
            .with_episodes(12),
    );
    library
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ==================== Scenarios ====================

#[tokio::test]
async fn scenario_resolution_and_not_watched() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(library).config(config()).build().unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD backlog", scenario_filter()))
        .unwrap();

    engine.evaluate(id, None).unwrap();
    engine.wait_idle().await;

    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(*view.matching(), ids(&[1]));
    assert_eq!(view.freshness, Freshness::Fresh);
}

#[tokio::test]
async fn scenario_user_dependent_sets_differ() {
    let library = Arc::new(scenario_library());
    let mut u1 = UserState::new(UserId(1), "u1");
    u1.watch.insert(
        EntityId(1),
        WatchRecord {
            watched_episodes: 12,
            ..Default::default()
        },
    );
    library.inner.upsert_user(u1);
    library.inner.upsert_user(UserState::new(UserId(2), "u2"));

    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD backlog", scenario_filter()))
        .unwrap();

    engine.evaluate(id, Some(UserId(1))).unwrap();
    engine.evaluate(id, Some(UserId(2))).unwrap();
    engine.wait_idle().await;

    assert!(engine.evaluate(id, Some(UserId(1))).unwrap().matching().is_empty());
    assert_eq!(
        *engine.evaluate(id, Some(UserId(2))).unwrap().matching(),
        ids(&[1])
    );
}

#[tokio::test]
async fn scenario_tick_expires_time_window() {
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let library = Arc::new(ControlledLibrary::default());
    library.inner.upsert_entity(
        LibraryEntity::new(EntityId(1), EntityKind::Series, "New")
            .with_air_date((now - chrono::Duration::days(6)).date_naive()),
    );

    let engine = CollectionEngine::over(library)
        .config(config())
        .clock(clock.clone())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("This week", FilterNode::AiredWithinDays { days: 7 }))
        .unwrap();

    engine.evaluate(id, None).unwrap();
    engine.wait_idle().await;
    assert_eq!(*engine.evaluate(id, None).unwrap().matching(), ids(&[1]));

    clock.advance(chrono::Duration::days(2));
    assert_eq!(engine.tick(), 1);
    assert_eq!(
        engine.evaluate(id, None).unwrap().freshness,
        Freshness::StaleTime
    );

    engine.wait_idle().await;
    let view = engine.evaluate(id, None).unwrap();
    assert!(view.matching().is_empty());
    assert_eq!(view.freshness, Freshness::Fresh);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_concurrent_mutations_coalesce_into_one_rerun() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p").unwrap()))
        .unwrap();

    library.hold();
    engine.evaluate(id, None).unwrap();
    wait_until(|| library.listings() == 1).await;

    // Both arrive while generation 1 is running.
    let mut changed = LibraryEntity::new(EntityId(2), EntityKind::Series, "E2")
        .with_resolution("1080p")
        .with_episodes(12);
    for event in library.inner.upsert_entity(changed.clone()) {
        engine.apply_entity_mutation(&event);
    }
    changed.resolutions.insert("2160p".to_string());
    for event in library.inner.upsert_entity(changed) {
        engine.apply_entity_mutation(&event);
    }

    library.release();
    engine.wait_idle().await;

    assert_eq!(library.listings(), 2);
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.generation(), 2);
    assert_eq!(*view.matching(), ids(&[1, 2]));
    assert_eq!(view.freshness, Freshness::Fresh);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scope_change_discards_run_started_under_old_tree() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p").unwrap()))
        .unwrap();
    let mut notifications = engine.subscribe();

    library.hold();
    engine.evaluate(id, None).unwrap();
    wait_until(|| library.listings() == 1).await;

    // Becomes user-dependent, so the running entry is dropped and recreated.
    let narrower = FilterNode::and(vec![
        FilterNode::has_resolution("720p").unwrap(),
        FilterNode::negate(FilterNode::IsWatched),
    ]);
    assert!(engine.update_filter(id, narrower).unwrap().is_changed());
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.generation(), 0);
    wait_until(|| library.listings() == 2).await;

    library.release();
    engine.wait_idle().await;

    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.generation(), 1);
    assert_eq!(*view.matching(), ids(&[2]));
    assert_eq!(view.freshness, Freshness::Fresh);
    assert!(!view.recomputing);

    let installed = notifications.try_recv().unwrap();
    assert_eq!(installed.generation, 1);
    assert_eq!(installed.matching_count, 1);
    assert!(notifications.try_recv().is_err());
    assert_eq!(library.listings(), 2);
}

// ==================== Failure Handling ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_degrades_and_keeps_previous_set() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(EngineConfig {
            recompute_timeout_ms: 50,
            ..config()
        })
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p").unwrap()))
        .unwrap();
    engine.evaluate(id, None).unwrap();
    engine.wait_idle().await;
    let mut notifications = engine.subscribe();

    library.delay_ms.store(300, Ordering::SeqCst);
    let added = EntityMutation::new(EntityId(3), EntityKind::Series, ChangeKind::Added);
    library.inner.upsert_entity(
        LibraryEntity::new(EntityId(3), EntityKind::Series, "E3").with_resolution("1080p"),
    );
    engine.apply_entity_mutation(&added);
    engine.wait_idle().await;

    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.freshness, Freshness::Degraded);
    assert_eq!(*view.matching(), ids(&[1]));
    assert!(view.failure.unwrap().contains("timed out"));

    // The abandoned run still installs once it finishes, as nothing newer ran.
    let late = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(late.generation, 2);
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.freshness, Freshness::Fresh);
    assert_eq!(*view.matching(), ids(&[1, 3]));
}

#[tokio::test]
async fn provider_failure_degrades_and_recovers() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p").unwrap()))
        .unwrap();
    engine.evaluate(id, None).unwrap();
    engine.wait_idle().await;

    library.failing.store(true, Ordering::SeqCst);
    let files = EntityMutation::new(EntityId(2), EntityKind::Series, ChangeKind::FilesChanged);
    engine.apply_entity_mutation(&files);
    engine.wait_idle().await;

    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.freshness, Freshness::Degraded);
    assert_eq!(*view.matching(), ids(&[1]));

    library.failing.store(false, Ordering::SeqCst);
    engine.apply_entity_mutation(&files);
    engine.wait_idle().await;
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.freshness, Freshness::Fresh);
    assert!(view.failure.is_none());
}

// ==================== Properties ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn installed_generations_strictly_increase() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config())
        .build()
        .unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD", FilterNode::has_resolution("1080p").unwrap()))
        .unwrap();
    let mut notifications = engine.subscribe();

    engine.evaluate(id, None).unwrap();
    for n in 0..50u64 {
        let entity = LibraryEntity::new(EntityId(100 + n), EntityKind::Series, "burst")
            .with_resolution(if n % 2 == 0 { "1080p" } else { "720p" });
        for event in library.inner.upsert_entity(entity) {
            engine.apply_entity_mutation(&event);
        }
    }
    engine.wait_idle().await;

    let mut last = 0;
    while let Ok(notification) = notifications.try_recv() {
        assert!(notification.generation > last);
        last = notification.generation;
    }
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.generation(), last);
    assert_eq!(view.freshness, Freshness::Fresh);
    assert_eq!(view.matching().len(), 1 + 25);
}

#[tokio::test]
async fn unchanged_round_trip_does_not_invalidate() {
    let library = Arc::new(scenario_library());
    let engine = CollectionEngine::over(library).config(config()).build().unwrap();
    let id = engine
        .define_filter(FilterDraft::new("HD backlog", scenario_filter()))
        .unwrap();
    engine.evaluate(id, None).unwrap();
    engine.wait_idle().await;

    let json = serde_json::to_string(&engine.filter(id).unwrap().root).unwrap();
    let reloaded: FilterNode = serde_json::from_str(&json).unwrap();
    let outcome = engine.update_filter(id, reloaded).unwrap();

    assert!(!outcome.is_changed());
    let view = engine.evaluate(id, None).unwrap();
    assert_eq!(view.generation(), 1);
    assert_eq!(view.freshness, Freshness::Fresh);
}
