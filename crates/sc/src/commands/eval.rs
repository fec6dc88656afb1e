//! Eval command implementation.
//!
//! Starts an engine over a library snapshot file, restores the saved state,
//! waits for the filter's membership to settle and prints it. The refreshed
//! memberships are written back to the state file.

use std::path::PathBuf;
use std::sync::Arc;

use collection_engine_rs::{CollectionEngine, FilterId, MembershipView};
use collection_library_rs::models::{LibraryEntity, UserId};
use collection_library_rs::provider::{EntitySnapshotProvider, InMemoryLibrary, LibrarySnapshot};
use tracing::{debug, warn};

use super::config::load_config;
use super::{CommandContext, Result};
use crate::output::{format_eval_json, format_eval_table, EvalOutput};

/// Options for the eval command.
#[derive(Debug)]
pub struct EvalOptions {
    /// Filter to evaluate.
    pub filter_id: FilterId,
    /// Library snapshot file.
    pub library: PathBuf,
    /// Viewing user.
    pub user: Option<u64>,
}

/// Executes the eval command.
pub async fn execute(ctx: &CommandContext, opts: &EvalOptions) -> Result<()> {
    let config = load_config(ctx.config_path.as_deref())?;
    let library = Arc::new(InMemoryLibrary::from_snapshot(LibrarySnapshot::load(
        &opts.library,
    )?));
    debug!(
        path = %opts.library.display(),
        entities = library.entity_count(),
        "library snapshot loaded"
    );

    let store = ctx.state_store()?;
    let state = store.load_or_default_async().await?;

    let engine = CollectionEngine::over(Arc::clone(&library))
        .config(config.engine)
        .build()?;
    for (id, error) in engine.restore_state(state) {
        warn!(%id, %error, "skipping invalid saved filter");
    }

    let view = evaluate_settled(&engine, opts.filter_id, opts.user.map(UserId)).await?;
    store.save_async(&engine.export_state()).await?;
    engine.shutdown();

    let name = engine
        .filter(opts.filter_id)
        .map(|d| d.name.clone())
        .unwrap_or_default();
    let entities = resolve_entities(library.as_ref(), &view)?;
    let output = EvalOutput::new(&name, &view, &entities);

    if ctx.json_output {
        println!("{}", format_eval_json(&output)?);
    } else if !ctx.quiet {
        print!("{}", format_eval_table(&output, ctx.use_colors));
    }

    Ok(())
}

/// Reads a membership, then waits for the recompute it queued (if any).
pub async fn evaluate_settled(
    engine: &CollectionEngine,
    id: FilterId,
    user: Option<UserId>,
) -> Result<MembershipView> {
    let first = engine.evaluate(id, user)?;
    if !first.recomputing {
        return Ok(first);
    }
    engine.wait_idle().await;
    Ok(engine.evaluate(id, user)?)
}

/// Looks up the matching entities, skipping any the library no longer has.
fn resolve_entities(
    library: &dyn EntitySnapshotProvider,
    view: &MembershipView,
) -> Result<Vec<LibraryEntity>> {
    let mut entities = Vec::with_capacity(view.matching().len());
    for id in view.matching() {
        if let Some(entity) = library.entity(*id)? {
            entities.push(entity);
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_engine_rs::filter::FilterNode;
    use collection_engine_rs::{EngineConfig, FilterDraft, Freshness, OwnerScope};
    use collection_library_rs::models::{EntityId, EntityKind, UserState, WatchRecord};

    fn test_config() -> EngineConfig {
        EngineConfig {
            tick_interval_secs: 0,
            ..EngineConfig::default()
        }
    }

    fn library() -> Arc<InMemoryLibrary> {
        let library = InMemoryLibrary::new();
        library.upsert_entity(
            LibraryEntity::new(EntityId(1), EntityKind::Series, "Mushishi").with_episodes(26),
        );
        library.upsert_entity(
            LibraryEntity::new(EntityId(2), EntityKind::Series, "Kaiba").with_episodes(12),
        );
        let mut alice = UserState::new(UserId(1), "alice");
        alice.watch.insert(
            EntityId(2),
            WatchRecord {
                watched_episodes: 12,
                ..WatchRecord::default()
            },
        );
        library.upsert_user(alice);
        Arc::new(library)
    }

    #[tokio::test]
    async fn test_evaluate_settled_waits_for_first_compute() {
        let library = library();
        let engine = CollectionEngine::over(Arc::clone(&library))
            .config(test_config())
            .build()
            .unwrap();
        let id = engine
            .define_filter(FilterDraft::new("Watched", FilterNode::IsWatched))
            .unwrap();

        let view = evaluate_settled(&engine, id, Some(UserId(1))).await.unwrap();
        assert_eq!(view.freshness, Freshness::Fresh);
        assert_eq!(view.generation(), 1);
        assert_eq!(view.matching().iter().copied().collect::<Vec<_>>(), vec![EntityId(2)]);

        let entities = resolve_entities(library.as_ref(), &view).unwrap();
        assert_eq!(entities[0].name, "Kaiba");
    }

    #[tokio::test]
    async fn test_evaluate_settled_rejects_invisible_filter() {
        let engine = CollectionEngine::over(library())
            .config(test_config())
            .build()
            .unwrap();
        let id = engine
            .define_filter(
                FilterDraft::new("Mine", FilterNode::IsFavorite)
                    .owned_by(OwnerScope::User(UserId(1))),
            )
            .unwrap();

        let err = evaluate_settled(&engine, id, Some(UserId(2)))
            .await
            .unwrap_err();
        assert!(err.definition_error().is_some());
    }

    #[tokio::test]
    async fn test_resolve_entities_skips_removed() {
        let library = library();
        let engine = CollectionEngine::over(Arc::clone(&library))
            .config(test_config())
            .build()
            .unwrap();
        let id = engine
            .define_filter(FilterDraft::new(
                "Unfinished",
                FilterNode::negate(FilterNode::IsFinished),
            ))
            .unwrap();
        let view = evaluate_settled(&engine, id, None).await.unwrap();
        assert_eq!(view.matching().len(), 2);

        library.remove_entity(EntityId(1));
        let entities = resolve_entities(library.as_ref(), &view).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Kaiba"]);
    }
}
