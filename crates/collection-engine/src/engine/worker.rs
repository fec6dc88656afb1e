//! Dispatcher and recompute workers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use collection_library_rs::error::ProviderError;
use collection_library_rs::models::EntityId;
use collection_library_rs::provider::{EntitySnapshotProvider, UserSnapshotProvider};
use tokio::sync::{mpsc, Semaphore};
use tokio::{task, time};
use tracing::{debug, trace, warn};

use super::{EngineInner, InstallNotification};
use crate::definitions::FilterDefinition;
use crate::filter::{EntityView, FilterContext, FilterEvaluator, FilterableUserInfo, UserEntityView};
use crate::membership::{InstallOutcome, MembershipKey, UserScope};

/// Owns the queue receiver and spawns one worker per key, at most
/// `workers` at a time.
pub(super) async fn dispatch(
    inner: Arc<EngineInner>,
    mut receiver: mpsc::UnboundedReceiver<MembershipKey>,
) {
    let semaphore = Arc::new(Semaphore::new(inner.config.worker_count()));
    while let Some(key) = receiver.recv().await {
        // Acquire before spawning so queued keys wait here, not as tasks.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            let _permit = permit;
            let rerun = recompute(&inner, key).await;
            if rerun {
                trace!(%key, "rerunning after concurrent invalidation");
                inner.schedule(key);
            }
            inner.finish_one();
        });
    }
}

/// Runs one recompute. Returns true if the key must run again.
async fn recompute(inner: &Arc<EngineInner>, key: MembershipKey) -> bool {
    // The entry is running before the definition is read: an update landing
    // in between queues a rerun.
    let Some(run) = inner.memberships.begin(&key) else {
        trace!(%key, "entry dropped before recompute");
        return false;
    };
    let generation = run.generation;
    let Some(definition) = inner.definitions.get(key.filter) else {
        trace!(%key, "filter deleted before recompute");
        inner.memberships.cancel(&key, run);
        return false;
    };

    let now = inner.clock.now();
    let started = Instant::now();
    let entities = Arc::clone(&inner.entities);
    let users = Arc::clone(&inner.users);
    let mut handle = task::spawn_blocking(move || {
        compute(&definition, key.user, entities.as_ref(), users.as_ref(), now)
    });

    let budget = inner.config.recompute_timeout();
    match time::timeout(budget, &mut handle).await {
        Ok(Ok(Ok(matching))) => {
            let matching_count = matching.len();
            let outcome = inner.memberships.install(&key, run, matching, now, || {
                inner.notify(InstallNotification {
                    key,
                    generation,
                    matching_count,
                })
            });
            match outcome {
                InstallOutcome::Installed { rerun } => {
                    debug!(
                        %key,
                        generation,
                        matching = matching_count,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "installed"
                    );
                    rerun
                }
                InstallOutcome::Superseded { rerun } => {
                    trace!(%key, generation, "superseded, discarding result");
                    rerun
                }
                InstallOutcome::Missing => {
                    trace!(%key, generation, "entry dropped, discarding result");
                    false
                }
            }
        }
        Ok(Ok(Err(error))) => {
            warn!(%key, generation, %error, "recompute failed, serving previous set");
            inner.memberships.fail(&key, run, error.to_string())
        }
        Ok(Err(error)) => {
            warn!(%key, generation, %error, "recompute task failed, serving previous set");
            inner
                .memberships
                .fail(&key, run, format!("recompute task failed: {error}"))
        }
        Err(_) => {
            warn!(
                %key,
                generation,
                timeout_ms = budget.as_millis() as u64,
                "recompute timed out, serving previous set"
            );
            let rerun = inner.memberships.fail(
                &key,
                run,
                format!("recompute timed out after {}ms", budget.as_millis()),
            );

            let late = Arc::clone(inner);
            tokio::spawn(async move {
                let Ok(Ok(matching)) = handle.await else {
                    return;
                };
                let matching_count = matching.len();
                let installed = late.memberships.install_late(&key, run, matching, now, || {
                    late.notify(InstallNotification {
                        key,
                        generation,
                        matching_count,
                    })
                });
                if installed {
                    debug!(%key, generation, "installed late result");
                } else {
                    trace!(%key, generation, "late result superseded, discarding");
                }
            });
            rerun
        }
    }
}

/// Evaluates a filter against every entity of its target kind.
///
/// A user-dependent filter evaluated for a user the provider does not know
/// sees no user state, so its user operators fail closed.
pub(crate) fn compute(
    definition: &FilterDefinition,
    scope: UserScope,
    entities: &dyn EntitySnapshotProvider,
    users: &dyn UserSnapshotProvider,
    now: DateTime<Utc>,
) -> Result<BTreeSet<EntityId>, ProviderError> {
    let user = match scope {
        UserScope::User(id) if definition.is_user_dependent() => users.user(id)?,
        _ => None,
    };

    let context = FilterContext::at(now);
    let evaluator = FilterEvaluator::new(&definition.root, &context);
    let mut matching = BTreeSet::new();

    for id in entities.entity_ids(definition.target)? {
        // Removed since the ID list was taken.
        let Some(entity) = entities.entity(id)? else {
            continue;
        };
        if entity.kind != definition.target {
            continue;
        }
        let info = user.as_ref().map(|u| UserEntityView::new(u, &entity));
        let info = info.as_ref().map(|i| i as &dyn FilterableUserInfo);
        if evaluator.matches(&EntityView(&entity), info) {
            matching.insert(id);
        }
    }

    Ok(matching)
}
