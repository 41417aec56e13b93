// Background polling workers: catalog synchronization and per-user solve
// reconciliation, on independent timers. The cadence is configuration, not
// core logic; both loops delegate to the catalog/ingestion modules.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog;
use crate::db::Database;
use crate::error::TrackerError;
use crate::ingest::{Lifecycle, Reconciler};
use crate::metrics;
use crate::source::{CatalogSource, NotificationSink, SolveSource};

/// Spawn the catalog polling loop: periodically import newly published
/// challenges and announce them through the sink.
pub fn spawn_catalog_poller(
    db: Arc<Database>,
    reconciler: Arc<Reconciler>,
    source: Arc<dyn CatalogSource>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = run_catalog_cycle(&db, &reconciler, source.as_ref(), sink.as_ref()).await
            {
                metrics::POLL_ERRORS_TOTAL.with_label_values(&["catalog"]).inc();
                tracing::error!("catalog poll failed: {e}");
            }
        }
    });
}

/// One catalog poll cycle. Advances the lifecycle on the first success.
pub async fn run_catalog_cycle(
    db: &Database,
    reconciler: &Reconciler,
    source: &dyn CatalogSource,
    sink: &dyn NotificationSink,
) -> Result<(), TrackerError> {
    let added = catalog::sync_catalog(db, source).await?;
    reconciler.mark_catalog_loaded();
    for challenge in &added {
        metrics::CHALLENGES_ADDED_TOTAL.inc();
        sink.challenge_added(challenge).await;
    }
    Ok(())
}

/// Spawn the solve polling loop: periodically reconcile every tracked user
/// against their remote history.
pub fn spawn_solve_poller(
    db: Arc<Database>,
    reconciler: Arc<Reconciler>,
    solve_source: Arc<dyn SolveSource>,
    catalog_source: Arc<dyn CatalogSource>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            run_solve_cycle(
                &db,
                &reconciler,
                solve_source.as_ref(),
                catalog_source.as_ref(),
                sink.as_ref(),
            )
            .await;
        }
    });
}

/// One solve poll cycle over all tracked users.
///
/// A single user's failure is logged and isolated so it never halts
/// processing of the others. Unknown challenge references trigger one
/// catalog resync at the end of the cycle; the deferred solves are picked
/// up on the next pass.
pub async fn run_solve_cycle(
    db: &Database,
    reconciler: &Reconciler,
    solve_source: &dyn SolveSource,
    catalog_source: &dyn CatalogSource,
    sink: &dyn NotificationSink,
) {
    // Solves cannot be applied before the catalog exists.
    if reconciler.lifecycle() < Lifecycle::CatalogLoaded {
        tracing::debug!("skipping solve poll, catalog not loaded yet");
        return;
    }

    let users = match db.list_users().await {
        Ok(users) => users,
        Err(e) => {
            metrics::POLL_ERRORS_TOTAL.with_label_values(&["solves"]).inc();
            tracing::error!("solve poll cannot list users: {e}");
            return;
        }
    };

    let mut need_catalog_sync = false;

    for user in users {
        let remote = match solve_source.fetch_solves(user.id).await {
            Ok(remote) => remote,
            Err(e) => {
                metrics::POLL_ERRORS_TOTAL.with_label_values(&["solves"]).inc();
                tracing::warn!(user_id = user.id, "solve fetch failed: {e}");
                continue;
            }
        };

        match reconciler.reconcile_user(user.id, &remote).await {
            Ok(outcome) => {
                for event in &outcome.events {
                    sink.solve_recorded(event).await;
                }
                if !outcome.unknown_challenges.is_empty() {
                    need_catalog_sync = true;
                }
            }
            Err(e) => {
                metrics::POLL_ERRORS_TOTAL.with_label_values(&["solves"]).inc();
                tracing::warn!(user_id = user.id, "reconciliation failed: {e}");
            }
        }
    }

    if need_catalog_sync {
        tracing::info!("unknown challenge references seen, resyncing catalog");
        if let Err(e) = run_catalog_cycle(db, reconciler, catalog_source, sink).await {
            metrics::POLL_ERRORS_TOTAL.with_label_values(&["catalog"]).inc();
            tracing::error!("triggered catalog resync failed: {e}");
        }
    }

    reconciler.mark_ready();
}
