//! Full-inventory resource sync
//!
//! Runs the collector sweep for one workspace, upserts every record, then
//! soft-deletes whatever stopped being observed. Individual upsert
//! failures are logged and skipped; the sync itself only fails on a
//! persistence-layer breakdown around the sweep.

use chrono::{Duration, Utc};
use finops_cloud::collect::{run_collectors, Collect};
use finops_core::model::Workspace;
use finops_db::ResourceRepo;
use tracing::{info, warn};

/// Resources unseen for this long get soft-deleted
pub const STALE_AFTER_HOURS: i64 = 1;

/// What one inventory sync did
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Records produced by the collector sweep
    pub collected: usize,
    /// Records successfully upserted
    pub upserted: usize,
    /// Per-collector error strings from the sweep
    pub errors: Vec<String>,
    /// Rows flipped to `not-found` by the stale sweep
    pub swept: u64,
}

/// Collect, upsert, soft-delete for one workspace
pub async fn sync_resources(
    resources: &ResourceRepo,
    workspace: &Workspace,
    collectors: Vec<Box<dyn Collect>>,
) -> crate::Result<SyncOutcome> {
    let now = Utc::now();
    let collection = run_collectors(collectors).await;

    let mut outcome = SyncOutcome {
        collected: collection.records.len(),
        errors: collection.errors,
        ..Default::default()
    };

    for record in &collection.records {
        match resources.upsert(&workspace.id, record, now).await {
            Ok(()) => outcome.upserted += 1,
            Err(err) => {
                warn!(
                    target: "resource-sync",
                    workspace = %workspace.id,
                    resource = %record.resource_id,
                    error = %err,
                    "resource upsert failed, skipping"
                );
            }
        }
    }

    outcome.swept = resources
        .mark_stale(&workspace.id, now - Duration::hours(STALE_AFTER_HOURS))
        .await?;

    info!(
        target: "resource-sync",
        workspace = %workspace.id,
        collected = outcome.collected,
        upserted = outcome.upserted,
        swept = outcome.swept,
        collector_errors = outcome.errors.len(),
        "inventory sync finished"
    );
    for error in &outcome.errors {
        warn!(target: "resource-sync", workspace = %workspace.id, "{error}");
    }

    Ok(outcome)
}
