//! Cron-driven tick loop
//!
//! One process-wide guard keeps ticks from overlapping: a tick that fires
//! while the previous one is still running is skipped, not queued. Inside
//! a tick, workspaces are processed strictly sequentially to bound cloud
//! API pressure.

use crate::error::{EngineError, Result};
use crate::runner::JobRunner;
use chrono::Utc;
use cron::Schedule;
use finops_db::{DbPool, WorkspaceRepo};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Delay before the immediate startup tick
pub const STARTUP_DELAY: Duration = Duration::from_secs(5);

/// Clears the running flag on every exit path, panics included
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic trigger for the job runner
pub struct Scheduler {
    workspaces: WorkspaceRepo,
    runner: Arc<JobRunner>,
    schedule: Schedule,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler from a cron expression
    ///
    /// Accepts standard five-field cron; a seconds field of `0` is
    /// prepended since the parser wants six.
    pub fn new(pool: DbPool, runner: Arc<JobRunner>, cron_expr: &str) -> Result<Self> {
        let normalized = if cron_expr.split_whitespace().count() == 5 {
            format!("0 {cron_expr}")
        } else {
            cron_expr.to_string()
        };
        let schedule = Schedule::from_str(&normalized).map_err(|e| EngineError::Cron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            workspaces: WorkspaceRepo::new(pool),
            runner,
            schedule,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run forever: immediate tick after the startup delay, then the cron
    /// cadence
    pub async fn run(self: Arc<Self>) {
        tokio::time::sleep(STARTUP_DELAY).await;
        info!(target: "scheduler", "startup tick");
        self.tick().await;

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                error!(target: "scheduler", "cron schedule yields no future fire times, stopping");
                return;
            };
            let wait = (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::from_secs(0));
            tokio::time::sleep(wait).await;
            self.tick().await;
        }
    }

    /// One tick: skip if a tick is already running, otherwise process every
    /// workspace in sequence. Returns whether this call did the work.
    pub async fn tick(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(target: "scheduler", "previous tick still running, skipping");
            return false;
        }
        let _guard = TickGuard(&self.running);

        let workspaces = match self.workspaces.list_all().await {
            Ok(workspaces) => workspaces,
            Err(err) => {
                error!(target: "scheduler", error = %err, "failed to enumerate workspaces");
                return true;
            }
        };

        info!(target: "scheduler", count = workspaces.len(), "tick started");
        for workspace in workspaces {
            if let Err(err) = self.runner.process_workspace(&workspace.id).await {
                // A job-level failure is already recorded on its JobRun;
                // anything reaching here is infrastructure trouble
                error!(
                    target: "scheduler",
                    workspace = %workspace.id,
                    error = %err,
                    "workspace processing errored"
                );
            }
        }
        info!(target: "scheduler", "tick finished");

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_five_field_cron_is_accepted() {
        let pool = DbPool::in_memory().await.unwrap();
        let runner = Arc::new(JobRunner::new(
            pool.clone(),
            Arc::new(finops_cloud::MockFactory::new(1)),
        ));
        assert!(Scheduler::new(pool, runner, "*/1 * * * *").is_ok());
    }

    #[tokio::test]
    async fn test_bad_cron_is_rejected() {
        let pool = DbPool::in_memory().await.unwrap();
        let runner = Arc::new(JobRunner::new(
            pool.clone(),
            Arc::new(finops_cloud::MockFactory::new(1)),
        ));
        let result = Scheduler::new(pool, runner, "not a cron");
        assert!(matches!(result, Err(EngineError::Cron { .. })));
    }
}
