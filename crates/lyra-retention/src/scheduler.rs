//! Periodic background cleanup.
//!
//! The scheduler owns one tokio task that, on every tick, applies the
//! configured policy to all files and then sweeps orphans. The work itself is
//! synchronous and runs on the blocking pool. Ticks missed while a run is
//! still in progress are skipped, not bursted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{BatchCleanupReport, CleanupEngine, SweepReport};
use crate::error::{RetentionError, RetentionResult};
use crate::policy::RetentionPolicy;

/// Result of one scheduled maintenance run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub cleanup: BatchCleanupReport,
    pub sweep: SweepReport,
}

impl MaintenanceReport {
    pub fn bytes_freed(&self) -> u64 {
        self.cleanup.bytes_freed() + self.sweep.bytes_freed
    }
}

/// Runs cleanup on a fixed interval.
#[derive(Clone)]
pub struct CleanupScheduler {
    engine: Arc<CleanupEngine>,
    policy: RetentionPolicy,
    interval: Duration,
}

impl CleanupScheduler {
    pub fn new(
        engine: Arc<CleanupEngine>,
        policy: RetentionPolicy,
        interval: Duration,
    ) -> RetentionResult<Self> {
        if interval.is_zero() {
            return Err(RetentionError::InvalidSchedule(
                "cleanup interval must be greater than zero".into(),
            ));
        }
        policy.validate()?;
        Ok(Self {
            engine,
            policy,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cleanup-then-sweep pass on the blocking pool.
    pub async fn run_once(&self) -> RetentionResult<MaintenanceReport> {
        let engine = Arc::clone(&self.engine);
        let policy = self.policy.clone();
        tokio::task::spawn_blocking(move || -> RetentionResult<MaintenanceReport> {
            let cleanup = engine.cleanup_all(&policy)?;
            let sweep = engine.sweep_orphans()?;
            Ok(MaintenanceReport { cleanup, sweep })
        })
        .await
        .map_err(|e| RetentionError::Task(e.to_string()))?
    }

    /// Start the background task. Must be called within a tokio runtime.
    ///
    /// The first run happens one interval after spawning.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.interval.as_secs(), "cleanup scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("cleanup scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(report) => debug!(
                                deleted = report.cleanup.versions_deleted(),
                                orphaned_blobs = report.sweep.orphaned_blobs,
                                bytes_freed = report.bytes_freed(),
                                "scheduled cleanup finished"
                            ),
                            Err(e) => warn!(error = %e, "scheduled cleanup failed"),
                        }
                    }
                }
            }
        });
        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle to a running scheduler. Dropping it also stops the task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the task to stop and wait for it. A run in progress completes
    /// first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "cleanup scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
