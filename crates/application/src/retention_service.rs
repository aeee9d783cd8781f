use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use trailkeeper_core::{AppError, AppResult};

use crate::audit_ports::{ArchiveWriter, AuditStore};

mod cleanup;
#[cfg(test)]
mod tests;

/// Configuration for the recurring retention job.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Interval between scheduled cleanup passes.
    pub interval: Duration,
    /// Maximum events archived per tenant in one pass.
    pub archive_batch_size: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            archive_batch_size: 10_000,
        }
    }
}

impl RetentionConfig {
    fn validate(&self) -> AppResult<()> {
        if self.interval.is_zero() {
            return Err(AppError::Validation(
                "interval must be greater than zero".to_owned(),
            ));
        }

        if self.archive_batch_size == 0 {
            return Err(AppError::Validation(
                "archive_batch_size must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Aggregate outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Tenants whose policy was loaded and processed.
    pub tenants_processed: u64,
    /// Events written to archive storage across all tenants.
    pub events_archived: u64,
    /// Events permanently deleted across all tenants.
    pub events_deleted: u64,
    /// Tenants with at least one failed step; the pass continued past them.
    pub tenant_failures: u64,
}

struct SchedulerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Scheduler that enforces per-tenant retention policies unattended.
///
/// Each pass ages events through the warm tier (archive) and the cold tier
/// (purge) tenant by tenant. Tenants are processed sequentially, which
/// bounds peak store load; retention is not latency-sensitive.
pub struct RetentionService {
    store: Arc<dyn AuditStore>,
    archive: Arc<dyn ArchiveWriter>,
    config: RetentionConfig,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl RetentionService {
    /// Creates a retention service with a validated configuration.
    pub fn new(
        store: Arc<dyn AuditStore>,
        archive: Arc<dyn ArchiveWriter>,
        config: RetentionConfig,
    ) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            store,
            archive,
            config,
            scheduler: Mutex::new(None),
        })
    }

    /// Launches the recurring cleanup scheduler.
    ///
    /// The scheduler stops on [`RetentionService::stop`] or when the parent
    /// token fires, whichever comes first.
    pub async fn start(&self, shutdown: CancellationToken) -> AppResult<()> {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_some() {
            return Err(AppError::Conflict(
                "retention scheduler is already running".to_owned(),
            ));
        }

        let stop = shutdown.child_token();
        let task = tokio::spawn(run_scheduler(
            Arc::clone(&self.store),
            Arc::clone(&self.archive),
            self.config.clone(),
            stop.clone(),
        ));
        *scheduler = Some(SchedulerHandle { stop, task });

        Ok(())
    }

    /// Signals the scheduler to halt and waits for any in-flight cleanup
    /// pass to finish. A no-op when the scheduler is not running.
    pub async fn stop(&self) -> AppResult<()> {
        let Some(handle) = self.scheduler.lock().await.take() else {
            return Ok(());
        };

        handle.stop.cancel();
        handle.task.await.map_err(|error| {
            AppError::Internal(format!("retention scheduler task failed: {error}"))
        })
    }

    /// Synchronously executes one cleanup pass; used for administrative
    /// triggering and testing.
    pub async fn run_cleanup_now(&self) -> AppResult<CleanupReport> {
        cleanup::run_pass(self.store.as_ref(), self.archive.as_ref(), &self.config).await
    }
}

async fn run_scheduler(
    store: Arc<dyn AuditStore>,
    archive: Arc<dyn ArchiveWriter>,
    config: RetentionConfig,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Consume the immediate first tick; the first pass runs one full
    // interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) =
                    cleanup::run_pass(store.as_ref(), archive.as_ref(), &config).await
                {
                    warn!(error = %error, "scheduled retention pass failed");
                }
            }
            () = stop.cancelled() => break,
        }
    }
}
