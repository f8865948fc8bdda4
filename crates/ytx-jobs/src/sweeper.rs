//! Background retention sweeper.
//!
//! Each pass evicts terminal jobs past the retention age, then, while
//! stored artifact bytes exceed the budget, evicts the oldest terminal jobs
//! that still hold artifacts. Queued and running jobs are never touched.
//! Finally, stored artifacts that no job references and that are older than
//! the retention age are deleted; these are left by runs that were cut off
//! between storing and recording. A pass that finds nothing to do changes
//! nothing, so repeated passes are harmless.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};
use ytx_models::{Job, JobFilter};

use crate::config::RetentionConfig;
use crate::error::JobResult;
use crate::metrics;
use crate::store::JobStore;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted_for_size: usize,
    /// Unreferenced artifacts deleted from storage
    pub orphans_removed: usize,
    pub bytes_freed: u64,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.expired + self.evicted_for_size
    }
}

/// Retention sweeper service.
pub struct RetentionSweeper {
    store: Arc<JobStore>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(store: Arc<JobStore>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// Sweep on a fixed interval until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting retention sweeper (interval: {:?}, max age: {:?}, byte budget: {:?})",
            self.config.interval, self.config.max_age, self.config.max_total_bytes
        );

        let mut ticker = interval(self.config.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Retention sweeper stopped");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("Retention sweep error: {}", e);
                    }
                }
            }
        }
    }

    pub async fn sweep(&self) -> JobResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run a single pass as if the current time were `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> JobResult<SweepReport> {
        let cutoff = chrono::Duration::from_std(self.config.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut terminal: Vec<Job> = self
            .store
            .list(&JobFilter::default())
            .await
            .into_iter()
            .filter(Job::is_terminal)
            .collect();
        // Oldest first.
        terminal.sort_by_key(|job| job.finished_at());

        let mut report = SweepReport::default();
        let mut keep = Vec::with_capacity(terminal.len());
        for job in terminal {
            if job.finished_at() < cutoff {
                let bytes = job.artifact_bytes();
                if self.store.delete(&job.id).await? {
                    report.expired += 1;
                    report.bytes_freed += bytes;
                }
            } else {
                keep.push(job);
            }
        }

        if let Some(budget) = self.config.max_total_bytes {
            let mut total = self.store.total_artifact_bytes().await;
            for job in keep {
                if total <= budget {
                    break;
                }
                let bytes = job.artifact_bytes();
                // Evicting a job with nothing stored frees nothing.
                if bytes == 0 {
                    continue;
                }
                if self.store.delete(&job.id).await? {
                    report.evicted_for_size += 1;
                    report.bytes_freed += bytes;
                    total = total.saturating_sub(bytes);
                }
            }
        }

        self.remove_orphans(cutoff, &mut report).await?;

        metrics::record_eviction("expired", report.expired as u64);
        metrics::record_eviction("size", report.evicted_for_size as u64);
        metrics::record_eviction("orphan", report.orphans_removed as u64);
        if report.evicted() > 0 || report.orphans_removed > 0 {
            info!(
                "Retention sweep evicted {} jobs ({} expired, {} over budget), removed {} orphaned artifacts, freed {} bytes",
                report.evicted(),
                report.expired,
                report.evicted_for_size,
                report.orphans_removed,
                report.bytes_freed
            );
        }
        Ok(report)
    }

    /// Delete stored artifacts created before `cutoff` that no job references.
    async fn remove_orphans(&self, cutoff: DateTime<Utc>, report: &mut SweepReport) -> JobResult<()> {
        let storage = self.store.storage();
        let stored = storage.list().await?;
        if stored.is_empty() {
            return Ok(());
        }

        let referenced: HashSet<String> = self
            .store
            .list(&JobFilter::default())
            .await
            .into_iter()
            .flat_map(|job| job.artifacts.into_values().map(|a| a.location))
            .collect();

        for artifact in stored {
            if artifact.created_at >= cutoff || referenced.contains(&artifact.location) {
                continue;
            }
            match storage.delete(&artifact).await {
                Ok(()) => {
                    report.orphans_removed += 1;
                    report.bytes_freed += artifact.size_bytes;
                }
                Err(e) => warn!("Failed to remove orphaned artifact {}: {}", artifact.location, e),
            }
        }
        Ok(())
    }
}
