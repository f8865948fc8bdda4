//! Job registry.
//!
//! Jobs live in a map of per-job mutexes. The map lock is held only long
//! enough to find or insert an entry, so transitions for different jobs
//! never wait on each other, while transitions for one job are serialized.
//! With a persistence directory every change is also written to
//! `<dir>/<job id>.json` before the call returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use ytx_models::{ErrorInfo, ErrorKind, Job, JobFilter, JobId, JobState, JobTransition};
use ytx_storage::ArtifactStorage;

use crate::error::{JobError, JobResult};

struct Slot {
    job: Job,
    /// Set once the job is removed, so holders of a stale handle cannot
    /// write it back.
    deleted: bool,
}

type SlotHandle = Arc<Mutex<Slot>>;

/// What happened when a worker tried to start a job.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// Job is now `Running`.
    Started(Job),
    /// Cancellation was pending; job is now `Failed(Cancelled)`.
    Cancelled(Job),
}

/// Registry of jobs keyed by id.
pub struct JobStore {
    slots: RwLock<HashMap<JobId, SlotHandle>>,
    storage: Arc<dyn ArtifactStorage>,
    persist_dir: Option<PathBuf>,
}

impl JobStore {
    /// Memory-only store.
    pub fn in_memory(storage: Arc<dyn ArtifactStorage>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            storage,
            persist_dir: None,
        }
    }

    /// File-backed store, loading any jobs already in `dir`.
    ///
    /// Jobs found `Running` were interrupted by a restart and are failed;
    /// `Queued` jobs are kept so the caller can re-enqueue them.
    pub async fn open(dir: impl Into<PathBuf>, storage: Arc<dyn ArtifactStorage>) -> JobResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| JobError::persistence(format!("{}: {}", dir.display(), e)))?;

        let store = Self {
            slots: RwLock::new(HashMap::new()),
            storage,
            persist_dir: Some(dir.clone()),
        };

        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| JobError::persistence(format!("{}: {}", dir.display(), e)))?;
        let mut loaded = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| JobError::persistence(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let mut job = match read_job(&path).await {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping unreadable job record {}: {}", path.display(), e);
                    continue;
                }
            };

            if job.state == JobState::Running {
                let info = ErrorInfo::new(ErrorKind::UpstreamError, "interrupted by service restart");
                if job.apply(JobTransition::Fail(info)).is_ok() {
                    store.persist(&job).await?;
                }
            }
            store
                .slots
                .write()
                .await
                .insert(job.id.clone(), Arc::new(Mutex::new(Slot { job, deleted: false })));
            loaded += 1;
        }

        info!("Loaded {} job records from {}", loaded, dir.display());
        Ok(store)
    }

    pub fn storage(&self) -> &Arc<dyn ArtifactStorage> {
        &self.storage
    }

    async fn slot(&self, id: &JobId) -> JobResult<SlotHandle> {
        self.slots
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    /// Insert a new job.
    pub async fn create(&self, job: Job) -> JobResult<Job> {
        self.persist(&job).await?;
        let mut slots = self.slots.write().await;
        if slots.contains_key(&job.id) {
            return Err(JobError::invalid_request(format!("job {} already exists", job.id)));
        }
        slots.insert(
            job.id.clone(),
            Arc::new(Mutex::new(Slot {
                job: job.clone(),
                deleted: false,
            })),
        );
        debug!(job_id = %job.id, "Created job");
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> JobResult<Job> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        if slot.deleted {
            return Err(JobError::NotFound(id.clone()));
        }
        Ok(slot.job.clone())
    }

    /// Apply a transition under the job's lock.
    ///
    /// An illegal transition is a bug in the caller and is logged as such.
    pub async fn update(&self, id: &JobId, transition: JobTransition) -> JobResult<Job> {
        let handle = self.slot(id).await?;
        let mut slot = handle.lock().await;
        if slot.deleted {
            return Err(JobError::NotFound(id.clone()));
        }

        let mut next = slot.job.clone();
        if let Err(source) = next.apply(transition) {
            error!(job_id = %id, "Rejected state transition: {}", source);
            return Err(JobError::InvalidStateTransition {
                job_id: id.clone(),
                source,
            });
        }
        self.persist(&next).await?;
        slot.job = next.clone();
        Ok(next)
    }

    /// Move a queued job to `Running`, or straight to `Failed(Cancelled)`
    /// if cancellation was requested first. The check and the transition
    /// happen under one lock acquisition.
    pub async fn start(&self, id: &JobId) -> JobResult<StartOutcome> {
        let handle = self.slot(id).await?;
        let mut slot = handle.lock().await;
        if slot.deleted {
            return Err(JobError::NotFound(id.clone()));
        }

        let cancelled = slot.job.cancel_requested;
        let transition = if cancelled {
            JobTransition::Fail(ErrorInfo::cancelled())
        } else {
            JobTransition::Start
        };

        let mut next = slot.job.clone();
        next.apply(transition)
            .map_err(|source| JobError::InvalidStateTransition {
                job_id: id.clone(),
                source,
            })?;
        self.persist(&next).await?;
        slot.job = next.clone();

        Ok(if cancelled {
            StartOutcome::Cancelled(next)
        } else {
            StartOutcome::Started(next)
        })
    }

    /// Flag a job for cancellation. Terminal jobs are returned unchanged.
    pub async fn request_cancel(&self, id: &JobId) -> JobResult<Job> {
        let handle = self.slot(id).await?;
        let mut slot = handle.lock().await;
        if slot.deleted {
            return Err(JobError::NotFound(id.clone()));
        }
        if slot.job.is_terminal() || slot.job.cancel_requested {
            return Ok(slot.job.clone());
        }

        let mut next = slot.job.clone();
        next.cancel_requested = true;
        self.persist(&next).await?;
        slot.job = next.clone();
        Ok(next)
    }

    pub async fn is_cancel_requested(&self, id: &JobId) -> bool {
        match self.get(id).await {
            Ok(job) => job.cancel_requested,
            Err(_) => false,
        }
    }

    /// Jobs matching `filter`, newest first.
    pub async fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let handles: Vec<SlotHandle> = self.slots.read().await.values().cloned().collect();

        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            let slot = handle.lock().await;
            if !slot.deleted && filter.matches(&slot.job) {
                jobs.push(slot.job.clone());
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        jobs
    }

    /// Remove a job and its stored artifacts.
    ///
    /// Returns `false` when the job did not exist. Artifact deletion is
    /// best-effort: failures are logged and the record is still removed.
    pub async fn delete(&self, id: &JobId) -> JobResult<bool> {
        let Some(handle) = self.slots.write().await.remove(id) else {
            return Ok(false);
        };

        let artifacts = {
            let mut slot = handle.lock().await;
            slot.deleted = true;
            std::mem::take(&mut slot.job.artifacts)
        };

        for artifact in artifacts.values() {
            if let Err(e) = self.storage.delete(artifact).await {
                warn!(job_id = %id, format = %artifact.format, "Failed to delete artifact: {}", e);
            }
        }

        if let Some(path) = self.record_path(id) {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(job_id = %id, "Failed to remove job record: {}", e),
            }
        }

        debug!(job_id = %id, artifacts = artifacts.len(), "Deleted job");
        Ok(true)
    }

    /// Bytes held by all stored artifacts.
    pub async fn total_artifact_bytes(&self) -> u64 {
        self.list(&JobFilter::default())
            .await
            .iter()
            .map(Job::artifact_bytes)
            .sum()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of jobs still waiting for a worker, oldest first.
    pub async fn queued_ids(&self) -> Vec<JobId> {
        let mut jobs = self.list(&JobFilter::state(JobState::Queued)).await;
        jobs.reverse();
        jobs.into_iter().map(|j| j.id).collect()
    }

    fn record_path(&self, id: &JobId) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", id)))
    }

    async fn persist(&self, job: &Job) -> JobResult<()> {
        let Some(path) = self.record_path(&job.id) else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(job)
            .map_err(|e| JobError::persistence(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written record.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| JobError::persistence(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| JobError::persistence(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

async fn read_job(path: &Path) -> JobResult<Job> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| JobError::persistence(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| JobError::persistence(e.to_string()))
}
