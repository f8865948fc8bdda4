//! Background worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use ytx_models::{JobId, TranscriptRequest};

use crate::config::ServiceConfig;
use crate::error::{JobError, JobResult};
use crate::manager::JobManager;

/// Runs queued jobs on background tasks, at most `workers` at a time.
pub struct WorkerPool {
    manager: Arc<JobManager>,
    sender: mpsc::Sender<JobId>,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Start the pool. Must be called from within a tokio runtime.
    pub fn start(manager: Arc<JobManager>, config: &ServiceConfig) -> Self {
        let max_concurrent_jobs = config.workers.max(1);
        let job_semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        info!("Starting worker pool with {} max concurrent jobs", max_concurrent_jobs);
        let dispatcher = tokio::spawn(Self::dispatch(
            Arc::clone(&manager),
            receiver,
            Arc::clone(&job_semaphore),
            shutdown_rx,
        ));

        Self {
            manager,
            sender,
            job_semaphore,
            max_concurrent_jobs,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        &self.manager
    }

    /// Validate and queue a request, returning its job id immediately.
    ///
    /// A queue slot is reserved before the job is created, so a stopped pool
    /// never leaves an orphaned `Queued` job behind.
    pub async fn submit(&self, request: &TranscriptRequest) -> JobResult<JobId> {
        self.manager.validate(request)?;
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|_| JobError::WorkerUnavailable)?;
        let job = self.manager.create(request).await?;
        permit.send(job.id.clone());
        Ok(job.id)
    }

    /// Queue an existing job, e.g. one recovered from a persisted store.
    pub async fn enqueue(&self, job_id: JobId) -> JobResult<()> {
        self.sender
            .send(job_id)
            .await
            .map_err(|_| JobError::WorkerUnavailable)
    }

    /// Queue every job the store still holds as `Queued`.
    pub async fn resume_queued(&self) -> JobResult<usize> {
        let ids = self.manager.store().queued_ids().await;
        let count = ids.len();
        for id in ids {
            self.enqueue(id).await?;
        }
        if count > 0 {
            info!("Re-queued {} pending jobs", count);
        }
        Ok(count)
    }

    async fn dispatch(
        manager: Arc<JobManager>,
        mut receiver: mpsc::Receiver<JobId>,
        job_semaphore: Arc<Semaphore>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping dispatcher");
                        break;
                    }
                }
                next = receiver.recv() => {
                    let Some(job_id) = next else {
                        break;
                    };
                    let permit = match Arc::clone(&job_semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let manager = Arc::clone(&manager);

                    tokio::spawn(async move {
                        let _permit = permit;
                        debug!(job_id = %job_id, "Worker picked up job");
                        match manager.process(&job_id).await {
                            Ok(job) => debug!(job_id = %job_id, state = %job.state, "Worker finished job"),
                            Err(JobError::NotFound(_)) => {
                                warn!(job_id = %job_id, "Job deleted before a worker reached it");
                            }
                            Err(e) => error!(job_id = %job_id, "Job processing fault: {}", e),
                        }
                    });
                }
            }
        }
    }

    /// Stop accepting work and wait for in-flight jobs.
    ///
    /// Jobs still in the channel stay `Queued` in the store.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.dispatcher.lock().await.take() {
            let _ = handle.await;
        }

        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(
            self.shutdown_timeout,
            self.job_semaphore.acquire_many(self.max_concurrent_jobs as u32),
        )
        .await;
        if drained.is_err() {
            warn!("Shutdown timed out with jobs still running");
        }
        info!("Worker pool stopped");
    }
}
