//! Job orchestration.
//!
//! [`JobManager`] validates requests, creates jobs and drives each one
//! through fetch, render and store. Errors raised after a job starts are
//! recorded on the job as `Failed`; they are never returned to the caller
//! of [`JobManager::process`] except for store-level faults.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, warn, Instrument};
use ytx_captions::TranscriptFetcher;
use ytx_export::ArtifactExporter;
use ytx_models::{
    is_valid_language_code, sanitize_filename, ArtifactRef, AvailableTrack, ExportFormat, Job,
    JobFilter, JobId, JobState, JobStatusView, JobTransition, LanguagePreference,
    QuickTranscript, QuickTranscriptRequest, TranscriptRequest, VideoId,
};
use ytx_storage::ArtifactStorage;

use crate::config::ServiceConfig;
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::store::{JobStore, StartOutcome};

/// Longest custom name accepted before sanitising.
pub const MAX_CUSTOM_NAME_LEN: usize = 255;

const EVENT_CAPACITY: usize = 256;

/// State change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub state: JobState,
}

/// Orchestrates transcript export jobs.
pub struct JobManager {
    store: Arc<JobStore>,
    fetcher: TranscriptFetcher,
    exporter: ArtifactExporter,
    default_languages: Vec<String>,
    job_timeout: Option<Duration>,
    events: broadcast::Sender<JobEvent>,
}

impl JobManager {
    pub fn new(
        store: Arc<JobStore>,
        fetcher: TranscriptFetcher,
        exporter: ArtifactExporter,
        config: &ServiceConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            fetcher,
            exporter,
            default_languages: config.default_languages.clone(),
            job_timeout: config.job_timeout,
            events,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    fn storage(&self) -> &Arc<dyn ArtifactStorage> {
        self.store.storage()
    }

    /// Receive every state change from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn emit(&self, job: &Job) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            job_id: job.id.clone(),
            state: job.state,
        });
    }

    fn preference(&self, languages: &[String]) -> JobResult<LanguagePreference> {
        if let Some(bad) = languages
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty() && !is_valid_language_code(l))
        {
            return Err(JobError::invalid_request(format!("malformed language code '{}'", bad)));
        }
        Ok(LanguagePreference::or_default(languages, self.default_languages.as_slice()))
    }

    /// Validate a request into a queued job without storing it.
    pub fn validate(&self, request: &TranscriptRequest) -> JobResult<Job> {
        let video_id = VideoId::parse(&request.url_or_id)?;
        if request.formats.is_empty() {
            return Err(JobError::invalid_request("at least one export format is required"));
        }
        let languages = self.preference(&request.languages)?;

        let custom_name = match request.custom_name.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) if name.chars().count() > MAX_CUSTOM_NAME_LEN => {
                return Err(JobError::invalid_request(format!(
                    "custom name longer than {} characters",
                    MAX_CUSTOM_NAME_LEN
                )));
            }
            Some(name) => {
                let cleaned = sanitize_filename(name);
                if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
                    return Err(JobError::invalid_request("custom name has no usable characters"));
                }
                Some(cleaned)
            }
        };

        Ok(Job::new(
            video_id,
            languages,
            request.formats.clone(),
            custom_name,
        ))
    }

    /// Validate and store a new `Queued` job.
    pub async fn create(&self, request: &TranscriptRequest) -> JobResult<Job> {
        let job = self.store.create(self.validate(request)?).await?;
        metrics::record_submitted();
        info!(
            job_id = %job.id,
            video_id = %job.video_id,
            formats = ?job.requested_formats,
            "Job queued"
        );
        self.emit(&job);
        Ok(job)
    }

    /// Run the whole pipeline on the calling task and return the terminal job.
    pub async fn submit_sync(&self, request: &TranscriptRequest) -> JobResult<Job> {
        let job = self.create(request).await?;
        self.process(&job.id).await
    }

    /// Drive a queued job to a terminal state.
    pub async fn process(&self, job_id: &JobId) -> JobResult<Job> {
        let job = match self.store.start(job_id).await? {
            StartOutcome::Started(job) => job,
            StartOutcome::Cancelled(job) => {
                info!(job_id = %job.id, "Job cancelled before start");
                metrics::record_finished(&job, Duration::ZERO);
                self.emit(&job);
                return Ok(job);
            }
        };

        let logger = JobLogger::new(&job.id, &job.video_id);
        let span = logger.create_span();
        self.emit(&job);
        self.run_started(job, logger).instrument(span).await
    }

    async fn run_started(&self, job: Job, logger: JobLogger) -> JobResult<Job> {
        logger.log_start(&job.requested_formats);
        let started = Instant::now();

        let mut stored = Vec::new();
        let outcome = {
            let pipeline = self.execute(&job, &logger, &mut stored);
            match self.job_timeout {
                Some(limit) => tokio::time::timeout(limit, pipeline)
                    .await
                    .unwrap_or(Err(JobError::Timeout(limit))),
                None => pipeline.await,
            }
        };

        let transition = match outcome {
            Ok(language_used) => JobTransition::Complete {
                language_used,
                artifacts: stored.iter().map(|a| (a.format, a.clone())).collect(),
            },
            Err(e) => {
                logger.log_error(&e.to_string());
                self.discard(&job.id, &stored).await;
                JobTransition::Fail(e.to_error_info())
            }
        };
        let completing = matches!(transition, JobTransition::Complete { .. });

        let finished = match self.store.update(&job.id, transition).await {
            Ok(job) => job,
            Err(e) => {
                // Deleted while running, or a store fault: nothing may keep the artifacts.
                if completing {
                    self.discard(&job.id, &stored).await;
                }
                return Err(e);
            }
        };

        let elapsed = started.elapsed();
        metrics::record_finished(&finished, elapsed);
        logger.log_finished(&finished, elapsed);
        self.emit(&finished);
        Ok(finished)
    }

    /// Fetch, render every format, then store. Returns the language used.
    async fn execute(
        &self,
        job: &Job,
        logger: &JobLogger,
        stored: &mut Vec<ArtifactRef>,
    ) -> JobResult<String> {
        let transcript = self
            .fetcher
            .resolve(&job.video_id, &job.requested_languages)
            .await?;
        logger.log_resolved(&transcript);

        let mut rendered = BTreeMap::new();
        let mut failures = Vec::new();
        for format in &job.requested_formats {
            self.checkpoint(&job.id).await?;
            match self.exporter.render(&transcript, *format) {
                Ok(bytes) => {
                    rendered.insert(*format, bytes);
                }
                Err(e) => {
                    logger.log_render_failure(*format, &e.message);
                    failures.push(e);
                }
            }
        }
        if !failures.is_empty() {
            return Err(JobError::Render(failures));
        }

        let base_name = job.artifact_base_name();
        for (format, bytes) in rendered {
            self.checkpoint(&job.id).await?;
            let artifact = self.storage().store(bytes, &base_name, format).await?;
            metrics::record_artifact(format, artifact.size_bytes);
            logger.log_stored(&artifact);
            stored.push(artifact);
        }

        Ok(transcript.language_code)
    }

    /// Best-effort cancellation point between per-format steps.
    async fn checkpoint(&self, job_id: &JobId) -> JobResult<()> {
        if self.store.is_cancel_requested(job_id).await {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    async fn discard(&self, job_id: &JobId, artifacts: &[ArtifactRef]) {
        for artifact in artifacts {
            if let Err(e) = self.storage().delete(artifact).await {
                warn!(job_id = %job_id, format = %artifact.format, "Failed to discard artifact: {}", e);
            }
        }
    }

    /// Resolve a transcript and return its text without creating a job.
    pub async fn quick(&self, request: &QuickTranscriptRequest) -> JobResult<QuickTranscript> {
        let result = self.quick_inner(request).await;
        metrics::record_quick(if result.is_ok() { "ok" } else { "error" });
        result
    }

    async fn quick_inner(&self, request: &QuickTranscriptRequest) -> JobResult<QuickTranscript> {
        let video_id = VideoId::parse(&request.url_or_id)?;
        let preference = self.preference(&request.languages)?;
        let transcript = self.fetcher.resolve(&video_id, &preference).await?;

        Ok(QuickTranscript {
            text: transcript.full_text(),
            word_count: transcript.word_count(),
            duration_seconds: transcript.duration().as_secs_f64(),
            video_id,
            language: transcript.language_code,
            is_auto_generated: transcript.is_auto_generated,
        })
    }

    /// Caption tracks currently offered for a video.
    pub async fn available_tracks(&self, url_or_id: &str) -> JobResult<Vec<AvailableTrack>> {
        let video_id = VideoId::parse(url_or_id)?;
        Ok(self.fetcher.available_tracks(&video_id).await?)
    }

    pub async fn get(&self, job_id: &JobId) -> JobResult<Job> {
        self.store.get(job_id).await
    }

    pub async fn status(&self, job_id: &JobId) -> JobResult<JobStatusView> {
        Ok(JobStatusView::from(&self.store.get(job_id).await?))
    }

    pub async fn list(&self, filter: &JobFilter) -> Vec<JobStatusView> {
        self.store
            .list(filter)
            .await
            .iter()
            .map(JobStatusView::from)
            .collect()
    }

    /// Request cancellation. Queued jobs fail as `Cancelled` when a worker
    /// picks them up; running jobs stop at the next checkpoint.
    pub async fn cancel(&self, job_id: &JobId) -> JobResult<JobStatusView> {
        let job = self.store.request_cancel(job_id).await?;
        if job.cancel_requested {
            info!(job_id = %job_id, state = %job.state, "Cancellation requested");
        }
        Ok(JobStatusView::from(&job))
    }

    /// Delete a job and its artifacts. Returns whether the job existed.
    pub async fn delete(&self, job_id: &JobId) -> JobResult<bool> {
        self.store.delete(job_id).await
    }

    /// Bytes of one stored artifact.
    pub async fn read_artifact(&self, job_id: &JobId, format: ExportFormat) -> JobResult<Vec<u8>> {
        let job = self.store.get(job_id).await?;
        let artifact = job.artifacts.get(&format).ok_or_else(|| {
            JobError::invalid_request(format!("job {} has no {} artifact", job_id, format))
        })?;
        Ok(self.storage().read(artifact).await?)
    }

    /// Wait until a job is terminal, or until `limit` elapses.
    pub async fn wait_for_terminal(&self, job_id: &JobId, limit: Duration) -> JobResult<Job> {
        let mut events = self.subscribe();
        tokio::time::timeout(limit, self.watch_until_terminal(job_id, &mut events))
            .await
            .unwrap_or(Err(JobError::Timeout(limit)))
    }

    async fn watch_until_terminal(
        &self,
        job_id: &JobId,
        events: &mut broadcast::Receiver<JobEvent>,
    ) -> JobResult<Job> {
        loop {
            let job = self.store.get(job_id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            loop {
                match events.recv().await {
                    Ok(event) if &event.job_id == job_id && event.state.is_terminal() => break,
                    Ok(_) => continue,
                    // Missed events: re-read the store.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return Err(JobError::WorkerUnavailable),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytx_captions::{MemoryCaptionSource, RetryPolicy};
    use ytx_storage::MemoryArtifactStorage;

    fn manager() -> JobManager {
        let store = Arc::new(JobStore::in_memory(Arc::new(MemoryArtifactStorage::new())));
        let fetcher = TranscriptFetcher::new(Arc::new(MemoryCaptionSource::new()), RetryPolicy::none());
        JobManager::new(store, fetcher, ArtifactExporter::default(), &ServiceConfig::default())
    }

    fn request() -> TranscriptRequest {
        TranscriptRequest::new("https://youtu.be/abc123XYZ90").with_format(ExportFormat::PlainText)
    }

    #[test]
    fn test_validate_applies_default_languages() {
        let job = manager().validate(&request()).unwrap();
        assert_eq!(job.video_id.as_str(), "abc123XYZ90");
        assert_eq!(job.requested_languages.codes(), &["en", "en-US", "en-GB"]);
        assert_eq!(job.artifact_base_name(), "abc123XYZ90_transcript");
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let m = manager();

        let bad_video = TranscriptRequest::new("https://vimeo.com/123").with_format(ExportFormat::PlainText);
        assert!(matches!(m.validate(&bad_video), Err(JobError::InvalidVideoReference(_))));

        let no_formats = TranscriptRequest::new("abc123XYZ90");
        assert!(matches!(m.validate(&no_formats), Err(JobError::InvalidRequest(_))));

        let bad_language = request().with_languages(["en", "not a code"]);
        assert!(matches!(m.validate(&bad_language), Err(JobError::InvalidRequest(_))));

        let long_name = request().with_custom_name("x".repeat(MAX_CUSTOM_NAME_LEN + 1));
        assert!(matches!(m.validate(&long_name), Err(JobError::InvalidRequest(_))));

        let useless_name = request().with_custom_name("///");
        assert!(matches!(m.validate(&useless_name), Err(JobError::InvalidRequest(_))));
    }

    #[test]
    fn test_custom_name_is_sanitized() {
        let job = manager()
            .validate(&request().with_custom_name("My talk: part 1/2"))
            .unwrap();
        assert_eq!(job.artifact_base_name(), "My talk_ part 1_2");
    }

    #[tokio::test]
    async fn test_rejected_request_creates_no_job() {
        let m = manager();
        let _ = m.create(&TranscriptRequest::new("abc123XYZ90")).await;
        assert!(m.store().is_empty().await);
    }
}
