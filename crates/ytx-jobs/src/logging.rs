//! Structured job logging.
//!
//! Every lifecycle line carries the job and video ids so a job can be
//! followed through the worker pool with a single filter.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{error, info, warn, Span};
use ytx_models::{ArtifactRef, ErrorInfo, ExportFormat, Job, JobId, Transcript, VideoId};

/// Lifecycle logger bound to one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_id: &VideoId) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
        }
    }

    pub fn log_start(&self, formats: &BTreeSet<ExportFormat>) {
        let formats: Vec<&str> = formats.iter().map(ExportFormat::as_str).collect();
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            formats = %formats.join(","),
            "Job started"
        );
    }

    pub fn log_resolved(&self, transcript: &Transcript) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            language = %transcript.language_code,
            auto_generated = transcript.is_auto_generated,
            segments = transcript.segments.len(),
            "Caption track resolved"
        );
    }

    pub fn log_render_failure(&self, format: ExportFormat, message: &str) {
        warn!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            format = %format,
            "Render failed: {}", message
        );
    }

    pub fn log_stored(&self, artifact: &ArtifactRef) {
        info!(
            job_id = %self.job_id,
            format = %artifact.format,
            location = %artifact.location,
            bytes = artifact.size_bytes,
            "Artifact stored"
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job error: {}", message
        );
    }

    /// Terminal outcome of a run.
    pub fn log_finished(&self, job: &Job, elapsed: Duration) {
        match &job.error {
            None => info!(
                job_id = %self.job_id,
                video_id = %self.video_id,
                language = job.language_used.as_deref().unwrap_or("-"),
                artifacts = job.artifacts.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Job completed"
            ),
            Some(ErrorInfo { kind, message }) => warn!(
                job_id = %self.job_id,
                video_id = %self.video_id,
                error_kind = %kind,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job failed: {}", message
            ),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping a whole job run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, video_id = %self.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_carries_job_id() {
        let job_id = JobId::new();
        let video_id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let logger = JobLogger::new(&job_id, &video_id);

        assert_eq!(logger.job_id(), job_id.to_string());
        // Logging without a subscriber installed is a no-op.
        logger.log_start(&BTreeSet::from([ExportFormat::PlainText]));
    }
}
