//! Job status surface for polling callers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ErrorKind, ExportFormat, Job, JobId, JobState, VideoId};

/// Externally visible snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub state: JobState,
    /// Coarse progress percentage (0-100)
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_used: Option<String>,
    pub available_formats: BTreeSet<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        let progress = match job.state {
            JobState::Queued => 0,
            JobState::Running => 50,
            JobState::Completed => 100,
            JobState::Failed => 0,
        };

        Self {
            job_id: job.id.clone(),
            video_id: job.video_id.clone(),
            state: job.state,
            progress,
            created_at: job.created_at,
            completed_at: job.completed_at,
            language_used: job.language_used.clone(),
            available_formats: job.artifacts.keys().copied().collect(),
            error_kind: job.error.as_ref().map(|e| e.kind),
            error_message: job.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// Optional filter for job listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub state: Option<JobState>,
    /// Maximum number of jobs, newest first
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn state(state: JobState) -> Self {
        Self {
            state: Some(state),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.state.map_or(true, |s| s == job.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorInfo, JobTransition, LanguagePreference};

    #[test]
    fn test_failed_job_view() {
        let mut job = Job::new(
            VideoId::parse("dQw4w9WgXcQ").unwrap(),
            LanguagePreference::default(),
            [ExportFormat::PlainText].into_iter().collect(),
            None,
        );
        job.apply(JobTransition::Start).unwrap();
        job.apply(JobTransition::Fail(ErrorInfo::new(
            ErrorKind::CaptionsDisabled,
            "no tracks",
        )))
        .unwrap();

        let view = JobStatusView::from(&job);
        assert_eq!(view.state, JobState::Failed);
        assert_eq!(view.error_kind, Some(ErrorKind::CaptionsDisabled));
        assert_eq!(view.error_message.as_deref(), Some("no tracks"));
        assert!(view.available_formats.is_empty());
        assert!(view.completed_at.is_some());
    }

    #[test]
    fn test_filter() {
        let job = Job::new(
            VideoId::parse("dQw4w9WgXcQ").unwrap(),
            LanguagePreference::default(),
            [ExportFormat::PlainText].into_iter().collect(),
            None,
        );
        assert!(JobFilter::default().matches(&job));
        assert!(JobFilter::state(JobState::Queued).matches(&job));
        assert!(!JobFilter::state(JobState::Completed).matches(&job));
    }
}
