//! Job definitions and the lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{ErrorInfo, ErrorKind, ExportFormat, LanguagePreference, VideoId};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// ```text
/// Queued ──► Running ──► Completed
///   │           │
///   │           └──────► Failed
///   └──(cancelled)─────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker
    #[default]
    Queued,
    /// A worker is fetching and rendering
    Running,
    /// Every requested artifact is stored
    Completed,
    /// Terminal failure, see the job's error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactRef {
    pub format: ExportFormat,
    /// Opaque location understood by the storage backend that produced it
    pub location: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// A requested state change.
#[derive(Debug, Clone)]
pub enum JobTransition {
    Start,
    Complete {
        language_used: String,
        artifacts: BTreeMap<ExportFormat, ArtifactRef>,
    },
    Fail(ErrorInfo),
}

impl JobTransition {
    pub fn target(&self) -> JobState {
        match self {
            JobTransition::Start => JobState::Running,
            JobTransition::Complete { .. } => JobState::Completed,
            JobTransition::Fail(_) => JobState::Failed,
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Illegal transition {from} -> {to}")]
    Illegal { from: JobState, to: JobState },

    #[error("Completion is missing artifacts for {0:?}")]
    MissingArtifacts(Vec<ExportFormat>),
}

/// A transcript export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub video_id: VideoId,
    pub requested_languages: LanguagePreference,
    pub requested_formats: BTreeSet<ExportFormat>,
    /// Base name for artifacts, already sanitised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub state: JobState,
    /// Every state the job has been in, oldest first
    pub history: Vec<JobState>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Language of the caption track actually used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_used: Option<String>,
    #[serde(default)]
    pub artifacts: BTreeMap<ExportFormat, ArtifactRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub cancel_requested: bool,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        video_id: VideoId,
        requested_languages: LanguagePreference,
        requested_formats: BTreeSet<ExportFormat>,
        custom_name: Option<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            video_id,
            requested_languages,
            requested_formats,
            custom_name,
            state: JobState::Queued,
            history: vec![JobState::Queued],
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            language_used: None,
            artifacts: BTreeMap::new(),
            error: None,
            cancel_requested: false,
        }
    }

    /// Check a transition against the legal-transition table without applying it.
    pub fn check(&self, transition: &JobTransition) -> Result<(), TransitionError> {
        let to = transition.target();
        let legal = match (self.state, transition) {
            (JobState::Queued, JobTransition::Start) => true,
            (JobState::Running, JobTransition::Complete { .. }) => true,
            (JobState::Running, JobTransition::Fail(_)) => true,
            // A job that never ran may only fail by cancellation.
            (JobState::Queued, JobTransition::Fail(info)) => info.kind == ErrorKind::Cancelled,
            _ => false,
        };
        if !legal {
            return Err(TransitionError::Illegal {
                from: self.state,
                to,
            });
        }

        if let JobTransition::Complete { artifacts, .. } = transition {
            let missing: Vec<ExportFormat> = self
                .requested_formats
                .iter()
                .filter(|f| !artifacts.contains_key(f))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(TransitionError::MissingArtifacts(missing));
            }
        }

        Ok(())
    }

    /// Apply a transition, enforcing the legal-transition table.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), TransitionError> {
        self.check(&transition)?;

        let to = transition.target();
        let now = Utc::now();
        match transition {
            JobTransition::Start => {
                self.started_at = Some(now);
            }
            JobTransition::Complete {
                language_used,
                artifacts,
            } => {
                self.language_used = Some(language_used);
                self.artifacts = artifacts;
                self.completed_at = Some(now);
            }
            JobTransition::Fail(info) => {
                self.error = Some(info);
                self.completed_at = Some(now);
            }
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Total bytes held by this job's artifacts.
    pub fn artifact_bytes(&self) -> u64 {
        self.artifacts.values().map(|a| a.size_bytes).sum()
    }

    /// Base name for artifact files.
    pub fn artifact_base_name(&self) -> String {
        self.custom_name
            .clone()
            .unwrap_or_else(|| format!("{}_transcript", self.video_id))
    }

    /// Timestamp retention age is measured from.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(formats: &[ExportFormat]) -> Job {
        Job::new(
            VideoId::parse("dQw4w9WgXcQ").unwrap(),
            LanguagePreference::new(["en"]),
            formats.iter().copied().collect(),
            None,
        )
    }

    fn artifact(format: ExportFormat) -> ArtifactRef {
        ArtifactRef {
            format,
            location: format!("a.{}", format.extension()),
            size_bytes: 10,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut job = job(&[ExportFormat::PlainText]);
        job.apply(JobTransition::Start).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert!(job.started_at.is_some());

        let artifacts = [(ExportFormat::PlainText, artifact(ExportFormat::PlainText))]
            .into_iter()
            .collect();
        job.apply(JobTransition::Complete {
            language_used: "en".into(),
            artifacts,
        })
        .unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(
            job.history,
            vec![JobState::Queued, JobState::Running, JobState::Completed]
        );
        assert_eq!(job.artifact_bytes(), 10);
    }

    #[test]
    fn test_queued_cannot_fail_except_cancel() {
        let mut job = job(&[ExportFormat::PlainText]);
        let err = job
            .apply(JobTransition::Fail(ErrorInfo::new(ErrorKind::UpstreamError, "x")))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: JobState::Queued,
                to: JobState::Failed
            }
        );

        job.apply(JobTransition::Fail(ErrorInfo::cancelled())).unwrap();
        assert_eq!(job.history, vec![JobState::Queued, JobState::Failed]);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job(&[ExportFormat::PlainText]);
        job.apply(JobTransition::Start).unwrap();
        job.apply(JobTransition::Fail(ErrorInfo::new(ErrorKind::RenderError, "x")))
            .unwrap();

        assert!(job.apply(JobTransition::Start).is_err());
        assert!(job
            .apply(JobTransition::Fail(ErrorInfo::cancelled()))
            .is_err());
        assert_eq!(job.history.len(), 3);
    }

    #[test]
    fn test_complete_requires_every_format() {
        let mut job = job(&[ExportFormat::PlainText, ExportFormat::Document]);
        job.apply(JobTransition::Start).unwrap();

        let artifacts = [(ExportFormat::PlainText, artifact(ExportFormat::PlainText))]
            .into_iter()
            .collect();
        let err = job
            .apply(JobTransition::Complete {
                language_used: "en".into(),
                artifacts,
            })
            .unwrap_err();
        assert_eq!(err, TransitionError::MissingArtifacts(vec![ExportFormat::Document]));
        assert_eq!(job.state, JobState::Running);
    }
}
