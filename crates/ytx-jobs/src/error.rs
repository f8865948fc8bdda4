//! Job pipeline error types.

use std::time::Duration;

use thiserror::Error;
use ytx_captions::FetchError;
use ytx_export::RenderError;
use ytx_models::{ErrorInfo, ErrorKind, JobId, TransitionError, VideoIdError};
use ytx_storage::StorageError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid video reference: {0}")]
    InvalidVideoReference(#[from] VideoIdError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {job_id}: {source}")]
    InvalidStateTransition {
        job_id: JobId,
        #[source]
        source: TransitionError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{}", describe_render_failures(.0))]
    Render(Vec<RenderError>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job record persistence failed: {0}")]
    Persistence(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled by request")]
    Cancelled,

    #[error("Worker pool is not accepting jobs")]
    WorkerUnavailable,
}

fn describe_render_failures(errors: &[RenderError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl JobError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Classification recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::InvalidVideoReference(_) => ErrorKind::InvalidVideoReference,
            JobError::InvalidRequest(_) | JobError::NotFound(_) => ErrorKind::InvalidRequest,
            JobError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            JobError::Fetch(e) => e.kind(),
            JobError::Render(_) => ErrorKind::RenderError,
            JobError::Storage(_) | JobError::Persistence(_) => ErrorKind::StorageError,
            JobError::Timeout(_) | JobError::WorkerUnavailable => ErrorKind::UpstreamError,
            JobError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            JobError::Cancelled => ErrorInfo::cancelled(),
            other => ErrorInfo::new(other.kind(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytx_models::ExportFormat;

    #[test]
    fn test_kinds() {
        assert_eq!(
            JobError::from(FetchError::CaptionsDisabled("x".into())).kind(),
            ErrorKind::CaptionsDisabled
        );
        assert_eq!(
            JobError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::UpstreamError
        );
        assert_eq!(JobError::Cancelled.to_error_info().kind, ErrorKind::Cancelled);
    }

    #[test]
    fn test_render_message_names_every_format() {
        let err = JobError::Render(vec![
            RenderError::new(ExportFormat::Document, "bad glyph"),
            RenderError::new(ExportFormat::StructuredRecord, "boom"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("document"));
        assert!(msg.contains("structured_record"));
    }
}
