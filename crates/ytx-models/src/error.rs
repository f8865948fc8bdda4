//! Error taxonomy shared across the pipeline.
//!
//! Crate-level error enums carry the details; `ErrorKind` is the stable
//! classification recorded on failed jobs and exposed to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidVideoReference,
    InvalidRequest,
    VideoUnavailable,
    CaptionsDisabled,
    NoMatchingLanguage,
    UpstreamError,
    RenderError,
    StorageError,
    InvalidStateTransition,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidVideoReference => "invalid_video_reference",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::CaptionsDisabled => "captions_disabled",
            ErrorKind::NoMatchingLanguage => "no_matching_language",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::RenderError => "render_error",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Only transient upstream failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::UpstreamError)
    }

    /// Internal invariant violations, as opposed to user-facing failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorKind::InvalidStateTransition)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure recorded on a terminal job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Job was cancelled before completion")
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
