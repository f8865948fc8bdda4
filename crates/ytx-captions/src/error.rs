//! Caption retrieval error types.

use thiserror::Error;
use ytx_models::ErrorKind;

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("Captions are disabled for video {0}")]
    CaptionsDisabled(String),

    #[error("No caption track matches languages [{requested}] (available: [{available}])")]
    NoMatchingLanguage { requested: String, available: String },

    /// The source no longer has a track it advertised.
    #[error("Caption track '{0}' not found")]
    TrackNotFound(String),

    #[error("Upstream caption service error: {0}")]
    Upstream(String),

    #[error("Invalid caption payload: {0}")]
    InvalidPayload(String),
}

impl FetchError {
    pub fn video_unavailable(msg: impl Into<String>) -> Self {
        Self::VideoUnavailable(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Check if error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Upstream(_))
    }

    /// Classification recorded on the owning job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::VideoUnavailable(_) => ErrorKind::VideoUnavailable,
            FetchError::CaptionsDisabled(_) => ErrorKind::CaptionsDisabled,
            FetchError::NoMatchingLanguage { .. } | FetchError::TrackNotFound(_) => {
                ErrorKind::NoMatchingLanguage
            }
            FetchError::Upstream(_) | FetchError::InvalidPayload(_) => ErrorKind::UpstreamError,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Upstream(e.to_string())
    }
}
