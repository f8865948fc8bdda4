//! Export error types.

use thiserror::Error;
use ytx_models::{ErrorKind, ExportFormat};

pub type RenderResult<T> = Result<T, RenderError>;

/// A renderer could not produce its payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to render {format}: {message}")]
pub struct RenderError {
    pub format: ExportFormat,
    pub message: String,
}

impl RenderError {
    pub fn new(format: ExportFormat, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RenderError
    }
}

/// A structured record could not be re-ingested.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Record has no schema_version")]
    MissingVersion,

    #[error("Record schema version {found} is newer than supported version {supported}")]
    Incompatible { found: u64, supported: u32 },
}
