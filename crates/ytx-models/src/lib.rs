//! Shared data models for the ytx transcript export pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video references and their parsing
//! - Caption segments, transcripts and language preferences
//! - Export formats
//! - Jobs, artifacts and the lifecycle state machine
//! - The error taxonomy recorded on failed jobs

pub mod caption;
pub mod error;
pub mod export;
pub mod job;
pub mod job_status;
pub mod request;
pub mod timestamp;
pub mod utils;
pub mod video;

// Re-export common types
pub use caption::{
    is_valid_language_code, AvailableTrack, CaptionSegment, LanguagePreference, Transcript,
    DEFAULT_LANGUAGES, LANGUAGE_WILDCARD,
};
pub use error::{ErrorInfo, ErrorKind};
pub use export::ExportFormat;
pub use job::{ArtifactRef, Job, JobId, JobState, JobTransition, TransitionError};
pub use job_status::{JobFilter, JobStatusView};
pub use request::{QuickTranscript, QuickTranscriptRequest, TranscriptRequest};
pub use utils::{extract_video_id, sanitize_filename, VideoIdError, VideoIdResult};
pub use video::VideoId;
