//! Versioned JSON transcript record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ytx_models::{CaptionSegment, ExportFormat, Transcript, VideoId};

use crate::error::{RecordError, RenderError, RenderResult};
use crate::options::StructuredOptions;

/// Current record layout version. Bump on any incompatible change.
pub const SCHEMA_VERSION: u32 = 1;

/// Serialized form of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredRecord {
    pub schema_version: u32,
    pub metadata: RecordMetadata,
    pub segments: Vec<CaptionSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecordMetadata {
    pub video_id: VideoId,
    pub language: String,
    pub is_auto_generated: bool,
    /// Retrieval time of the underlying captions
    pub generated_at: DateTime<Utc>,
    pub segment_count: usize,
    pub word_count: usize,
    pub duration_ms: u64,
    /// Hex SHA-256 of the full transcript text
    pub content_hash: String,
}

impl StructuredRecord {
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let full_text = transcript.full_text();
        Self {
            schema_version: SCHEMA_VERSION,
            metadata: RecordMetadata {
                video_id: transcript.video_id.clone(),
                language: transcript.language_code.clone(),
                is_auto_generated: transcript.is_auto_generated,
                generated_at: transcript.retrieved_at,
                segment_count: transcript.segments.len(),
                word_count: transcript.word_count(),
                duration_ms: transcript.duration().as_millis() as u64,
                content_hash: content_hash(&full_text),
            },
            segments: transcript.segments.clone(),
        }
    }

    /// Rebuild the transcript this record was rendered from.
    pub fn into_transcript(self) -> Transcript {
        Transcript {
            video_id: self.metadata.video_id,
            language_code: self.metadata.language,
            is_auto_generated: self.metadata.is_auto_generated,
            retrieved_at: self.metadata.generated_at,
            segments: self.segments,
        }
    }

    /// Parse a record, rejecting versions newer than this build understands.
    pub fn parse(bytes: &[u8]) -> Result<Self, RecordError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let version = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or(RecordError::MissingVersion)?;
        if version > u64::from(SCHEMA_VERSION) {
            return Err(RecordError::Incompatible {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the stored hash matches the segment text.
    pub fn verify_hash(&self) -> bool {
        let text = self.clone().into_transcript().full_text();
        content_hash(&text) == self.metadata.content_hash
    }

    /// JSON schema of the record layout.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StructuredRecord)
    }
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Render a transcript as a JSON record.
pub fn render(transcript: &Transcript, options: &StructuredOptions) -> RenderResult<Vec<u8>> {
    let record = StructuredRecord::from_transcript(transcript);
    let encoded = if options.pretty {
        serde_json::to_vec_pretty(&record)
    } else {
        serde_json::to_vec(&record)
    };
    encoded.map_err(|e| RenderError::new(ExportFormat::StructuredRecord, e.to_string()))
}
