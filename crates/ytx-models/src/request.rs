//! Typed inbound requests and the quick-transcript response.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ExportFormat, VideoId};

/// Request to create a transcript export job.
///
/// Deserialization only checks shape. Unusable values such as a bad video
/// reference or an empty format set are rejected when the job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptRequest {
    /// Watch/short/embed URL or bare video id
    pub url_or_id: String,
    /// Preferred languages, most preferred first; empty means the default chain
    #[serde(default)]
    pub languages: Vec<String>,
    /// Formats to produce
    pub formats: BTreeSet<ExportFormat>,
    /// Base file name (without extension) for the artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl TranscriptRequest {
    pub fn new(url_or_id: impl Into<String>) -> Self {
        Self {
            url_or_id: url_or_id.into(),
            languages: Vec::new(),
            formats: BTreeSet::new(),
            custom_name: None,
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.formats.insert(format);
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }
}

/// Request for the stateless quick path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuickTranscriptRequest {
    pub url_or_id: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Transcript text returned by the quick path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuickTranscript {
    pub video_id: VideoId,
    pub language: String,
    pub is_auto_generated: bool,
    pub text: String,
    pub word_count: usize,
    pub duration_seconds: f64,
}
