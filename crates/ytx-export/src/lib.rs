//! Artifact rendering for resolved transcripts.
//!
//! Every renderer is a pure function of (transcript, options): no I/O, and
//! the same input always yields the same bytes.

pub mod document;
pub mod error;
pub mod options;
pub mod plaintext;
pub mod structured;

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use ytx_models::{ExportFormat, Transcript};

pub use error::{RecordError, RenderError, RenderResult};
pub use options::{DocumentOptions, ExportOptions, FontData, PlainTextOptions, StructuredOptions};
pub use structured::{RecordMetadata, StructuredRecord, SCHEMA_VERSION};

/// Renders transcripts with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct ArtifactExporter {
    options: ExportOptions,
}

impl ArtifactExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(ExportOptions::from_env())
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Render one format.
    pub fn render(&self, transcript: &Transcript, format: ExportFormat) -> RenderResult<Vec<u8>> {
        let bytes = match format {
            ExportFormat::PlainText => Ok(plaintext::render(transcript, &self.options.plain_text)),
            ExportFormat::Document => document::render(transcript, &self.options.document),
            ExportFormat::StructuredRecord => {
                structured::render(transcript, &self.options.structured)
            }
        }?;

        debug!(
            video_id = %transcript.video_id,
            format = %format,
            bytes = bytes.len(),
            "Rendered artifact"
        );
        Ok(bytes)
    }

    /// Render every format; one failure does not stop the others.
    pub fn render_all(
        &self,
        transcript: &Transcript,
        formats: &BTreeSet<ExportFormat>,
    ) -> BTreeMap<ExportFormat, RenderResult<Vec<u8>>> {
        formats
            .iter()
            .map(|format| (*format, self.render(transcript, *format)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ytx_models::{CaptionSegment, VideoId};

    fn transcript(text: &str) -> Transcript {
        Transcript {
            video_id: VideoId::parse("abc123XYZ90").unwrap(),
            language_code: "ja".into(),
            is_auto_generated: false,
            retrieved_at: Utc::now(),
            segments: vec![CaptionSegment::new(0, 1000, text)],
        }
    }

    #[test]
    fn test_render_all_isolates_failures() {
        let exporter = ArtifactExporter::default();
        let formats: BTreeSet<_> = ExportFormat::ALL.into_iter().collect();

        let results = exporter.render_all(&transcript("日本語"), &formats);

        assert_eq!(results.len(), 3);
        assert!(results[&ExportFormat::PlainText].is_ok());
        assert!(results[&ExportFormat::StructuredRecord].is_ok());
        let err = results[&ExportFormat::Document].as_ref().unwrap_err();
        assert_eq!(err.format, ExportFormat::Document);
    }

    #[test]
    fn test_every_format_is_idempotent() {
        let exporter = ArtifactExporter::default();
        let t = transcript("stable output");
        for format in ExportFormat::ALL {
            assert_eq!(
                exporter.render(&t, format).unwrap(),
                exporter.render(&t, format).unwrap(),
                "{} not idempotent",
                format
            );
        }
    }
}
