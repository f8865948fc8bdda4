//! Export format definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Artifact format a job can produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Plain UTF-8 text
    PlainText,
    /// Paginated PDF document
    Document,
    /// Versioned JSON record
    StructuredRecord,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::PlainText,
        ExportFormat::Document,
        ExportFormat::StructuredRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "plain_text",
            ExportFormat::Document => "document",
            ExportFormat::StructuredRecord => "structured_record",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "txt",
            ExportFormat::Document => "pdf",
            ExportFormat::StructuredRecord => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    /// Accepts both the canonical names and the file extensions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain_text" | "text" | "txt" => Ok(ExportFormat::PlainText),
            "document" | "pdf" => Ok(ExportFormat::Document),
            "structured_record" | "json" => Ok(ExportFormat::StructuredRecord),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}
