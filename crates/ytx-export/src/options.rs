//! Renderer options.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Options for every renderer, passed through unchanged by the job pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub plain_text: PlainTextOptions,
    #[serde(default)]
    pub document: DocumentOptions,
    #[serde(default)]
    pub structured: StructuredOptions,
}

impl ExportOptions {
    /// Create options from environment variables.
    pub fn from_env() -> Self {
        Self {
            document: DocumentOptions::from_env(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainTextOptions {
    /// Inserted between segments
    pub separator: String,
    /// Prefix each segment with `[HH:MM:SS]`
    pub include_timestamps: bool,
}

impl Default for PlainTextOptions {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            include_timestamps: false,
        }
    }
}

/// Page geometry and typography in PDF points (1/72 inch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub font_size: f32,
    /// Baseline-to-baseline distance
    pub leading: f32,
    /// Document title; defaults to `Transcript <video id>`
    pub title: Option<String>,
    /// Prefix each paragraph with `[HH:MM:SS]`
    pub include_timestamps: bool,
    /// TrueType face used for every style instead of the bundled fonts
    #[serde(skip)]
    pub font: Option<FontData>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        // A4 portrait, one-inch margins
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 72.0,
            font_size: 11.0,
            leading: 14.0,
            title: None,
            include_timestamps: false,
            font: None,
        }
    }
}

impl DocumentOptions {
    /// Create options from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let font_size: f32 = std::env::var("YTX_PDF_FONT_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.font_size);

        Self {
            margin: std::env::var("YTX_PDF_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.margin),
            // Keep the default 11/14 ratio when only the size is overridden.
            leading: font_size * defaults.leading / defaults.font_size,
            font_size,
            font: std::env::var("YTX_PDF_FONT").ok().and_then(|path| {
                std::fs::read(&path)
                    .map(FontData::new)
                    .map_err(|e| warn!("Ignoring YTX_PDF_FONT {}: {}", path, e))
                    .ok()
            }),
            ..defaults
        }
    }
}

/// Raw TrueType font file, shared between option clones.
#[derive(Clone, PartialEq)]
pub struct FontData(Arc<[u8]>);

impl FontData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontData({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredOptions {
    /// Indent the JSON output
    pub pretty: bool,
}

impl Default for StructuredOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}
