//! Caption tracks, segments and language preferences.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::VideoId;

/// Wildcard entry in a language preference list.
pub const LANGUAGE_WILDCARD: &str = "*";

/// Fallback chain used when a request lists no languages.
pub const DEFAULT_LANGUAGES: &[&str] = &["en", "en-US", "en-GB"];

/// Whether `code` looks like a language tag (`en`, `pt-BR`, `zh-Hant`) or
/// is the wildcard.
pub fn is_valid_language_code(code: &str) -> bool {
    if code == LANGUAGE_WILDCARD {
        return true;
    }
    let mut parts = code.split(&['-', '_'][..]);
    let primary_ok = parts
        .next()
        .map_or(false, |p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    primary_ok
        && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// A single timed caption line.
///
/// Offsets are whole milliseconds so that serialized records round-trip
/// exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    /// Offset from the start of the video
    pub start_ms: u64,
    /// How long the caption is displayed
    pub duration_ms: u64,
    /// Caption text
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start_ms: u64, duration_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            duration_ms,
            text: text.into(),
        }
    }

    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }
}

/// A caption track advertised for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AvailableTrack {
    /// BCP-47-ish language code (e.g. `en`, `en-US`)
    pub language_code: String,
    /// Human-readable language name, if the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    /// Whether the track was produced by speech recognition
    #[serde(default)]
    pub is_auto_generated: bool,
}

impl AvailableTrack {
    pub fn human(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            language_name: None,
            is_auto_generated: false,
        }
    }

    pub fn auto(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            language_name: None,
            is_auto_generated: true,
        }
    }
}

/// Ordered language codes, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LanguagePreference(Vec<String>);

impl LanguagePreference {
    /// Build a preference list, dropping blanks and duplicates while keeping
    /// first-seen order.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            if !out.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                out.push(code.to_string());
            }
        }
        Self(out)
    }

    /// Preference list, falling back to `defaults` when `codes` is empty.
    pub fn or_default<S: AsRef<str>>(codes: &[S], defaults: &[S]) -> Self {
        let prefs = Self::new(codes);
        if prefs.is_empty() {
            Self::new(defaults)
        } else {
            prefs
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    /// Concrete codes, wildcard excluded.
    pub fn explicit_codes(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|c| *c != LANGUAGE_WILDCARD)
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(|c| c == LANGUAGE_WILDCARD)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES)
    }
}

/// A resolved caption track for one (video, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub video_id: VideoId,
    pub language_code: String,
    pub is_auto_generated: bool,
    /// When the captions were retrieved; used as the generation timestamp
    /// of every artifact rendered from this transcript.
    pub retrieved_at: DateTime<Utc>,
    pub segments: Vec<CaptionSegment>,
}

impl Transcript {
    /// Segment texts joined with single spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }

    /// Latest segment end; zero for an empty transcript.
    pub fn duration(&self) -> Duration {
        let end = self.segments.iter().map(CaptionSegment::end_ms).max().unwrap_or(0);
        Duration::from_millis(end)
    }
}
