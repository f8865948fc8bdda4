//! Utility functions for video reference parsing and validation.
//!
//! Every supported URL form for the same video resolves to the same
//! 11-character id, so callers can key caches and jobs on it directly.

use thiserror::Error;
use url::Url;

/// Length of a platform video id.
pub const VIDEO_ID_LEN: usize = 11;

/// Hosts that serve the canonical `watch?v=` and path-based forms.
const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
];

/// Path prefixes that carry the id as the following segment.
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

/// Errors that can occur during video id extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoIdError {
    /// Input was empty or whitespace
    #[error("Video reference is empty")]
    Empty,
    /// Input is a URL but not on a recognised video host
    #[error("Unsupported video host: {0}")]
    UnsupportedHost(String),
    /// Input could not be parsed as a URL at all
    #[error("Malformed video URL: {0}")]
    MalformedUrl(String),
    /// Host recognised but no id found in the path or query
    #[error("Video ID not found in URL")]
    VideoIdNotFound,
    /// Extracted id fails the length/charset check
    #[error("Video ID has invalid format: {0}")]
    InvalidVideoId(String),
}

/// Result type for video id extraction.
pub type VideoIdResult<T> = Result<T, VideoIdError>;

/// Extract a video id from a URL or bare id.
///
/// Supported forms:
/// - `https://www.youtube.com/watch?v=VIDEO_ID`
/// - `https://m.youtube.com/watch?v=VIDEO_ID`
/// - `https://youtu.be/VIDEO_ID`
/// - `https://www.youtube.com/embed/VIDEO_ID` (also `/v/`, `/shorts/`, `/live/`)
/// - `VIDEO_ID`
///
/// Scheme is optional; query strings and fragments are ignored.
pub fn extract_video_id(input: &str) -> VideoIdResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(VideoIdError::Empty);
    }

    if looks_like_bare_id(input) {
        return validate_video_id(input);
    }

    let url = parse_loose_url(input)?;
    let host = url
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| VideoIdError::MalformedUrl(input.to_string()))?;
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let candidate = if host == "youtu.be" {
        first_path_segment(&url)
    } else if WATCH_HOSTS.contains(&host) {
        extract_from_watch_host(&url)
    } else {
        return Err(VideoIdError::UnsupportedHost(host.to_string()));
    };

    match candidate {
        Some(id) => validate_video_id(&id),
        None => Err(VideoIdError::VideoIdNotFound),
    }
}

/// A bare id has no URL structure at all.
fn looks_like_bare_id(input: &str) -> bool {
    !input.contains('/') && !input.contains('.') && !input.contains(':')
}

fn parse_loose_url(input: &str) -> VideoIdResult<Url> {
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Url::parse(&with_scheme).map_err(|e| VideoIdError::MalformedUrl(e.to_string()))
}

fn first_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_from_watch_host(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    match segments.next() {
        Some("watch") => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
            segments.next().map(|s| s.to_string())
        }
        _ => None,
    }
}

/// Check if string contains only valid id characters.
fn is_valid_video_id_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate video id format and return it.
pub fn validate_video_id(id: &str) -> VideoIdResult<String> {
    let id = id.trim();
    if id.len() != VIDEO_ID_LEN || !is_valid_video_id_chars(id) {
        return Err(VideoIdError::InvalidVideoId(id.to_string()));
    }
    Ok(id.to_string())
}

/// Replace filesystem-hostile characters and clamp length.
pub fn sanitize_filename(name: &str) -> String {
    const DANGEROUS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let cleaned: String = name
        .chars()
        .map(|c| if DANGEROUS.contains(&c) || c.is_control() { '_' } else { c })
        .take(100)
        .collect();
    cleaned.trim().to_string()
}
