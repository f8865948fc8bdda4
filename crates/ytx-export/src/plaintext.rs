//! Plain text renderer.

use ytx_models::timestamp::format_hms;
use ytx_models::Transcript;

use crate::options::PlainTextOptions;

/// Segment texts joined by the configured separator.
///
/// Blank segments are skipped so a separator never appears twice in a row.
pub fn render(transcript: &Transcript, options: &PlainTextOptions) -> Vec<u8> {
    let lines: Vec<String> = transcript
        .segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            if options.include_timestamps {
                format!("[{}] {}", format_hms(s.start()), s.text.trim())
            } else {
                s.text.trim().to_string()
            }
        })
        .collect();

    lines.join(&options.separator).into_bytes()
}
