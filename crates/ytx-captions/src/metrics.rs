//! Caption retrieval metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Upstream retry attempts by operation.
    pub const FETCH_RETRIES_TOTAL: &str = "ytx_caption_fetch_retries_total";

    /// Resolved transcripts by language and track kind.
    pub const TRANSCRIPTS_RESOLVED_TOTAL: &str = "ytx_transcripts_resolved_total";

    /// Failed resolutions by error kind.
    pub const RESOLVE_FAILURES_TOTAL: &str = "ytx_transcript_resolve_failures_total";
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::FETCH_RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a successful resolution.
pub fn record_resolved(language: &str, auto_generated: bool) {
    counter!(
        names::TRANSCRIPTS_RESOLVED_TOTAL,
        "language" => language.to_string(),
        "auto_generated" => auto_generated.to_string()
    )
    .increment(1);
}

/// Record a failed resolution.
pub fn record_failure(kind: &str) {
    counter!(
        names::RESOLVE_FAILURES_TOTAL,
        "kind" => kind.to_string()
    )
    .increment(1);
}
