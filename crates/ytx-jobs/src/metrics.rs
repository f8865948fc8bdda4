//! Job pipeline metrics.

use std::time::Duration;

use metrics::{counter, histogram};
use ytx_models::{ExportFormat, Job};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs accepted into the store.
    pub const JOBS_SUBMITTED_TOTAL: &str = "ytx_jobs_submitted_total";

    /// Jobs reaching a terminal state, by state and error kind.
    pub const JOBS_FINISHED_TOTAL: &str = "ytx_jobs_finished_total";

    /// Time from start to terminal state.
    pub const JOB_DURATION_SECONDS: &str = "ytx_job_duration_seconds";

    /// Bytes written to artifact storage, by format.
    pub const ARTIFACT_BYTES_TOTAL: &str = "ytx_artifact_bytes_total";

    /// Quick transcript requests, by outcome.
    pub const QUICK_REQUESTS_TOTAL: &str = "ytx_quick_requests_total";

    /// Jobs evicted by the retention sweeper, by reason.
    pub const SWEEP_EVICTIONS_TOTAL: &str = "ytx_sweep_evictions_total";
}

pub fn record_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_finished(job: &Job, elapsed: Duration) {
    let error_kind = job
        .error
        .as_ref()
        .map(|e| e.kind.as_str())
        .unwrap_or("none");
    counter!(
        names::JOBS_FINISHED_TOTAL,
        "state" => job.state.as_str(),
        "error_kind" => error_kind
    )
    .increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "state" => job.state.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_artifact(format: ExportFormat, bytes: u64) {
    counter!(names::ARTIFACT_BYTES_TOTAL, "format" => format.as_str()).increment(bytes);
}

pub fn record_quick(outcome: &'static str) {
    counter!(names::QUICK_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_eviction(reason: &'static str, count: u64) {
    if count > 0 {
        counter!(names::SWEEP_EVICTIONS_TOTAL, "reason" => reason).increment(count);
    }
}
