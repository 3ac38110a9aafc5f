//! Pool metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vstream_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vstream_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vstream_jobs_failed_total";
    pub const WORKERS_BUSY: &str = "vstream_workers_busy";
    pub const ENCODE_DURATION_SECONDS: &str = "vstream_encode_duration_seconds";
}

/// Record a job taken by a worker.
pub fn record_job_started(encode_type: &str) {
    let labels = [("type", encode_type.to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

/// Record job completed.
pub fn record_job_completed(encode_type: &str) {
    let labels = [("type", encode_type.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record job failed.
pub fn record_job_failed(encode_type: &str, reason: &str) {
    let labels = [("type", encode_type.to_string()), ("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record strategy call duration.
pub fn record_encode_duration(encode_type: &str, duration_secs: f64) {
    let labels = [("type", encode_type.to_string())];
    histogram!(names::ENCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update the number of busy workers.
pub fn set_workers_busy(count: usize) {
    gauge!(names::WORKERS_BUSY).set(count as f64);
}
