//! Gateway metrics collection.
//!
//! Provides standardized metrics for monitoring ad platform calls:
//! - Request counters by operation and status
//! - Latency histograms
//! - Transport and soft-error retry counters
//! - Pagination page counters

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total API requests by operation and HTTP status.
    pub const REQUESTS_TOTAL: &str = "direct_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "direct_latency_seconds";

    /// HTTP-level retries (network failures, retryable statuses) by operation.
    pub const TRANSPORT_RETRIES_TOTAL: &str = "direct_transport_retries_total";

    /// In-band soft-error retries by operation and error code.
    pub const SOFT_RETRIES_TOTAL: &str = "direct_soft_retries_total";

    /// Follow-up pages requested through pagination cursors.
    pub const PAGES_TOTAL: &str = "direct_pages_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed API request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record an HTTP-level retry.
pub fn record_transport_retry(operation: &str) {
    counter!(
        names::TRANSPORT_RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a soft-error retry.
pub fn record_soft_retry(operation: &str, code: i64) {
    counter!(
        names::SOFT_RETRIES_TOTAL,
        "operation" => operation.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
}

/// Record a follow-up page request.
pub fn record_page(operation: &str) {
    counter!(
        names::PAGES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::TRANSPORT_RETRIES_TOTAL.contains("retries"));
        assert!(names::SOFT_RETRIES_TOTAL.contains("retries"));
        assert!(names::PAGES_TOTAL.contains("pages"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("keywordbids.get", 200, 12.0);
        record_transport_retry("keywordbids.get");
        record_soft_retry("keywordbids.get", 52);
        record_page("keywordbids.get");
    }
}
