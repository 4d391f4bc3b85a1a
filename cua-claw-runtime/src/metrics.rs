//! Metrics instrumentation for runtime observability.

use std::time::Instant;

/// Record reasoning service request latency.
pub fn record_service_latency(duration_ms: f64) {
    metrics::histogram!("service_request_latency", duration_ms);
}

/// Record automation action latency.
pub fn record_action_latency(duration_ms: f64) {
    metrics::histogram!("action_latency", duration_ms);
}

/// Record the number of items sent in one request.
pub fn record_candidate_items(count: usize) {
    metrics::histogram!("candidate_items", count as f64);
}

/// Increment retry counter, labelled by fault kind.
pub fn increment_retry_count(kind: &'static str) {
    metrics::counter!("service_retry_count", 1, "kind" => kind);
}

/// Increment context widening counter.
pub fn increment_widening_count() {
    metrics::counter!("context_widening_count", 1);
}

/// Increment integrity fault counter.
pub fn increment_integrity_faults() {
    metrics::counter!("integrity_fault_count", 1);
}

/// RAII timer for automatic metric recording.
pub struct MetricTimer {
    start: Instant,
    metric_name: &'static str,
}

impl MetricTimer {
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        match self.metric_name {
            "service_request_latency" => record_service_latency(duration_ms),
            "action_latency" => record_action_latency(duration_ms),
            _ => {}
        }
    }
}
