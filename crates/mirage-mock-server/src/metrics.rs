//! Prometheus metrics for the mock server.
//!
//! Tracks request outcomes, registered expectations and persistence writes.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};

lazy_static! {
    /// Total number of requests processed
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_requests_total",
        "Total number of requests processed by the mock server",
        &["method", "outcome"]  // outcome: matched|unmatched|control|preflight
    )
    .unwrap();

    /// Expectations that can still match
    pub static ref ACTIVE_EXPECTATIONS: Gauge = register_gauge!(
        "mirage_active_expectations",
        "Number of registered expectations with remaining uses"
    )
    .unwrap();

    /// Persistence file writes
    pub static ref PERSISTENCE_SAVES_TOTAL: CounterVec = register_counter_vec!(
        "mirage_persistence_saves_total",
        "Total number of persisted-expectation file writes",
        &["result"]  // result: success|error
    )
    .unwrap();
}

/// Request outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    Unmatched,
    Control,
    Preflight,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Matched => "matched",
            Outcome::Unmatched => "unmatched",
            Outcome::Control => "control",
            Outcome::Preflight => "preflight",
        }
    }
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Method label; extension methods collapse to `OTHER` to bound cardinality.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

/// Helper to record request processing
pub fn record_request(method: &str, outcome: Outcome) {
    REQUESTS_TOTAL
        .with_label_values(&[method_label(method), outcome.as_str()])
        .inc();
}

pub fn set_active_expectations(count: usize) {
    ACTIVE_EXPECTATIONS.set(count as f64);
}

/// Helper to record a persistence write
pub fn record_persistence_save(success: bool) {
    PERSISTENCE_SAVES_TOTAL
        .with_label_values(&[if success { "success" } else { "error" }])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_exported_in_text_format() {
        record_request("GET", Outcome::Matched);
        record_persistence_save(true);
        set_active_expectations(3);

        let text = collect_metrics();
        assert!(text.contains("mirage_requests_total"));
        assert!(text.contains("mirage_persistence_saves_total"));
        assert!(text.contains("mirage_active_expectations"));
    }

    #[test]
    fn test_extension_methods_share_one_label() {
        assert_eq!(method_label("PATCH"), "PATCH");
        assert_eq!(method_label("PURGE"), "OTHER");
        assert_eq!(method_label("get"), "OTHER");

        record_request("X-RANDOM-1", Outcome::Unmatched);
        record_request("X-RANDOM-2", Outcome::Unmatched);
        let text = collect_metrics();
        assert!(!text.contains("X-RANDOM"));
        assert!(text.contains("method=\"OTHER\""));
    }
}
