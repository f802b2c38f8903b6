//! Metrics and observability utilities
//!
//! Provides Prometheus metric descriptions and recording helpers
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all DocChat metrics
pub const METRICS_PREFIX: &str = "docchat";

/// Buckets for inference latency (local models are slow; timeout is 120s)
pub const INFERENCE_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // timeout
];

/// Buckets for selected excerpt size in characters
pub const EXCERPT_BUCKETS: &[f64] = &[0.0, 250.0, 500.0, 1000.0, 1500.0, 2000.0, 2500.0, 3000.0];

/// Full name of a prefixed metric
pub fn metric_name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        metric_name("chat_requests_total"),
        Unit::Count,
        "Total chat requests by kind (text, document, image, context)"
    );

    describe_counter!(
        metric_name("inference_requests_total"),
        Unit::Count,
        "Total calls to the model server"
    );

    describe_histogram!(
        metric_name("inference_duration_seconds"),
        Unit::Seconds,
        "Model server latency in seconds"
    );

    describe_histogram!(
        metric_name("excerpt_chars"),
        Unit::Count,
        "Characters of document context injected into a prompt"
    );

    describe_counter!(
        metric_name("uploads_total"),
        Unit::Count,
        "Uploaded files by kind and outcome"
    );

    describe_gauge!(
        metric_name("conversations_active"),
        Unit::Count,
        "Conversation logs currently held in memory"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a chat request
pub fn record_chat(kind: &str) {
    counter!(metric_name("chat_requests_total"), "kind" => kind.to_string()).increment(1);
}

/// Helper to record a model server call
pub fn record_inference(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        metric_name("inference_requests_total"),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        metric_name("inference_duration_seconds"),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record the size of a selected excerpt
pub fn record_excerpt(chars: usize) {
    histogram!(metric_name("excerpt_chars")).record(chars as f64);
}

/// Helper to record an upload outcome
pub fn record_upload(kind: &str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };

    counter!(
        metric_name("uploads_total"),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to publish the number of live conversation logs
pub fn set_active_conversations(count: usize) {
    gauge!(metric_name("conversations_active")).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in INFERENCE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // The client timeout must land in the last bucket
        assert_eq!(INFERENCE_BUCKETS.last(), Some(&120.0));
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(metric_name("uploads_total"), "docchat_uploads_total");
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No global recorder installed: calls are no-ops and must not panic
        record_chat("text");
        record_inference(0.5, "mistral", true);
        record_excerpt(1200);
        record_upload("document", false);
        set_active_conversations(3);
    }
}
