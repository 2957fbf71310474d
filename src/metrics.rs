//! Usage metrics for endpoints with lifecycle metadata.
//!
//! Prometheus counters and gauges recorded by the registry middleware.

use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Metrics collector for deprecated endpoint usage.
#[derive(Clone)]
pub struct LifecycleMetrics {
    registry: Registry,

    /// Counter for requests to endpoints with lifecycle metadata
    pub requests_total: IntCounterVec,

    /// Gauge for days until sunset for each endpoint
    pub days_until_sunset: IntGaugeVec,

    /// Histogram for request latency by endpoint
    pub request_duration_seconds: HistogramVec,
}

impl LifecycleMetrics {
    /// Create a new metrics collector with the given prefix.
    pub fn new(prefix: &str) -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                format!("{}_requests_total", prefix),
                "Total number of requests to endpoints with lifecycle metadata",
            ),
            &["endpoint_id", "path", "method"],
        )
        .expect("Failed to create requests_total metric");

        let days_until_sunset = IntGaugeVec::new(
            Opts::new(
                format!("{}_days_until_sunset", prefix),
                "Days until endpoint sunset (negative if past)",
            ),
            &["endpoint_id", "path"],
        )
        .expect("Failed to create days_until_sunset metric");

        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                format!("{}_request_duration_seconds", prefix),
                "Request duration for endpoints with lifecycle metadata",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["endpoint_id"],
        )
        .expect("Failed to create request_duration_seconds metric");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("Failed to register requests_total");
        registry
            .register(Box::new(days_until_sunset.clone()))
            .expect("Failed to register days_until_sunset");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("Failed to register request_duration_seconds");

        Self {
            registry,
            requests_total,
            days_until_sunset,
            request_duration_seconds,
        }
    }

    /// Record a request to a matched endpoint.
    pub fn record_request(&self, endpoint_id: &str, path: &str, method: &str) {
        self.requests_total
            .with_label_values(&[endpoint_id, path, method])
            .inc();
    }

    /// Update the days until sunset gauge.
    pub fn set_days_until_sunset(&self, endpoint_id: &str, path: &str, days: i64) {
        self.days_until_sunset
            .with_label_values(&[endpoint_id, path])
            .set(days);
    }

    /// Record request duration.
    pub fn observe_duration(&self, endpoint_id: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[endpoint_id])
            .observe(duration_secs);
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for LifecycleMetrics {
    fn default() -> Self {
        Self::new("api_lifecycle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = LifecycleMetrics::new("test");
        // Record a value to initialize the metric
        metrics.record_request("test-endpoint", "/test", "GET");
        assert!(!metrics.encode().is_empty());
    }

    #[test]
    fn test_record_request() {
        let metrics = LifecycleMetrics::new("test");
        metrics.record_request("legacy-api", "/api/v1/users", "GET");

        let output = metrics.encode();
        assert!(output.contains("test_requests_total"));
        assert!(output.contains("legacy-api"));
    }

    #[test]
    fn test_days_until_sunset() {
        let metrics = LifecycleMetrics::new("test");
        metrics.set_days_until_sunset("legacy-api", "/api/v1/users", 30);

        let output = metrics.encode();
        assert!(output.contains("test_days_until_sunset"));
        assert!(output.contains("30"));
    }

    #[test]
    fn test_observe_duration() {
        let metrics = LifecycleMetrics::new("test");
        metrics.observe_duration("legacy-api", 0.012);

        let output = metrics.encode();
        assert!(output.contains("test_request_duration_seconds"));
    }
}
