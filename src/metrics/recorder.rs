//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, CounterVec, Encoder, Histogram, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a token refresh with its outcome ("success" or "failure").
    fn record_token_refresh(&self, result: &str, duration_secs: f64);

    /// Records one upstream attempt against the primary or secondary host.
    fn record_upstream_attempt(&self, route: &str, target: &str, result: &str, duration_secs: f64);

    /// Records the status code returned to the proxy's caller.
    fn record_proxy_response(&self, route: &str, status: u16);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Token metrics
    token_refresh_total: CounterVec,
    token_refresh_duration_seconds: Histogram,

    // Upstream metrics
    upstream_requests_total: CounterVec,
    upstream_request_duration_seconds: HistogramVec,

    proxy_requests_total: CounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a fresh registry with all proxy metrics registered.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let token_refresh_total = register_counter_vec_with_registry!(
            Opts::new("token_refresh_total", "Total access token refreshes"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register token_refresh_total");

        let token_refresh_duration_seconds = register_histogram_with_registry!(
            "token_refresh_duration_seconds",
            "Token endpoint round-trip duration in seconds",
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register token_refresh_duration_seconds");

        let upstream_requests_total = register_counter_vec_with_registry!(
            Opts::new(
                "upstream_requests_total",
                "Total upstream attempts per route and host"
            ),
            &["route", "target", "result"],
            registry.clone()
        )
        .expect("Failed to register upstream_requests_total");

        let upstream_request_duration_seconds = register_histogram_vec_with_registry!(
            "upstream_request_duration_seconds",
            "Upstream attempt duration in seconds",
            &["route", "target"],
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register upstream_request_duration_seconds");

        let proxy_requests_total = register_counter_vec_with_registry!(
            Opts::new("proxy_requests_total", "Total proxied requests by status"),
            &["route", "status"],
            registry.clone()
        )
        .expect("Failed to register proxy_requests_total");

        Metrics {
            registry,
            token_refresh_total,
            token_refresh_duration_seconds,
            upstream_requests_total,
            upstream_request_duration_seconds,
            proxy_requests_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| format!("Metrics encoding produced invalid UTF-8: {}", e))
    }
}

impl MetricsRecorder for Metrics {
    fn record_token_refresh(&self, result: &str, duration_secs: f64) {
        self.token_refresh_total.with_label_values(&[result]).inc();
        self.token_refresh_duration_seconds.observe(duration_secs);
    }

    fn record_upstream_attempt(&self, route: &str, target: &str, result: &str, duration_secs: f64) {
        self.upstream_requests_total
            .with_label_values(&[route, target, result])
            .inc();
        self.upstream_request_duration_seconds
            .with_label_values(&[route, target])
            .observe(duration_secs);
    }

    fn record_proxy_response(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.proxy_requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();
    }
}
