//! Prometheus-backed [`MetricsSink`] implementation.

use prometheus::{CounterVec, HistogramVec, Opts, Registry};
use tracing::warn;

use super::MetricsSink;

/// Counters and histograms registered against a single [`Registry`], exposed for scraping via
/// the server's `/metrics` endpoint.
pub struct PrometheusMetrics {
    registry: Registry,
    requests_total: CounterVec,
    routing_changes_total: CounterVec,
    routing_latency_seconds: HistogramVec,
    completion_latency_seconds: HistogramVec,
    prompt_tokens_total: CounterVec,
    completion_tokens_total: CounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("router_model_requests_total", "Chat requests seen per model"),
            &["model"],
        )
        .expect("valid metric definition");
        let routing_changes_total = CounterVec::new(
            Opts::new(
                "router_model_routing_changes_total",
                "Requests whose model was changed by routing",
            ),
            &["from_model", "to_model"],
        )
        .expect("valid metric definition");
        let routing_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "router_routing_latency_seconds",
                "Time spent making a routing decision",
            ),
            &[],
        )
        .expect("valid metric definition");
        let completion_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "router_completion_latency_seconds",
                "End-to-end latency from request start to response completion, per model",
            ),
            &["model"],
        )
        .expect("valid metric definition");
        let prompt_tokens_total = CounterVec::new(
            Opts::new("router_prompt_tokens_total", "Prompt tokens consumed per model"),
            &["model"],
        )
        .expect("valid metric definition");
        let completion_tokens_total = CounterVec::new(
            Opts::new(
                "router_completion_tokens_total",
                "Completion tokens produced per model",
            ),
            &["model"],
        )
        .expect("valid metric definition");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(routing_changes_total.clone()),
            Box::new(routing_latency_seconds.clone()),
            Box::new(completion_latency_seconds.clone()),
            Box::new(prompt_tokens_total.clone()),
            Box::new(completion_tokens_total.clone()),
        ] {
            if let Err(err) = registry.register(collector) {
                warn!(error = %err, "failed to register metrics collector");
            }
        }

        Self {
            registry,
            requests_total,
            routing_changes_total,
            routing_latency_seconds,
            completion_latency_seconds,
            prompt_tokens_total,
            completion_tokens_total,
        }
    }

    /// The backing registry, for the server's `/metrics` HTTP handler to encode.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_model_request(&self, model: &str) {
        self.requests_total.with_label_values(&[model]).inc();
    }

    fn record_model_routing(&self, from_model: &str, to_model: &str) {
        self.routing_changes_total
            .with_label_values(&[from_model, to_model])
            .inc();
    }

    fn record_model_routing_latency(&self, seconds: f64) {
        self.routing_latency_seconds
            .with_label_values(&[])
            .observe(seconds);
    }

    fn record_model_completion_latency(&self, model: &str, seconds: f64) {
        self.completion_latency_seconds
            .with_label_values(&[model])
            .observe(seconds);
    }

    fn record_model_tokens(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens_total
            .with_label_values(&[model])
            .inc_by(prompt_tokens as f64);
        self.completion_tokens_total
            .with_label_values(&[model])
            .inc_by(completion_tokens as f64);
    }
}
