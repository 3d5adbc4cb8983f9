//! Fire-and-forget observability counters. Every method is non-blocking and must never fail
//! observably: a metrics backend error is logged and swallowed, never propagated to a caller on
//! the request path.

pub mod prometheus;


/// Abstract sink for the router's observability counters.
pub trait MetricsSink: Send + Sync {
    fn record_model_request(&self, model: &str);
    fn record_model_routing(&self, from_model: &str, to_model: &str);
    fn record_model_routing_latency(&self, seconds: f64);
    fn record_model_completion_latency(&self, model: &str, seconds: f64);
    fn record_model_tokens(&self, model: &str, prompt_tokens: u64, completion_tokens: u64);
}

/// A sink that discards every observation. Used in tests and wherever metrics collection is
/// intentionally disabled.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_model_request(&self, _model: &str) {}
    fn record_model_routing(&self, _from_model: &str, _to_model: &str) {}
    fn record_model_routing_latency(&self, _seconds: f64) {}
    fn record_model_completion_latency(&self, _model: &str, _seconds: f64) {}
    fn record_model_tokens(&self, _model: &str, _prompt_tokens: u64, _completion_tokens: u64) {}
}
