//! Ambient HTTP surface: `/healthz` liveness and `/metrics` Prometheus export. Kept separate
//! from the gRPC ext_proc port so a gateway's health checks never compete with processing
//! traffic.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Encoder, TextEncoder};
use router_core::metrics::prometheus::PrometheusMetrics;
use tower_http::trace::TraceLayer;

pub fn router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(move || metrics_handler(metrics.clone())))
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(metrics: Arc<PrometheusMetrics>) -> impl IntoResponse {
    let families = metrics.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
    }
    (StatusCode::OK, buffer)
}
