//! Integration coverage for the ambient HTTP surface: liveness and Prometheus export.

mod common;

#[tokio::test]
async fn healthz_and_metrics_are_reachable_on_the_http_listener() {
    let (_grpc_addr, http_addr) = common::spawn_server().await;

    let client = reqwest::Client::new();

    let health = client
        .get(format!("http://{http_addr}/healthz"))
        .send()
        .await
        .expect("healthz request");
    assert!(health.status().is_success());
    assert_eq!(health.text().await.unwrap(), "ok");

    let metrics = client
        .get(format!("http://{http_addr}/metrics"))
        .send()
        .await
        .expect("metrics request");
    assert!(metrics.status().is_success());
    let body = metrics.text().await.unwrap();
    assert!(body.contains("router_model_requests_total"));
    assert!(body.contains("router_completion_latency_seconds"));
}
