//! Shared helpers for router-server integration tests: a full in-process server bound to an
//! ephemeral port, and a config document exercising the routing and caching paths.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use router_core::cache::CacheOptions;
use router_core::metrics::prometheus::PrometheusMetrics;
use router_core::{Config, EmbeddingClient, MetricsSink, SemanticCache};
use router_server::{AppState, ServerConfig};

pub const CONFIG_DOC: &str = r#"
embed_model:
  model_id: stub
  threshold: 0.55
  use_cpu: true
default_model: gpt-default
semantic_cache:
  enabled: true
  similarity_threshold: 0.85
  max_entries: 64
  ttl_seconds: 0
categories:
  - name: physics
    description: physics questions
    model: physics-model
    tasks:
      - name: explain
        description: explain a physics concept
        typical_prompt: "Answer like a physicist explaining concepts clearly and precisely"
"#;

/// Binds two ephemeral listeners, hands them back, then drops them so `router_server::run` can
/// rebind the same addresses. Small race in theory; acceptable for a single-process test.
pub async fn reserve_addr_pair() -> (SocketAddr, SocketAddr) {
    let grpc = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind grpc probe listener");
    let grpc_addr = grpc.local_addr().expect("grpc local addr");
    drop(grpc);

    let http = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http probe listener");
    let http_addr = http.local_addr().expect("http local addr");
    drop(http);

    (grpc_addr, http_addr)
}

/// Spawns a full router-server instance (ext_proc gRPC + observability HTTP) against a stub
/// embedder, and returns its bound addresses once it is accepting connections.
pub async fn spawn_server() -> (SocketAddr, SocketAddr) {
    let config = Arc::new(Config::from_yaml_str(CONFIG_DOC).expect("valid config"));
    let embedder = Arc::new(EmbeddingClient::init("stub", true).expect("stub embedder"));
    let cache = Arc::new(SemanticCache::new(CacheOptions {
        enabled: config.semantic_cache.enabled,
        similarity_threshold: config.semantic_cache.similarity_threshold,
        max_entries: config.semantic_cache.max_entries,
        ttl: config.semantic_cache.ttl(),
    }));
    let prometheus_metrics = Arc::new(PrometheusMetrics::new());
    let metrics: Arc<dyn MetricsSink> = prometheus_metrics.clone();
    let app = AppState::new(config, embedder, cache, metrics);

    let (grpc_addr, http_addr) = reserve_addr_pair().await;

    tokio::spawn(async move {
        router_server::run(
            ServerConfig {
                ext_proc_addr: grpc_addr,
                http_addr,
            },
            app,
            prometheus_metrics,
        )
        .await
        .expect("server exited with an error");
    });

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(http_addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    (grpc_addr, http_addr)
}
