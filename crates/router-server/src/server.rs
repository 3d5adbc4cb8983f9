//! Server shell: binds the ext_proc gRPC listener and the ambient HTTP listener, starts the
//! cache's background TTL sweep, and serves until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use router_core::SemanticCache;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;

use crate::extproc::RouterExtProcService;
use crate::pb::external_processor_server::ExternalProcessorServer;
use crate::state::AppState;

const CACHE_SWEEP_INTERVAL_SECS: u64 = 30;

pub struct ServerConfig {
    pub ext_proc_addr: SocketAddr,
    pub http_addr: SocketAddr,
}

pub async fn run(
    config: ServerConfig,
    app: AppState,
    metrics_for_http: Arc<router_core::metrics::prometheus::PrometheusMetrics>,
) -> anyhow::Result<()> {
    spawn_cache_sweeper(app.cache.clone());

    let http_router = crate::observability::router(metrics_for_http);
    let http_listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind http listener on {}", config.http_addr))?;
    info!(addr = %config.http_addr, "observability http listener bound");

    let ext_proc_service = RouterExtProcService::new(app);

    info!(addr = %config.ext_proc_addr, "ext_proc grpc listener bound");

    let http_server = axum::serve(http_listener, http_router).with_graceful_shutdown(shutdown_signal());

    let grpc_server = Server::builder()
        .add_service(ExternalProcessorServer::new(ext_proc_service))
        .serve_with_shutdown(config.ext_proc_addr, shutdown_signal());

    let (http_result, grpc_result) = tokio::join!(http_server, grpc_server);
    http_result.context("observability http server failed")?;
    grpc_result.context("ext_proc grpc server failed")?;

    Ok(())
}

fn spawn_cache_sweeper(cache: Arc<SemanticCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let removed = cache.sweep_expired();
            if removed > 0 {
                info!(removed, "cache sweep removed expired entries");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received sigterm, shutting down"),
    }
}
