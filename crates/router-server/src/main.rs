//! Router server entrypoint: an external-processor gRPC service plus an ambient HTTP surface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mimalloc::MiMalloc;

use router_core::cache::CacheOptions;
use router_core::metrics::prometheus::PrometheusMetrics;
use router_core::{Config, EmbeddingClient, MetricsSink, SemanticCache};

use router_server::{AppState, ServerConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Inline LLM request router: an ext_proc filter that embeds, routes, and semantically caches
/// chat completion requests.
#[derive(Parser, Debug)]
#[command(name = "router-server", version)]
struct Args {
    /// Path to the YAML routing/config document.
    #[arg(long)]
    config: PathBuf,

    /// Address to bind the ext_proc gRPC listener on.
    #[arg(long, default_value = "0.0.0.0:50051")]
    grpc_addr: SocketAddr,

    /// Address to bind the ambient /healthz and /metrics HTTP listener on.
    #[arg(long, default_value = "0.0.0.0:9090")]
    http_addr: SocketAddr,

    /// Runs a one-shot health check against a running instance's /healthz and exits.
    #[arg(long)]
    health_check: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

/// Log output format selected by `--log-format`.
#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    /// Human-readable text, the default.
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.health_check {
        std::process::exit(run_health_check(args.http_addr));
    }

    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match args.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
    }

    let config = Config::load(&args.config)?;
    tracing::info!(
        default_model = %config.default_model,
        embed_model = %config.embed_model.model_id,
        tasks = config.task_descriptions().len(),
        "router configuration loaded"
    );

    let embedder = Arc::new(EmbeddingClient::init(
        &config.embed_model.model_id,
        config.embed_model.use_cpu,
    )?);

    let cache = Arc::new(SemanticCache::new(CacheOptions {
        enabled: config.semantic_cache.enabled,
        similarity_threshold: config.semantic_cache.similarity_threshold,
        max_entries: config.semantic_cache.max_entries,
        ttl: config.semantic_cache.ttl(),
    }));

    let prometheus_metrics = Arc::new(PrometheusMetrics::new());
    let metrics: Arc<dyn MetricsSink> = prometheus_metrics.clone();

    let config = Arc::new(config);
    let app = AppState::new(config, embedder, cache, metrics);

    router_server::run(
        ServerConfig {
            ext_proc_addr: args.grpc_addr,
            http_addr: args.http_addr,
        },
        app,
        prometheus_metrics,
    )
    .await?;

    tracing::info!("router-server shutdown complete");
    Ok(())
}

fn run_health_check(http_addr: SocketAddr) -> i32 {
    let url = format!("http://{http_addr}/healthz");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}
