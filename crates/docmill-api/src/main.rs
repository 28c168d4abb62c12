//! docmill-api — HTTP API server for the docmill conversion engine.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docmill_api::{app, AppState, EnvKeyProvider};
use docmill_core::tokenizer::tokenizer_from_env;
use docmill_engine::{
    standard_registry, ConversionWorker, MemoryJobStore, Orchestrator, OrchestratorConfig,
    RateLimiter, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "docmill_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docmill_api=debug,docmill_engine=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("docmill-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(docmill_core::defaults::SERVER_PORT);

    let orchestrator_config = OrchestratorConfig::from_env();
    let max_upload_bytes = orchestrator_config.max_upload_bytes;
    let worker_config = WorkerConfig::from_env();

    // Assemble the engine
    let extractor_registry = standard_registry();
    let extractor_health = extractor_registry.health_check_all().await;
    for (family, healthy) in &extractor_health {
        info!(extractor = %family, healthy = *healthy, "Extractor registered");
    }

    let tokenizer = tokenizer_from_env();
    info!(tokenizer = tokenizer.name(), "Tokenizer selected");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(extractor_registry),
        Arc::new(MemoryJobStore::new()),
        Arc::new(RateLimiter::new()),
        tokenizer,
        orchestrator_config,
    ));

    // Start the conversion worker for the async path
    info!(
        max_concurrent = worker_config.max_concurrent_jobs,
        enabled = worker_config.enabled,
        "Starting conversion worker"
    );
    let worker_handle = ConversionWorker::new(orchestrator.clone(), worker_config).start();

    // API key resolution (external collaborator; env-backed here)
    let keys = EnvKeyProvider::from_env();
    info!(
        configured_keys = keys.configured_keys(),
        "API key provider initialized"
    );

    let state = AppState {
        orchestrator,
        submitter: worker_handle.submitter(),
        keys: Arc::new(keys),
    };

    let router = app(state, max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, draining conversion worker");
    worker_handle.shutdown().await.ok();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal");
}
