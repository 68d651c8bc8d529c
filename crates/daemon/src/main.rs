//! ibed daemon binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use ibed_core::config::{AppConfig, LoggingConfig};
use ibed_engine::{MediaService, RankingEngine, spawn_refresh_task};
use ibed_metadata::{MetadataIndex, MetadataStore};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ibed - content-addressed media store
#[derive(Parser, Debug)]
#[command(name = "ibedd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "IBED_CONFIG", default_value = "config/ibed.toml")]
    config: String,
}

/// Load configuration from an optional TOML file, overridden by `IBED_`
/// environment variables (`IBED_KV__URL=...`).
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        figment = figment.merge(Toml::file(path));
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("IBED_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve once Ctrl-C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_tracing(&config.logging);

    tracing::info!("ibed v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loaded configuration from file");
    } else {
        tracing::info!(config_path = %args.config, "No config file found, using defaults and environment");
    }

    ibed_engine::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let content = ibed_storage::from_config(&config.storage)
        .await
        .context("failed to initialize content store")?;
    content
        .health_check()
        .await
        .context("content store health check failed")?;
    tracing::info!(backend = content.backend_name(), "Content store ready");

    let kv = ibed_metadata::from_config(&config.kv)
        .await
        .context("failed to initialize key-value backend")?;
    let metadata: Arc<dyn MetadataStore> =
        Arc::new(MetadataIndex::new(kv.clone(), config.retention.image_ttl()));
    metadata
        .health_check()
        .await
        .context("key-value backend health check failed")?;
    tracing::info!(backend = metadata.backend_name(), "Metadata index ready");

    let ranking = Arc::new(RankingEngine::new(kv));
    let service = MediaService::new(
        content,
        metadata,
        ranking.clone(),
        config.upload.max_upload_size,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = spawn_refresh_task(
        ranking,
        config.ranking.refresh_interval(),
        config.ranking.top_n,
        shutdown_rx,
    );
    tracing::info!(
        interval_secs = config.ranking.refresh_interval_secs,
        top_n = config.ranking.top_n,
        "Ranking refresh task spawned"
    );
    tracing::info!(
        content = service.content().backend_name(),
        metadata = service.metadata().backend_name(),
        "ibed ready"
    );

    shutdown_signal().await;
    tracing::info!("Shutting down");

    // The receiver may already be gone if the task panicked
    let _ = shutdown_tx.send(true);
    refresh.await.context("ranking refresh task failed")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
