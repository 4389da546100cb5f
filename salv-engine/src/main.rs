//! salv-engine - Sales audit lifecycle scheduler daemon
//!
//! Runs the four background jobs (eligibility promotion, nightly recovery
//! sweep, follow-up escalation, liquidation sweep) against the shared
//! audit store. Single active instance assumed; there is no distributed
//! locking between instances.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use salv_common::config::EngineConfig;
use salv_engine::notify::{HttpNotificationGateway, LogOnlyGateway, NotificationGateway};
use salv_engine::Engine;

#[derive(Parser, Debug)]
#[command(name = "salv-engine", about = "Sales audit lifecycle scheduler daemon")]
struct Cli {
    /// Path to TOML config file (env: SALV_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting salv-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = EngineConfig::resolve(cli.config.as_deref())?;
    info!("Timezone: {}", config.timezone);
    info!("Database: {}", config.database_path.display());

    let db = salv_common::db::init_database(&config.database_path).await?;

    let gateway: Arc<dyn NotificationGateway> = match &config.notify_endpoint {
        Some(endpoint) => {
            info!("Notification endpoint: {}", endpoint);
            Arc::new(HttpNotificationGateway::new(endpoint.clone()))
        }
        None => {
            info!("No notification endpoint configured; dispatches will be logged only");
            Arc::new(LogOnlyGateway)
        }
    };

    let engine = Engine::new(db, gateway, config);
    let token = CancellationToken::new();
    let handles = engine.start_schedulers(&token)?;
    info!("Schedulers running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested; letting in-flight batches finish");
    token.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    info!("salv-engine stopped");
    Ok(())
}
