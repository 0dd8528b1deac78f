//! Replicated append-only log node.
//!
//! Role (`WORK_MODE`) and log prefix (`APP_NAME`) come from the process
//! environment; cluster topology comes from `config.yml`. There is no
//! leader election or cluster-join subcommand here — role is fixed for
//! the lifetime of the process, per the system this implements.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use replicatedlog::api::HttpServer;
use replicatedlog::config::Config;
use replicatedlog::coordinator::NodeCoordinator;
use replicatedlog::error::Result;

#[derive(Parser)]
#[command(name = "replicatedlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cluster configuration file.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Address to bind the HTTP API to.
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    bind_address: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = Config::load(&cli.config)?;

    // Root span so every downstream event carries app_name/work_mode.
    let span = tracing::info_span!("node", app_name = %config.app_name, work_mode = %config.work_mode);

    async move {
        tracing::info!("loaded configuration");

        let client = reqwest::Client::new();
        let node = Arc::new(NodeCoordinator::from_config(&config, client.clone()));
        node.start(client, config.heartbeat_interval()).await;

        let server = HttpServer::new(node.clone(), cli.bind_address.clone());
        tracing::info!(address = %cli.bind_address, "starting HTTP API");

        tokio::select! {
            result = server.start() => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "HTTP server exited with an error");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
            }
        }

        node.shutdown().await;
        Ok(())
    }
    .instrument(span)
    .await
}

fn init_logging(level: &str) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
