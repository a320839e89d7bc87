//! Caden sync client - Entry Point
//!
//! Keeps the watched wallet's position, holdings and the market in sync,
//! logs the derived figures and runs the liquidation monitor when a
//! keypair is configured.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use caden_client::{AppConfig, SyncClient};
use clap::Parser;
use tracing::{info, warn};

/// Session stats output interval.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Caden sync client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CADEN_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the log filter
    let config_path = AppConfig::resolve_path(args.config);
    let config = AppConfig::load(&config_path)?;

    caden_telemetry::init_logging(&config.telemetry.log_level)?;
    info!("Starting Caden sync client v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&config_path).exists() {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Config file not found, using defaults");
    }

    let client = SyncClient::connect(&config)?;
    let mut metrics = client.metrics();
    let mut stats_interval = tokio::time::interval(STATS_INTERVAL);

    loop {
        tokio::select! {
            changed = metrics.changed() => {
                if changed.is_err() {
                    break;
                }
                let m = metrics.borrow_and_update().clone();
                info!(
                    unrealized_pnl = %m.unrealized_pnl,
                    realized_pnl = %m.realized_pnl,
                    spread_bps = ?m.spread_bps,
                    health_bps = ?m.health_ratio,
                    "Position metrics"
                );
            }

            _ = stats_interval.tick() => {
                let stats = client.liquidator_stats();
                let portfolio = client.portfolio();
                info!(
                    watched_accounts = client.watched_accounts(),
                    liquidations_submitted = stats.submitted,
                    liquidations_confirmed = stats.confirmed,
                    liquidations_failed = stats.failed,
                    holdings = portfolio.total_holdings,
                    win_rate_pct = %portfolio.win_rate_pct,
                    "Session stats"
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
