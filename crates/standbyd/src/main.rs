//! standbyd — the dynamic standby daemon.
//!
//! Opens the fleet store and runs the standby controller against it until
//! interrupted.
//!
//! # Usage
//!
//! ```text
//! standbyd run --config /etc/standbyd/standbyd.toml
//! standbyd inspect --store /var/lib/standbyd/standby.redb
//! ```

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;

use standby_controller::{parse_floor, StandbyController};
use standby_sizer::StandbySizer;
use standby_state::StateStore;

use crate::config::StandbydConfig;

#[derive(Parser)]
#[command(name = "standbyd", about = "Dynamic standby daemon")]
struct Cli {
    /// Path to standbyd.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the store path from the config file.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller until Ctrl-C.
    Run,
    /// Print every fleet with its floor as JSON.
    Inspect,
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,standby=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = StandbydConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    match cli.command {
        Command::Run => run(config).await,
        Command::Inspect => inspect(&config),
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn run(config: StandbydConfig) -> anyhow::Result<()> {
    info!("standbyd starting");

    if let Some(dir) = config.store.path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let state = StateStore::open(&config.store.path)?;
    info!(path = ?config.store.path, "state store opened");

    let controller = StandbyController::new(
        state,
        StandbySizer::new(config.sizer.clone()),
        config.controller.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // Nothing in-process publishes watch events yet; the resync ticker
    // drives every pass.
    let (_events_tx, events_rx) = mpsc::channel(256);

    let controller_handle = tokio::spawn(async move {
        controller.run(events_rx, shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = controller_handle.await;

    info!("standbyd stopped");
    Ok(())
}

fn inspect(config: &StandbydConfig) -> anyhow::Result<()> {
    let state = StateStore::open(&config.store.path)?;
    let mut rows = Vec::new();
    for fleet in state.list_fleets()? {
        let key = fleet.table_key();
        let floor = match state.get_floor(&key)? {
            Some(record) => match parse_floor(&record) {
                Ok(floor) => serde_json::json!(floor),
                Err(e) => serde_json::json!(e.to_string()),
            },
            None => serde_json::Value::Null,
        };
        rows.push(serde_json::json!({
            "fleet": key,
            "build_id": fleet.build_id,
            "active": fleet.active_count,
            "standby": fleet.standby_count,
            "target_standby": fleet.target_standby,
            "floor": floor,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
