//! Sensorcast - environmental sensor forecasting service
//!
//! Forecasts five sensor channels (temperature, humidity, flammable gases,
//! TVOC, CO) sampled every 15 minutes. A daily batch refits per-channel
//! seasonal models and refreshes a forecast cache; an HTTP API serves
//! on-demand forecasts through a fallback chain and exposes recent data.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod db;
pub mod error;
pub mod forecasting;
pub mod scheduler;
pub mod services;
pub mod state;

use api::ApiServer;
use clap::Parser;
use config::{Cli, Command};
use scheduler::BatchScheduler;
use serde::Serialize;
use services::{BatchService, DataService, ForecastService};
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse the command line and run the selected subcommand
pub fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorcast=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let state = AppState::new(cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(Arc::new(state)),
        Command::Batch => print_json(&BatchService::run(&state)?),
        Command::Forecast { days } => print_json(&ForecastService::forecast(&state, days)?),
        Command::Data => print_json(&DataService::pull(&state)?),
        Command::InitDb => {
            state.store.initialize()?;
            Ok(())
        }
    }
}

/// Run the HTTP API and the daily scheduler until Ctrl-C
fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    tracing::info!("Starting Sensorcast...");

    if let Err(e) = state.store.warm_up() {
        tracing::warn!("Store not reachable at startup: {}", e);
    }

    if state.config.no_scheduler {
        tracing::info!("Batch scheduler disabled");
    } else {
        BatchScheduler::new(state.clone())?.start();
    }

    let addr = state.config.bind_addr()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let mut server = ApiServer::new(state);
        server.start(addr).await?;

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        server.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
