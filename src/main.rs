mod api;
mod cli;
mod config;
mod error;
mod notify;
mod retry;
mod stats;
mod store;
mod transform;
mod ui;
mod worker;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::api::FiscalApiClient;
use crate::cli::{Cli, Command};
use crate::config::ConfigStore;
use crate::notify::LogNotifier;
use crate::stats::ServiceStats;
use crate::store::PgRecordStore;
use crate::ui::ConsoleReport;
use crate::worker::FiscalWorker;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_store = ConfigStore::open(&cli.config)?;

    match cli.command {
        Command::Config => ConsoleReport::new().print_config(&config_store.snapshot())?,
        Command::Run { once } => run(&config_store, once).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "fiscald=debug" } else { "fiscald=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config_store: &ConfigStore, once: bool) -> Result<()> {
    let config = config_store.snapshot();
    if config.connection_string.trim().is_empty() {
        return Err(error::ServiceError::Config(
            "no connection string configured; set connection_string in the config file or DATABASE_URL".to_string(),
        )
        .into());
    }

    let report = ConsoleReport::new();
    report.startup(&config);

    let store = PgRecordStore::connect(&config.connection_string)?;
    let client = FiscalApiClient::new()?;
    let stats = Arc::new(ServiceStats::new());
    let worker = FiscalWorker::new(store, client, LogNotifier::new(), stats.clone());

    let cancel = CancellationToken::new();

    if once {
        worker.run_cycle(&config, &cancel).await?;
    } else {
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_cancel.cancel();
            }
        });
        worker.run(config_store, cancel).await;
    }

    report.shutdown(&stats.snapshot());
    Ok(())
}
