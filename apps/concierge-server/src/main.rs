use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod config;
mod logging;
mod runtime;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Concierge: token credential exchange and impersonation proxy.
#[derive(Parser, Debug)]
#[command(name = "concierge-server", version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting concierge");

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    runtime::run(config, cancel).await
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        return;
    }
    info!("shutdown requested");
    cancel.cancel();
}
