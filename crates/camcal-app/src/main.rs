use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;

pub mod controller;
pub mod io;
pub mod logging;
pub mod profile;
pub mod save;

use self::controller::{AppController, drain_once};
use self::io::{command_loop, spawn_stdin_reader};

#[derive(Parser, Debug)]
#[command(name = "camcal", about = "Camera calibration capture session and upload queue")]
struct Cli {
    /// JSON config file; defaults to ./camcal.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive capture session (default)
    Session,
    /// Run one upload cycle over the queue directory and exit
    Drain {
        /// Give up waiting for the cycle after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = profile::load_config(cli.config.as_deref())?;
    logging::init_logging(&config.log);

    match cli.command.unwrap_or(Commands::Session) {
        Commands::Session => run_session(config).await,
        Commands::Drain { timeout_secs } => run_drain(config, timeout_secs).await,
    }
}

async fn run_session(config: camcal_config::Config) -> anyhow::Result<()> {
    let controller = Arc::new(AppController::new(config)?);
    controller.start_flow()?;

    tracing::info!("Press enter to start, enter to capture, b to undo, p for help, q to quit");

    let (tx, rx) = kanal::bounded(16);
    spawn_stdin_reader(tx)?;

    let mut tasks = controller.spawn_tasks();

    tokio::select! {
        _ = command_loop(controller.clone(), rx.to_async()) => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for ctrl+c: {e}");
            }
            tracing::info!("Shutdown requested");
        }
    }

    controller.cancel_token().cancel();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Task failed: {e:#}"),
            Err(e) => tracing::error!("Task panicked: {e}"),
        }
    }

    let shutdown = controller.clone();
    tokio::task::spawn_blocking(move || shutdown.shutdown())
        .await
        .context("Shutdown task panicked")?;
    Ok(())
}

async fn run_drain(config: camcal_config::Config, timeout_secs: u64) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(timeout_secs);
    let status = tokio::task::spawn_blocking(move || drain_once(&config, timeout))
        .await
        .context("Drain task panicked")??;

    if status.message.is_empty() {
        println!("Nothing to upload");
    } else {
        println!("{}", status.message);
    }
    Ok(())
}
