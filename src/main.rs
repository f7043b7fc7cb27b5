//! modsync - keeps a Minecraft mods folder in sync with the pack in Dropbox
//!
//! Main entry point for the command line application.
//!
//! # Overview
//!
//! This binary parses the command line and initializes:
//! - Logging infrastructure (daily file rotation, optional console output)
//! - Tokio async runtime (the sync runs as a background task)
//! - Process-wide [`Metrics`], summarized in the log on exit
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Initialize logging -> logs/modsync.<date>
//! 3. Create tokio runtime with 2 worker threads
//! 4. Run the command; a sync renders its progress while it runs
//! 5. Shutdown the runtime and exit non-zero if the command failed
//!
//! # Configuration Files
//!
//! Read from the settings directory (`--settings-dir`, default `.`):
//! - `config.json`: the remembered mods folder
//! - `credentials.json`: Dropbox app key, secret and refresh token, overridden
//!   by `MODSYNC_APP_KEY`, `MODSYNC_APP_SECRET` and `MODSYNC_REFRESH_TOKEN`

use anyhow::Result;
use camino::Utf8Path;
use clap::Parser;
use modsync::cli::{self, Cli};
use modsync::logging::{LOG_DIR, LOG_PREFIX};
use modsync::metrics::Metrics;
use modsync::{APP_NAME, VERSION};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Held until exit so buffered log lines are flushed
    let _guard = modsync::logging::setup_logging(
        Utf8Path::new(LOG_DIR),
        LOG_PREFIX,
        cli.debug,
        cli.console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("modsync-worker")
        .build()?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(cli::execute(&cli, Arc::clone(&metrics)));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    metrics.log_summary();

    match result {
        Ok(true) => {
            tracing::info!("Command finished");
            Ok(ExitCode::SUCCESS)
        }
        Ok(false) => {
            tracing::info!("Command reported a failure");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!("Command error: {:#}", e);
            Err(e)
        }
    }
}
