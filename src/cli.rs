//! Command line front end.
//!
//! Parses arguments with clap and drives the library: settings, target
//! validation, and a sync rendered as a progress bar. Every command prints a
//! single human-readable result line.

use crate::config::ConfigStore;
use crate::metrics::Metrics;
use crate::models::{DEFAULT_RELEASE, RELEASES, Settings};
use crate::progress::progress_channel;
use crate::services::{DropboxCredentials, DropboxStore, PathPolicy};
use crate::sync::{SyncAbort, SyncOrchestrator, SyncSummary};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Resolution of the progress bar
const BAR_LENGTH: u64 = 1000;

/// modsync - keep your Minecraft mods folder in sync with the pack
#[derive(Parser, Debug)]
#[command(name = "modsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding config.json and credentials.json
    #[arg(long, global = true, default_value = ".")]
    pub settings_dir: String,

    /// User profile root (defaults to USERPROFILE, then the home directory)
    #[arg(long, global = true, env = "MODSYNC_PROFILE_ROOT")]
    pub profile_root: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Also write logs to the console
    #[arg(long, global = true)]
    pub console: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List the releases that can be installed
    Releases,

    /// Check whether a folder is the Minecraft mods folder
    Validate {
        /// Folder to check
        path: String,
    },

    /// Show or change the remembered mods folder
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Replace the mods folder with a release
    ///
    /// Everything inside the folder is deleted before the release is
    /// downloaded. If the download fails the folder is left empty.
    Sync {
        /// Release label (see 'modsync releases')
        #[arg(short, long, default_value = DEFAULT_RELEASE)]
        release: String,

        /// Mods folder (defaults to the remembered folder)
        #[arg(short, long)]
        target: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Print the remembered mods folder
    Show,

    /// Remember a mods folder
    Save {
        /// Folder to remember
        path: String,
    },
}

/// Execute the parsed command.
///
/// # Returns
/// `true` if the command succeeded, `false` if it reported a failure to the
/// user. Errors are reserved for problems setting up the command itself.
pub async fn execute(cli: &Cli, metrics: Arc<Metrics>) -> Result<bool> {
    let store = ConfigStore::new(&cli.settings_dir);

    match &cli.command {
        Commands::Releases => {
            for release in RELEASES {
                let marker = if release.label == DEFAULT_RELEASE { " (default)" } else { "" };
                println!("{:<8} {}{}", release.label, release.remote_path, marker);
            }
            Ok(true)
        }
        Commands::Validate { path } => {
            let policy = resolve_policy(cli)?;
            if policy.is_valid_target(path) {
                println!("{} is the Minecraft mods folder", path);
                Ok(true)
            } else {
                println!(
                    "{} is not the Minecraft mods folder; expected {}",
                    path,
                    policy.canonical_target()
                );
                Ok(false)
            }
        }
        Commands::Settings { action } => match action {
            SettingsCommand::Show => {
                match store.load().minecraft_path() {
                    Some(path) => println!("Mods folder: {}", path),
                    None => println!("No mods folder saved in {}", store.settings_path()),
                }
                Ok(true)
            }
            SettingsCommand::Save { path } => {
                let mut settings = store.load();
                settings.minecraft_path = Some(path.clone());
                match store.save(&settings) {
                    Ok(()) => {
                        println!("Settings saved to {}", store.settings_path());
                        Ok(true)
                    }
                    Err(e) => {
                        eprintln!("Could not save settings: {}", e);
                        Ok(false)
                    }
                }
            }
        },
        Commands::Sync { release, target } => {
            let policy = resolve_policy(cli)?;
            let target = resolve_target(target.as_deref(), &store.load(), &policy);
            run_sync(&store, policy, target, release, metrics).await
        }
    }
}

fn resolve_policy(cli: &Cli) -> Result<PathPolicy> {
    match &cli.profile_root {
        Some(root) => Ok(PathPolicy::new(root.as_str())),
        None => PathPolicy::from_env()
            .context("Cannot determine the user profile folder; pass --profile-root"),
    }
}

/// Explicit target, then the remembered folder, then the policy folder
pub fn resolve_target(
    explicit: Option<&str>,
    settings: &Settings,
    policy: &PathPolicy,
) -> Utf8PathBuf {
    explicit
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .or_else(|| settings.minecraft_path())
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| policy.canonical_target())
}

async fn run_sync(
    store: &ConfigStore,
    policy: PathPolicy,
    target: Utf8PathBuf,
    release: &str,
    metrics: Arc<Metrics>,
) -> Result<bool> {
    let credentials = match store.load_credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Sync failed: {}", e);
            return Ok(false);
        }
    };

    let provider =
        DropboxCredentials::new(credentials).context("Failed to set up Dropbox client")?;
    let remote =
        DropboxStore::new(Arc::new(provider)).context("Failed to set up Dropbox client")?;
    let orchestrator =
        Arc::new(SyncOrchestrator::new(policy, Arc::new(remote)).with_metrics(metrics));

    // Ctrl-C stops the sync at the next stage boundary
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling after the current stage");
            token.cancel();
        }
    });

    let bar = ProgressBar::new(BAR_LENGTH);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {percent:>3}%")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );
    bar.set_message(format!("Syncing {}", release));

    let (tx, mut rx) = progress_channel();
    let mut handle = orchestrator.spawn(target, release.to_string(), Arc::new(tx));

    let outcome = loop {
        tokio::select! {
            result = &mut handle => break result.context("Sync task failed")?,
            Some(fraction) = rx.changed() => {
                bar.set_position((fraction * BAR_LENGTH as f64) as u64);
            }
        }
    };

    Ok(report(&bar, release, outcome))
}

fn report(bar: &ProgressBar, release: &str, outcome: Result<SyncSummary, SyncAbort>) -> bool {
    match outcome {
        Ok(summary) => {
            bar.finish_and_clear();
            println!(
                "Mods for {} installed into {} ({} files)",
                release, summary.target, summary.files_extracted
            );
            true
        }
        Err(abort) => {
            bar.abandon();
            eprintln!("Sync failed: {}", abort);
            false
        }
    }
}
