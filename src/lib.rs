// modsync - keeps a Minecraft mods folder in sync with a release archive in Dropbox
//
// This is the library crate containing the sync engine and its data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod services;
pub mod state;
pub mod sync;

// Re-export commonly used types for convenience
pub use config::ConfigStore;
pub use error::{ErrorKind, SyncError};
pub use models::{Release, Settings, SyncStage, SyncState};
pub use state::{StateManager, SyncEvent};
pub use sync::{SyncAbort, SyncOrchestrator, SyncSummary};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
