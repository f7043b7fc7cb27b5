//! Data models for modsync.
//!
//! - [`Settings`]: the persisted `config.json` document (remembered mods folder)
//! - [`RemoteCredentials`]: app key, secret and refresh token for Dropbox
//! - [`Release`]: compiled-in mapping from version label to archive path
//! - [`SyncStage`] / [`SyncState`]: the state machine of a single sync run

pub mod release;
pub mod settings;
pub mod sync_state;

pub use release::{DEFAULT_RELEASE, RELEASES, Release, find_release};
pub use settings::{RemoteCredentials, Settings};
pub use sync_state::{SyncStage, SyncState};
