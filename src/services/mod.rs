//! Services module - the stages of a sync, each usable on its own.
//!
//! These services have no knowledge of the CLI or any GUI. Each one covers a
//! single stage and is composed by [`crate::sync::SyncOrchestrator`]:
//!
//! - [`PathPolicy`]: decides whether a folder is the Minecraft mods folder
//! - [`clear_folder`]: empties the target folder, keeping the folder itself
//! - [`ArchiveFetcher`]: streams a remote archive to disk with progress
//! - [`install_archive`]: extracts the archive into the target and deletes it
//! - [`remote`]: Dropbox credential refresh and object download
//!
//! # Ordering
//!
//! [`clear_folder`] is destructive. It must only ever run on a folder that
//! [`PathPolicy::is_valid_target`] accepted.

pub mod fetch;
pub mod folder;
pub mod install;
pub mod path_validation;
pub mod remote;

pub use fetch::{ArchiveFetcher, CHUNK_SIZE};
pub use folder::clear_folder;
pub use install::{install_archive, safe_relative_path};
pub use path_validation::{PathPolicy, normalize_path};
pub use remote::{
    Credential, CredentialProvider, DropboxCredentials, DropboxStore, RemoteObject, RemoteStore,
    StaticCredential,
};
