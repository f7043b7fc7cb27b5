use crate::error::{Result, SyncError};
use crate::models::{RemoteCredentials, Settings};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;

/// File name of the settings document
pub const SETTINGS_FILE: &str = "config.json";

/// File name of the optional credentials document
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Prefix of the environment variables holding Dropbox credentials
pub const ENV_PREFIX: &str = "MODSYNC";

/// Store for the persisted settings document and the remote credentials.
///
/// Manages two files inside the settings directory:
/// - `config.json`: the remembered mods folder, written by "save settings"
/// - `credentials.json`: optional app key/secret/refresh token, overridden by
///   `MODSYNC_APP_KEY`, `MODSYNC_APP_SECRET` and `MODSYNC_REFRESH_TOKEN`
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    credentials_path: Utf8PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at `config_dir`.
    ///
    /// Nothing is touched on disk until [`save`](Self::save) is called.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();

        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            credentials_path: config_dir.join(CREDENTIALS_FILE),
            config_dir,
        }
    }

    /// Load the settings document.
    ///
    /// Never fails: a missing file yields empty settings, and an unreadable or
    /// malformed file is logged and also treated as empty.
    pub fn load(&self) -> Settings {
        if !self.settings_path.exists() {
            tracing::info!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Settings::default();
        }

        let contents = match fs::read_to_string(&self.settings_path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!("Failed to read settings {}: {}", self.settings_path, e);
                return Settings::default();
            }
        };

        match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {}", self.settings_path);
                settings
            }
            Err(e) => {
                tracing::error!("Failed to parse settings {}: {}", self.settings_path, e);
                Settings::default()
            }
        }
    }

    /// Save the settings document, overwriting the previous content.
    ///
    /// Failures are logged and returned as [`SyncError::Config`]; the caller's
    /// in-memory settings stay valid either way.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        self.write_settings(settings).inspect_err(|e| {
            tracing::error!("Failed to save settings to {}: {}", self.settings_path, e);
        })?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    fn write_settings(&self, settings: &Settings) -> Result<()> {
        if !self.config_dir.as_str().is_empty() && !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).map_err(|e| {
                SyncError::Config(format!(
                    "failed to create settings directory {}: {}",
                    self.config_dir, e
                ))
            })?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        settings
            .serialize(&mut serializer)
            .map_err(|e| SyncError::Config(format!("failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, buf).map_err(|e| {
            SyncError::Config(format!("failed to write {}: {}", self.settings_path, e))
        })
    }

    /// Load Dropbox app credentials from `credentials.json` and the environment.
    ///
    /// Environment variables take precedence over the file. Values that are
    /// still missing are reported as a [`SyncError::Credential`].
    pub fn load_credentials(&self) -> Result<RemoteCredentials> {
        let credentials: RemoteCredentials = config::Config::builder()
            .add_source(
                config::File::from(self.credentials_path.as_std_path()).required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                tracing::error!("Failed to load credentials: {}", e);
                SyncError::Credential(format!("failed to load credentials: {}", e))
            })?;

        let missing = credentials.missing();
        if !missing.is_empty() {
            tracing::error!("Credentials incomplete, missing: {}", missing.join(", "));
            return Err(SyncError::Credential(format!(
                "missing {} (set {}_APP_KEY, {}_APP_SECRET, {}_REFRESH_TOKEN or {})",
                missing.join(", "),
                ENV_PREFIX,
                ENV_PREFIX,
                ENV_PREFIX,
                self.credentials_path
            )));
        }

        Ok(credentials)
    }

    /// Get the settings directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the settings document path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
