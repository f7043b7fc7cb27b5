use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Settings document persisted as `config.json`
///
/// Only `minecraft_path` is interpreted. Any other keys found in the file are
/// kept in `extra` so saving does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_path: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Settings {
    /// Settings with the remembered target path set
    pub fn with_minecraft_path(path: impl Into<String>) -> Self {
        Self {
            minecraft_path: Some(path.into()),
            extra: IndexMap::new(),
        }
    }

    /// The remembered target path, ignoring blank values
    pub fn minecraft_path(&self) -> Option<&str> {
        self.minecraft_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// App credentials for the Dropbox token endpoint
///
/// Loaded from `credentials.json` and `MODSYNC_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteCredentials {
    #[serde(default)]
    pub app_key: String,

    #[serde(default)]
    pub app_secret: String,

    #[serde(default)]
    pub refresh_token: String,
}

impl RemoteCredentials {
    /// Names of the values that are still missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.app_key.is_empty() {
            missing.push("app_key");
        }
        if self.app_secret.is_empty() {
            missing.push("app_secret");
        }
        if self.refresh_token.is_empty() {
            missing.push("refresh_token");
        }
        missing
    }
}
