use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while synchronizing the mods folder
///
/// Every variant except [`SyncError::Config`] aborts the running sync at the
/// stage where it was raised. Config errors only affect persistence of the
/// settings document and are never fatal.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Folder {0} is not the Minecraft mods folder")]
    InvalidTarget(Utf8PathBuf),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Settings error: {0}")]
    Config(String),

    #[error("Unknown release {0}")]
    UnknownRelease(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("A sync is already running")]
    Busy,
}

/// Coarse classification of a [`SyncError`], used by callers to pick a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidTarget,
    Filesystem,
    Credential,
    Transfer,
    Archive,
    Config,
    UnknownRelease,
    Cancelled,
    Busy,
}

impl SyncError {
    pub fn filesystem(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTarget(_) => ErrorKind::InvalidTarget,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Credential(_) => ErrorKind::Credential,
            Self::Transfer(_) => ErrorKind::Transfer,
            Self::Archive(_) => ErrorKind::Archive,
            Self::Config(_) => ErrorKind::Config,
            Self::UnknownRelease(_) => ErrorKind::UnknownRelease,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Busy => ErrorKind::Busy,
        }
    }
}

impl From<zip::result::ZipError> for SyncError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
