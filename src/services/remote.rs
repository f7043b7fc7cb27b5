//! Dropbox access: credential refresh and streamed object download.
//!
//! Two seams are exposed as traits so the sync engine can run against fakes:
//! - [`CredentialProvider`]: yields a bearer [`Credential`] or fails
//! - [`RemoteStore`]: opens a remote path as a byte stream of known length
//!
//! The Dropbox implementations exchange the app's long-lived refresh token for
//! a short-lived access token on demand and cache it until shortly before it
//! expires.

use crate::error::{Result, SyncError};
use crate::models::RemoteCredentials;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

pub const DROPBOX_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
pub const DROPBOX_DOWNLOAD_URL: &str = "https://content.dropboxapi.com/2/files/download";

/// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Bearer token authorizing remote object access
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of bearer credentials for the remote store
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a usable credential, refreshing it if needed
    async fn credential(&self) -> Result<Credential>;

    /// Forget any cached credential so the next call obtains a fresh one
    fn invalidate(&self) {}
}

/// Provider for an already known access token
#[derive(Debug, Clone)]
pub struct StaticCredential(Credential);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Credential::new(token))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    credential: Credential,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_none_or(|at| Instant::now() + EXPIRY_MARGIN < at)
    }
}

/// Refresh-token exchange against the Dropbox OAuth endpoint
pub struct DropboxCredentials {
    http: Client,
    token_url: String,
    credentials: RemoteCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl DropboxCredentials {
    pub fn new(credentials: RemoteCredentials) -> Result<Self> {
        Ok(Self::with_client(
            http_client()?,
            DROPBOX_TOKEN_URL,
            credentials,
        ))
    }

    pub fn with_client(
        http: Client,
        token_url: impl Into<String>,
        credentials: RemoteCredentials,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials,
            cached: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<Credential> {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .filter(|token| token.is_fresh())
            .map(|token| token.credential.clone())
    }

    async fn refresh(&self) -> Result<CachedToken> {
        tracing::debug!("Refreshing Dropbox access token");

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.credentials.app_key, Some(&self.credentials.app_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Token refresh request failed: {}", e);
                SyncError::Credential(format!("token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            tracing::error!(status = status.as_u16(), error = %body, "Token refresh failed");
            return Err(SyncError::Credential(body));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse token response: {}", e);
            SyncError::Credential(format!("invalid token response: {}", e))
        })?;

        tracing::info!(
            "Refreshed Dropbox access token (expires in {}s)",
            token.expires_in.unwrap_or_default()
        );

        Ok(CachedToken {
            credential: Credential::new(token.access_token),
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }
}

#[async_trait]
impl CredentialProvider for DropboxCredentials {
    async fn credential(&self) -> Result<Credential> {
        if let Some(credential) = self.cached() {
            return Ok(credential);
        }

        let token = self.refresh().await?;
        let credential = token.credential.clone();
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
        Ok(credential)
    }

    fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// A remote object opened for reading
pub struct RemoteObject {
    /// Total length declared by the remote side
    pub size: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Object store holding the release archives
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open `remote_path` for streaming. Fails with a transfer or credential
    /// error if the object cannot be served.
    async fn open(&self, remote_path: &str) -> Result<RemoteObject>;
}

/// Dropbox `files/download` client
pub struct DropboxStore {
    http: Client,
    download_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl DropboxStore {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        Ok(Self::with_client(
            http_client()?,
            DROPBOX_DOWNLOAD_URL,
            credentials,
        ))
    }

    pub fn with_client(
        http: Client,
        download_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            download_url: download_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl RemoteStore for DropboxStore {
    async fn open(&self, remote_path: &str) -> Result<RemoteObject> {
        let credential = self.credentials.credential().await?;

        let response = self
            .http
            .post(&self.download_url)
            .bearer_auth(credential.bearer())
            .header("Dropbox-API-Arg", api_arg(remote_path))
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("request for {} failed: {}", remote_path, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate();
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(SyncError::Transfer(format!(
                "{} returned {}: {}",
                remote_path, status, body
            )));
        }

        let size = declared_size(response.headers()).ok_or_else(|| {
            SyncError::Transfer(format!("{} did not declare its size", remote_path))
        })?;

        tracing::debug!("Opened {} ({} bytes)", remote_path, size);

        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(RemoteObject {
            size,
            reader: Box::new(StreamReader::new(stream)),
        })
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::Transfer(format!("failed to build HTTP client: {}", e)))
}

/// JSON argument header for Dropbox content endpoints.
///
/// HTTP header values must be ASCII, so non-ASCII characters are written as
/// `\uXXXX` escapes.
pub fn api_arg(remote_path: &str) -> String {
    let json = serde_json::json!({ "path": remote_path }).to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[derive(Deserialize)]
struct ApiResult {
    size: u64,
}

/// Object size from `Dropbox-API-Result`, falling back to `Content-Length`
pub fn declared_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("dropbox-api-result")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| serde_json::from_str::<ApiResult>(v).ok())
        .map(|r| r.size)
        .or_else(|| {
            headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
}
