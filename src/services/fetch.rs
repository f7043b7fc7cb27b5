//! Streaming a remote archive to a local file with progress reporting.

use crate::error::{Result, SyncError};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::services::remote::RemoteStore;
use camino::Utf8Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Size of each read from the remote stream
pub const CHUNK_SIZE: usize = 4096;

/// Downloads release archives from a [`RemoteStore`]
#[derive(Clone)]
pub struct ArchiveFetcher {
    store: Arc<dyn RemoteStore>,
}

impl ArchiveFetcher {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Download `remote_path` into `dest`, overwriting it.
    ///
    /// `progress` receives the received/total fraction after every chunk and
    /// exactly 1.0 on success. On failure `dest` may be missing or partially
    /// written.
    ///
    /// # Returns
    /// Number of bytes written
    pub async fn fetch(
        &self,
        remote_path: &str,
        dest: &Utf8Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        tracing::info!("Starting download {} -> {}", remote_path, dest);

        let result = self.copy_to_file(remote_path, dest, progress).await;

        match &result {
            Ok(bytes) => tracing::info!("Downloaded {} to {} ({} bytes)", remote_path, dest, bytes),
            Err(e) => tracing::error!("Failed to download {}: {}", remote_path, e),
        }

        result
    }

    async fn copy_to_file(
        &self,
        remote_path: &str,
        dest: &Utf8Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let mut object = self.store.open(remote_path).await?;

        let mut file = File::create(dest)
            .await
            .map_err(|e| SyncError::filesystem(dest, e))?;

        let mut tracker = ProgressTracker::new(progress, object.size);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = object.reader.read(&mut buf).await.map_err(|e| {
                SyncError::Transfer(format!(
                    "{} interrupted after {} of {} bytes: {}",
                    remote_path,
                    tracker.received(),
                    tracker.total(),
                    e
                ))
            })?;
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n])
                .await
                .map_err(|e| SyncError::filesystem(dest, e))?;
            tracker.advance(n);
        }

        file.flush().await.map_err(|e| SyncError::filesystem(dest, e))?;

        if tracker.received() != tracker.total() {
            return Err(SyncError::Transfer(format!(
                "{} declared {} bytes but delivered {}",
                remote_path,
                tracker.total(),
                tracker.received()
            )));
        }

        tracker.finish();
        Ok(tracker.received())
    }
}
