//! Sync orchestration - runs the stages of a sync in order.
//!
//! [`SyncOrchestrator`] is the only component that sees more than one stage.
//! It walks the state machine
//! `Idle -> Validating -> Clearing -> Downloading -> Extracting -> Cleanup -> Done`
//! and stops at the first failure with an `Aborted` state, which is reported
//! to the caller exactly once as a [`SyncAbort`].
//!
//! # Cancellation
//!
//! A [`CancellationToken`] is checked when entering each stage. A stage that
//! has started always runs to completion, so the archive is never cut off
//! mid-write and the target is never left half-cleared by a cancel.

use crate::error::{ErrorKind, SyncError};
use crate::metrics::Metrics;
use crate::models::{SyncStage, SyncState, find_release};
use crate::progress::ProgressSink;
use crate::services::{ArchiveFetcher, PathPolicy, RemoteStore, clear_folder, install_archive};
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Name of the temporary archive, created inside the target folder
pub const ARCHIVE_FILE_NAME: &str = ".modsync-archive.zip";

/// Terminal failure of a sync run
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct SyncAbort {
    /// Stage that was running when the run stopped
    pub stage: SyncStage,
    #[source]
    pub error: SyncError,
}

impl SyncAbort {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub target: Utf8PathBuf,
    pub remote_path: String,
    pub entries_cleared: usize,
    pub bytes_downloaded: u64,
    pub files_extracted: usize,
    pub elapsed: Duration,
}

/// Forwards download progress to the caller and to state subscribers
struct FanOut<'a> {
    sink: &'a dyn ProgressSink,
    state: &'a StateManager,
}

impl ProgressSink for FanOut<'_> {
    fn report(&self, fraction: f64) {
        self.sink.report(fraction);
        self.state.report_progress(fraction);
    }
}

/// Runs a full sync of one target folder against one remote archive.
///
/// Callers must not run two syncs on the same orchestrator at once; a second
/// `run` while one is in flight is refused with [`SyncError::Busy`].
pub struct SyncOrchestrator {
    policy: PathPolicy,
    fetcher: ArchiveFetcher,
    state: StateManager,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
}

impl SyncOrchestrator {
    pub fn new(policy: PathPolicy, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            policy,
            fetcher: ArchiveFetcher::new(store),
            state: StateManager::new(),
            cancel: CancellationToken::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Use `token` to cancel runs at the next stage boundary
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Record into shared `metrics` instead of a private instance
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// State of the current or last run, and its event stream
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether `path` would be accepted as a sync target
    pub fn is_valid_target(&self, path: impl AsRef<str>) -> bool {
        self.policy.is_valid_target(path)
    }

    /// Sync `target` with the archive of the release labelled `label`.
    ///
    /// An unknown label aborts during validation before anything is touched.
    pub async fn run_release(
        &self,
        target: &Utf8Path,
        label: &str,
        progress: &dyn ProgressSink,
    ) -> Result<SyncSummary, SyncAbort> {
        match find_release(label) {
            Some(release) => self.run(target, release.remote_path, progress).await,
            None => {
                self.begin()?;
                Err(self.abort(
                    SyncStage::Validating,
                    SyncError::UnknownRelease(label.to_string()),
                ))
            }
        }
    }

    /// Replace the contents of `target` with the archive at `remote_path`.
    ///
    /// `progress` receives download fractions, ending with 1.0 on success.
    /// Once `target` is accepted every stage works on the policy's canonical
    /// folder, never on the spelling the caller passed.
    pub async fn run(
        &self,
        target: &Utf8Path,
        remote_path: &str,
        progress: &dyn ProgressSink,
    ) -> Result<SyncSummary, SyncAbort> {
        self.begin()?;
        let started = Instant::now();
        tracing::info!("Starting sync of {} from {}", target, remote_path);

        // Validating
        if !self.policy.is_valid_target(target.as_str()) {
            return Err(self.abort(
                SyncStage::Validating,
                SyncError::InvalidTarget(target.to_path_buf()),
            ));
        }
        let canonical = self.policy.canonical_target();
        let target = canonical.as_path();
        if !target.is_dir() {
            tracing::info!("Creating target folder {}", target);
            fs::create_dir_all(target).map_err(|e| {
                self.abort(SyncStage::Validating, SyncError::filesystem(target, e))
            })?;
        }

        // Clearing
        self.enter(SyncStage::Clearing)?;
        let owned_target = target.to_path_buf();
        let entries_cleared = blocking(target, move || clear_folder(&owned_target))
            .await
            .map_err(|e| self.abort(SyncStage::Clearing, e))?;
        self.metrics.record_cleared(entries_cleared);

        // Downloading
        self.enter(SyncStage::Downloading)?;
        let archive = target.join(ARCHIVE_FILE_NAME);
        let fan_out = FanOut {
            sink: progress,
            state: &self.state,
        };
        let bytes_downloaded = match self.fetcher.fetch(remote_path, &archive, &fan_out).await {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_archive(&archive);
                return Err(self.abort(SyncStage::Downloading, e));
            }
        };
        self.metrics.record_downloaded(bytes_downloaded);

        // Extracting
        if let Err(abort) = self.enter(SyncStage::Extracting) {
            discard_archive(&archive);
            return Err(abort);
        }
        let (owned_archive, owned_target) = (archive.clone(), target.to_path_buf());
        let files_extracted = blocking(target, move || {
            install_archive(&owned_archive, &owned_target)
        })
        .await
        .map_err(|e| self.abort(SyncStage::Extracting, e))?;
        self.metrics.record_extracted(files_extracted);

        // Cleanup always runs once extraction succeeded
        self.advance(SyncStage::Cleanup)?;
        if archive.exists() {
            fs::remove_file(&archive)
                .map_err(|e| self.abort(SyncStage::Cleanup, SyncError::filesystem(&archive, e)))?;
        }

        self.advance(SyncStage::Done)?;
        let elapsed = started.elapsed();
        self.metrics.record_completed(elapsed);
        tracing::info!(
            "Sync of {} finished in {:.2}s: {} entries cleared, {} bytes downloaded, {} files extracted",
            target,
            elapsed.as_secs_f64(),
            entries_cleared,
            bytes_downloaded,
            files_extracted
        );

        Ok(SyncSummary {
            target: target.to_path_buf(),
            remote_path: remote_path.to_string(),
            entries_cleared,
            bytes_downloaded,
            files_extracted,
            elapsed,
        })
    }

    /// Start [`run_release`](Self::run_release) on the tokio runtime.
    ///
    /// Progress is delivered through `progress` from the runtime's worker
    /// threads; await the handle for the terminal status.
    pub fn spawn(
        self: &Arc<Self>,
        target: Utf8PathBuf,
        label: String,
        progress: Arc<dyn ProgressSink>,
    ) -> JoinHandle<Result<SyncSummary, SyncAbort>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_release(&target, &label, progress.as_ref()).await })
    }

    /// Claim the state machine and enter `Validating`, or refuse with `Busy`
    fn begin(&self) -> Result<(), SyncAbort> {
        if !self.state.begin() {
            tracing::warn!("Sync requested while another sync is running");
            return Err(SyncAbort {
                stage: SyncStage::Idle,
                error: SyncError::Busy,
            });
        }
        self.check_cancelled(SyncStage::Validating)
    }

    /// Move into `stage`, aborting there if cancellation was requested
    fn enter(&self, stage: SyncStage) -> Result<(), SyncAbort> {
        self.advance(stage)?;
        self.check_cancelled(stage)
    }

    fn check_cancelled(&self, stage: SyncStage) -> Result<(), SyncAbort> {
        if self.cancel.is_cancelled() {
            tracing::info!("Sync cancelled before {}", stage);
            return Err(self.abort(stage, SyncError::Cancelled));
        }
        Ok(())
    }

    /// Move into `stage`; a transition the state machine refuses means the
    /// run no longer owns it, so the run stops without touching state.
    fn advance(&self, stage: SyncStage) -> Result<(), SyncAbort> {
        tracing::debug!("Entering {} stage", stage);
        if self.state.transition(SyncState::Running(stage)) {
            return Ok(());
        }
        tracing::error!(
            "Sync lost the state machine entering {} (now {})",
            stage,
            self.state.snapshot()
        );
        Err(SyncAbort {
            stage,
            error: SyncError::Busy,
        })
    }

    fn abort(&self, stage: SyncStage, error: SyncError) -> SyncAbort {
        tracing::error!("Sync aborted during {}: {}", stage, error);
        self.metrics.record_aborted();
        self.state.transition(SyncState::Aborted {
            stage,
            reason: error.to_string(),
        });
        SyncAbort { stage, error }
    }
}

/// Run a blocking filesystem stage off the async worker threads
async fn blocking<T, F>(path: &Utf8Path, f: F) -> Result<T, SyncError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::filesystem(path, std::io::Error::other(e)))?
}

/// Best-effort removal of a partial or unused archive
fn discard_archive(archive: &Utf8Path) {
    match fs::remove_file(archive) {
        Ok(()) => tracing::info!("Removed partial archive {}", archive),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove partial archive {}: {}", archive, e),
    }
}
