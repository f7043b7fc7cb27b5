// Sync metrics module
//
// Lightweight counters describing what the sync runs in this process did

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide sync metrics
///
/// Uses atomic operations for thread-safe tracking without locks. The
/// orchestrator records into it; the CLI logs a summary on exit.
#[derive(Debug)]
pub struct Metrics {
    /// Runs that reached `Done`
    pub syncs_completed: AtomicUsize,

    /// Runs that ended in `Aborted`
    pub syncs_aborted: AtomicUsize,

    /// Entries removed from target folders while clearing
    pub entries_cleared: AtomicUsize,

    /// Archive bytes written to disk
    pub bytes_downloaded: AtomicU64,

    /// Files written while extracting
    pub files_extracted: AtomicUsize,

    /// Wall time of completed runs in milliseconds
    pub total_sync_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            syncs_completed: AtomicUsize::new(0),
            syncs_aborted: AtomicUsize::new(0),
            entries_cleared: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
            files_extracted: AtomicUsize::new(0),
            total_sync_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a run that reached `Done`
    pub fn record_completed(&self, duration: Duration) {
        self.syncs_completed.fetch_add(1, Ordering::Relaxed);
        self.total_sync_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.syncs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleared(&self, entries: usize) {
        self.entries_cleared.fetch_add(entries, Ordering::Relaxed);
    }

    pub fn record_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_extracted(&self, files: usize) {
        self.files_extracted.fetch_add(files, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average wall time of a completed run in milliseconds
    pub fn avg_sync_time_ms(&self) -> f64 {
        let total = self.total_sync_time_ms.load(Ordering::Relaxed);
        let count = self.syncs_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Sync Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Syncs: {} completed, {} aborted (avg: {:.2}ms per completed sync)",
            self.syncs_completed.load(Ordering::Relaxed),
            self.syncs_aborted.load(Ordering::Relaxed),
            self.avg_sync_time_ms()
        );
        tracing::info!(
            "Entries cleared: {}, bytes downloaded: {}, files extracted: {}",
            self.entries_cleared.load(Ordering::Relaxed),
            self.bytes_downloaded.load(Ordering::Relaxed),
            self.files_extracted.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
