// Progress delivery
//
// The download runs on a tokio worker while progress is rendered somewhere
// else (a terminal progress bar, a GUI event loop). A ProgressSink is called
// from the worker and must return immediately; the channel-backed sink below
// hands the latest value to the rendering side without ever blocking.

use tokio::sync::watch;

/// Receiver of fractional completion updates in `[0, 1]`.
///
/// Called from the sync task's execution context. Implementations must not
/// block; marshaling to a UI thread is the implementation's job.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64) {}
}

/// Sending half of [`progress_channel`]
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: watch::Sender<f64>,
}

impl ProgressSink for ProgressSender {
    fn report(&self, fraction: f64) {
        // send_replace succeeds even when every receiver is gone
        self.tx.send_replace(fraction);
    }
}

/// Receiving half of [`progress_channel`]; always holds the latest value
#[derive(Debug, Clone)]
pub struct ProgressReceiver {
    rx: watch::Receiver<f64>,
}

impl ProgressReceiver {
    /// Latest reported fraction
    pub fn current(&self) -> f64 {
        *self.rx.borrow()
    }

    /// Wait for the next update. Returns `None` once the sender is dropped.
    ///
    /// Intermediate values may be skipped if several arrive between calls.
    pub async fn changed(&mut self) -> Option<f64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Create a coalescing progress channel starting at 0.0
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = watch::channel(0.0);
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Byte counter that turns received lengths into monotonic fractions
///
/// Values are clamped to `[0, 1]` and never decrease.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: u64,
    received: u64,
    last: f64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total: u64) -> Self {
        Self {
            sink,
            total,
            received: 0,
            last: 0.0,
        }
    }

    /// Record `len` more bytes and report the new fraction
    pub fn advance(&mut self, len: usize) {
        self.received += len as u64;
        let fraction = if self.total == 0 {
            1.0
        } else {
            (self.received as f64 / self.total as f64).clamp(0.0, 1.0)
        };
        self.emit(fraction);
    }

    /// Report completion; always ends at exactly 1.0
    pub fn finish(&mut self) {
        self.emit(1.0);
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn emit(&mut self, fraction: f64) {
        if fraction < self.last {
            return;
        }
        self.last = fraction;
        self.sink.report(fraction);
    }
}
