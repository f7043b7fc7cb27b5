// State management module
//
// Tracks the state machine of the running sync behind Arc<RwLock<T>> and
// broadcasts transitions so a front end can follow along without polling.

use crate::models::{SyncStage, SyncState};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Events emitted when the sync state changes
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// A new run started from idle
    Started,

    /// The run moved from one stage to the next
    StageChanged { from: SyncStage, to: SyncStage },

    /// Download progress as a fraction in [0, 1]
    Progress(f64),

    /// The run reached `Done` or was aborted. Emitted once per run.
    Finished { state: SyncState },
}

/// Capacity of the event channel; a run emits at most ~110 events
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct Inner {
    current: SyncState,
    history: Vec<SyncState>,
    /// Last whole percent broadcast as progress in this run
    progress_percent: Option<u32>,
}

/// Thread-safe holder of the current [`SyncState`] with event emission
///
/// Transitions are validated against [`SyncState::can_transition_to`];
/// illegal ones are logged and ignored.
pub struct StateManager {
    inner: Arc<RwLock<Inner>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl StateManager {
    /// Create a new StateManager in the idle state
    ///
    /// Progress is broadcast at most once per whole percent, so one run fits
    /// in the channel buffer even if a subscriber only reads at the end.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                current: SyncState::default(),
                history: vec![SyncState::default()],
                progress_percent: None,
            })),
            event_tx,
        }
    }

    /// Current state
    pub fn snapshot(&self) -> SyncState {
        self.read().current.clone()
    }

    /// Every state the current run has passed through, starting at idle
    pub fn history(&self) -> Vec<SyncState> {
        self.read().history.clone()
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Whether a run is in progress (past idle, not yet terminal)
    pub fn is_running(&self) -> bool {
        let state = self.snapshot();
        !state.is_terminal() && state != SyncState::Running(SyncStage::Idle)
    }

    /// Return to idle so a new run can start.
    ///
    /// Returns `false` if a run is still in progress.
    pub fn reset(&self) -> bool {
        let mut inner = self.write();
        if !Self::is_free(&inner.current) {
            tracing::warn!("Refusing to reset while sync is {}", inner.current);
            return false;
        }

        Self::restart(&mut inner);
        drop(inner);

        let _ = self.event_tx.send(SyncEvent::Started);
        true
    }

    /// Claim the manager for a new run, moving straight to `Validating`.
    ///
    /// The check and the move happen under one lock, so of several callers
    /// racing here exactly one gets `true`.
    pub fn begin(&self) -> bool {
        let mut inner = self.write();
        if !Self::is_free(&inner.current) {
            tracing::warn!("Refusing to start while sync is {}", inner.current);
            return false;
        }

        Self::restart(&mut inner);
        let validating = SyncState::Running(SyncStage::Validating);
        inner.current = validating.clone();
        inner.history.push(validating);
        drop(inner);

        tracing::debug!("Sync state {} -> {}", SyncStage::Idle, SyncStage::Validating);
        let _ = self.event_tx.send(SyncEvent::Started);
        let _ = self.event_tx.send(SyncEvent::StageChanged {
            from: SyncStage::Idle,
            to: SyncStage::Validating,
        });
        true
    }

    /// Idle, or a finished run
    fn is_free(state: &SyncState) -> bool {
        state.is_terminal() || *state == SyncState::Running(SyncStage::Idle)
    }

    fn restart(inner: &mut Inner) {
        inner.current = SyncState::default();
        inner.history = vec![SyncState::default()];
        inner.progress_percent = None;
    }

    /// Move to `next`, emitting the matching event.
    ///
    /// Returns `false` if the transition is not allowed from the current state.
    pub fn transition(&self, next: SyncState) -> bool {
        let mut inner = self.write();
        let previous = inner.current.clone();

        if !previous.can_transition_to(&next) {
            tracing::warn!("Ignoring invalid sync transition {} -> {}", previous, next);
            return false;
        }

        tracing::debug!("Sync state {} -> {}", previous, next);
        inner.current = next.clone();
        inner.history.push(next.clone());
        drop(inner);

        // Ignore send errors - it's OK if no one is listening
        if let (SyncState::Running(from), SyncState::Running(to)) = (&previous, &next) {
            let _ = self.event_tx.send(SyncEvent::StageChanged {
                from: *from,
                to: *to,
            });
        }
        if next.is_terminal() {
            let _ = self.event_tx.send(SyncEvent::Finished { state: next });
        }

        true
    }

    /// Broadcast a download progress fraction.
    ///
    /// Coalesced to whole percents: a fraction is only sent when its percent
    /// differs from the last one sent in this run.
    pub fn report_progress(&self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        {
            let mut inner = self.write();
            if inner.progress_percent == Some(percent) {
                return;
            }
            inner.progress_percent = Some(percent);
        }
        let _ = self.event_tx.send(SyncEvent::Progress(fraction));
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same state and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            event_tx: self.event_tx.clone(),
        }
    }
}
