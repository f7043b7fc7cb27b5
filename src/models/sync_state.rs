use std::fmt;

/// Stages of a single sync run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    Idle,
    Validating,
    Clearing,
    Downloading,
    Extracting,
    Cleanup,
    Done,
}

impl SyncStage {
    /// The stage that follows this one on success, `None` once done
    pub fn next(self) -> Option<SyncStage> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::Clearing),
            Self::Clearing => Some(Self::Downloading),
            Self::Downloading => Some(Self::Extracting),
            Self::Extracting => Some(Self::Cleanup),
            Self::Cleanup => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validation",
            Self::Clearing => "clearing",
            Self::Downloading => "download",
            Self::Extracting => "extraction",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observable state of a sync run
///
/// `Aborted` is terminal and records the stage that failed together with a
/// human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Running(SyncStage),
    Aborted { stage: SyncStage, reason: String },
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Running(SyncStage::Done) | Self::Aborted { .. }
        )
    }

    /// Check whether moving to `next` is allowed from this state
    pub fn can_transition_to(&self, next: &SyncState) -> bool {
        match (self, next) {
            (Self::Aborted { .. }, _) => false,
            (Self::Running(SyncStage::Done), _) => false,
            (Self::Running(SyncStage::Idle), Self::Aborted { .. }) => false,
            (Self::Running(_), Self::Aborted { .. }) => true,
            (Self::Running(current), Self::Running(target)) => current.next() == Some(*target),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Running(SyncStage::Idle)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running(stage) => write!(f, "{}", stage),
            Self::Aborted { stage, reason } => write!(f, "aborted during {}: {}", stage, reason),
        }
    }
}
