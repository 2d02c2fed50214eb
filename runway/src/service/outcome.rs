use crate::errors::RunwayError;
use crate::migration::Direction;
use std::fmt::{Display, Formatter};

/// States a mutating invocation passes through.
///
/// `Idle -> LockAcquired -> Resolving -> Executing -> {Committed, Aborted} -> LockReleased`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    LockAcquired,
    Resolving,
    Executing,
    Committed,
    Aborted,
    LockReleased,
}

impl Display for InvocationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InvocationState::Idle => "idle",
            InvocationState::LockAcquired => "lock-acquired",
            InvocationState::Resolving => "resolving",
            InvocationState::Executing => "executing",
            InvocationState::Committed => "committed",
            InvocationState::Aborted => "aborted",
            InvocationState::LockReleased => "lock-released",
        };
        write!(f, "{}", name)
    }
}

/// An audit append that failed after its migration committed.
///
/// The migration itself stays applied (or reverted); only the audit trail
/// is missing the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalWarning {
    pub version: u64,
    pub direction: Direction,
    pub error: RunwayError,
}

impl Display for JournalWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "audit entry for {} of migration {} was not written: {}",
            self.direction, self.version, self.error
        )
    }
}

/// Result of a mutating [MigrationService](crate::service::MigrationService) call.
///
/// `completed` lists the versions applied (or reverted) in execution order.
/// When a migration failed, `failed_at` and `error` name it and nothing after
/// it was attempted. Earlier migrations of the batch stay committed.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub direction: Direction,
    pub completed: Vec<u64>,
    pub failed_at: Option<u64>,
    pub error: Option<RunwayError>,
    pub warnings: Vec<JournalWarning>,
    /// Set when a cancellation stopped the batch before its end.
    pub cancelled: bool,
    /// `Committed` or `Aborted`.
    pub state: InvocationState,
}

impl MigrationOutcome {
    pub(crate) fn new(direction: Direction) -> Self {
        MigrationOutcome {
            direction,
            completed: Vec::new(),
            failed_at: None,
            error: None,
            warnings: Vec::new(),
            cancelled: false,
            state: InvocationState::Idle,
        }
    }

    /// Returns `true` if no migration of the batch failed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` if nothing was applied or reverted and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.completed.is_empty() && self.failed_at.is_none()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
