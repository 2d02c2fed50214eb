use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for Runway operations.
///
/// Each kind describes one category of failure so callers can branch on it
/// without parsing messages. The kinds fall into the groups the migration
/// engine reports on:
///
/// * integrity errors abort an invocation before any mutation,
/// * execution errors fail one migration and halt its batch,
/// * lock timeouts abort an invocation without touching state,
/// * journal and handler errors never change the data-level outcome.
///
/// # Examples
///
/// ```rust
/// use runway::errors::{ErrorKind, RunwayError, RunwayResult};
///
/// fn example() -> RunwayResult<()> {
///     Err(RunwayError::new("Duplicate migration version 3", ErrorKind::DuplicateVersion))
/// }
///
/// assert!(example().unwrap_err().is_integrity_error());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Integrity Errors - fatal, raised before any mutation
    /// Generic history integrity violation
    IntegrityError,
    /// Two migration definitions declare the same version
    DuplicateVersion,
    /// The applied history or the known numbering has a hole
    VersionGap,
    /// An applied migration no longer hashes to its persisted checksum
    DriftDetected,

    // Execution Errors - per migration, the atomic scope is rolled back
    /// A command of the upgrade or downgrade sequence failed
    ExecutionError,
    /// A business rule guarding a migration process is broken
    BusinessRuleBroken,
    /// The migration has no downgrade commands
    IrreversibleMigration,

    // Concurrency Errors
    /// The global migration lock could not be acquired within its bound
    LockTimeout,

    // Observability Errors - never affect the migration outcome
    /// The audit journal rejected an entry
    JournalWriteError,
    /// An event handler failed
    HandlerError,

    // Store Errors
    /// Opening, committing or rolling back an atomic scope failed
    TransactionError,
    /// Error from a storage backend
    BackendError,
    /// Collection does not exist
    CollectionNotFound,
    /// Collection already exists
    CollectionAlreadyExists,

    // Generic Errors
    /// The requested resource was not found
    NotFound,
    /// The operation is not valid in the current state
    InvalidOperation,
    /// Invalid argument or configuration value
    ValidationError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::IntegrityError => write!(f, "Integrity error"),
            ErrorKind::DuplicateVersion => write!(f, "Duplicate version"),
            ErrorKind::VersionGap => write!(f, "Version gap"),
            ErrorKind::DriftDetected => write!(f, "Drift detected"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
            ErrorKind::BusinessRuleBroken => write!(f, "Business rule broken"),
            ErrorKind::IrreversibleMigration => write!(f, "Irreversible migration"),
            ErrorKind::LockTimeout => write!(f, "Lock timeout"),
            ErrorKind::JournalWriteError => write!(f, "Journal write error"),
            ErrorKind::HandlerError => write!(f, "Handler error"),
            ErrorKind::TransactionError => write!(f, "Transaction error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::CollectionAlreadyExists => write!(f, "Collection already exists"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Runway error type.
///
/// `RunwayError` carries a message, a kind and an optional cause, and
/// captures a backtrace at construction. Clones share the backtrace.
#[derive(Clone)]
pub struct RunwayError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<RunwayError>>,
    backtrace: Arc<Backtrace>,
}

impl RunwayError {
    /// Creates a new `RunwayError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        RunwayError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `RunwayError` wrapping the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: RunwayError) -> Self {
        RunwayError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&RunwayError> {
        self.cause.as_deref()
    }

    /// Returns the innermost error of the cause chain.
    pub fn root_cause(&self) -> &RunwayError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }

    /// Returns `true` for the kinds that abort an invocation before any mutation
    /// because the migration history itself cannot be trusted.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::IntegrityError
                | ErrorKind::DuplicateVersion
                | ErrorKind::VersionGap
                | ErrorKind::DriftDetected
        )
    }

    /// Returns `true` for the kinds that fail a single migration's atomic scope.
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::ExecutionError
                | ErrorKind::BusinessRuleBroken
                | ErrorKind::IrreversibleMigration
        )
    }
}

impl Display for RunwayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for RunwayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl PartialEq for RunwayError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.error_kind == other.error_kind
            && self.cause == other.cause
    }
}

impl Error for RunwayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Runway operations.
pub type RunwayResult<T> = Result<T, RunwayError>;

impl From<anyhow::Error> for RunwayError {
    fn from(err: anyhow::Error) -> Self {
        // keep an existing runway error intact when it was boxed into anyhow
        match err.downcast::<RunwayError>() {
            Ok(runway_error) => runway_error,
            Err(err) => RunwayError::new(&format!("{:#}", err), ErrorKind::ExecutionError),
        }
    }
}

impl From<std::fmt::Error> for RunwayError {
    fn from(err: std::fmt::Error) -> Self {
        RunwayError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}

impl From<std::num::TryFromIntError> for RunwayError {
    fn from(err: std::num::TryFromIntError) -> Self {
        RunwayError::new(
            &format!("Integer conversion error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<chrono::ParseError> for RunwayError {
    fn from(err: chrono::ParseError) -> Self {
        RunwayError::new(
            &format!("Timestamp parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<String> for RunwayError {
    fn from(msg: String) -> Self {
        RunwayError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for RunwayError {
    fn from(msg: &str) -> Self {
        RunwayError::new(msg, ErrorKind::InternalError)
    }
}
