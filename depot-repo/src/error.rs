//! Structured error types for depot-repo.
//!
//! Library consumers match on these; the `depot` binary wraps them in `anyhow`
//! at the edges. Every backend failure keeps its `sqlx::Error` as the source.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Main error type for repository operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad configuration, detected before any network I/O
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The pool could not be opened or never became ready
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The cluster-wide migration lock could not be taken
    #[error(transparent)]
    Lock(LockError),

    /// Schema migration failed (rolled back or irrecoverable)
    #[error(transparent)]
    Migration(MigrationError),

    /// No row matches a key-based read or write
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Generic backend failure on a CRUD call
    #[error("storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A sub-repository was requested before `start()` succeeded
    #[error("repository is not started")]
    NotStarted,

    /// `start()` was called on a repository that is already running
    #[error("repository is already started")]
    AlreadyStarted,
}

/// Result type alias for depot-repo operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a not found error
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Adapter for `map_err` on CRUD statements.
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage { operation, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<MigrationError> for Error {
    fn from(e: MigrationError) -> Self {
        match e {
            MigrationError::Lock(lock) => Self::Lock(lock),
            other => Self::Migration(other),
        }
    }
}

impl From<LockError> for Error {
    fn from(e: LockError) -> Self {
        Self::Lock(e)
    }
}

/// Validation error for settings and migration sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field does not parse or has a bad shape
    InvalidFormat { field: &'static str, reason: String },

    /// Numeric field outside its allowed range
    OutOfRange { field: &'static str, reason: String },

    /// Unknown enumerated value
    InvalidVariant { field: &'static str, value: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} is required", field),
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
            Self::OutOfRange { field, reason } => write!(f, "{} out of range: {}", field, reason),
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure to obtain a usable connection pool
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("database {instance} not ready after {waited:?}: {source}")]
    NotReady {
        instance: String,
        waited: Duration,
        #[source]
        source: sqlx::Error,
    },

    #[error("database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

/// The migration lock could not be acquired (or was lost)
#[derive(Error, Debug)]
#[error("could not acquire migration lock {key}: {source}")]
pub struct LockError {
    pub key: i64,
    #[source]
    pub source: sqlx::Error,
}

/// Why a single migration step (forward or reverse) did not complete
#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Statement(#[from] sqlx::Error),

    #[error("migration deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("schema at version {found} after rollback, expected {expected}")]
    VersionMismatch { expected: i64, found: i64 },
}

/// Migration run failure
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Versions not strictly increasing, duplicated or non-positive
    #[error("invalid migration set: {reason}")]
    Invalid { reason: String },

    #[error(transparent)]
    Lock(#[from] LockError),

    /// Tracking table could not be created or read; nothing was changed
    #[error("schema tracking table unavailable: {0}")]
    Store(#[source] sqlx::Error),

    /// A forward step failed and the schema was rolled back to `rolled_back_to`
    #[error(
        "migration {version} ({description}) failed, schema rolled back to version {rolled_back_to}: {cause}"
    )]
    Failed {
        version: i64,
        description: &'static str,
        rolled_back_to: i64,
        #[source]
        cause: StepError,
    },

    /// A forward step failed and so did the rollback
    #[error(
        "irrecoverable: migration {version} failed ({cause}) and rollback stalled at version {rollback_version} ({rollback}); schema may be inconsistent, manual intervention required"
    )]
    Irrecoverable {
        version: i64,
        rollback_version: i64,
        cause: StepError,
        #[source]
        rollback: StepError,
    },
}

impl MigrationError {
    /// True when the schema may be left in an inconsistent state.
    pub fn is_irrecoverable(&self) -> bool {
        matches!(self, Self::Irrecoverable { .. })
    }
}
