//! Error types for the scheduler.

use corral_proto::{ClusterState, ErrorCode, Rejection};
use thiserror::Error;

/// Scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A live cluster with the name already exists.
    #[error("cluster already exists: {0}")]
    AlreadyExists(String),

    /// Cluster unknown or soft-deleted.
    #[error("cluster not found: {0}")]
    NotFound(String),

    /// No available cluster admits the workload.
    #[error("no capacity: {} cluster(s) rejected the workload", rejections.len())]
    NoCapacity {
        /// Why each candidate refused.
        rejections: Vec<Rejection>,
    },

    /// Malformed or out-of-range request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Forbidden state change.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: ClusterState,
        /// Requested state.
        to: ClusterState,
    },

    /// Backing store failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// The operation did not finish in time. Its effect is unknown.
    #[error("deadline exceeded: {operation}")]
    DeadlineExceeded {
        /// Operation name.
        operation: &'static str,
    },

    /// Error reported by a remote registry.
    #[error("{code}: {message}")]
    Remote {
        /// Error code from the response body.
        code: ErrorCode,
        /// Error message from the response body.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Structured code reported to API callers.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NoCapacity { .. } => ErrorCode::NoCapacity,
            Self::InvalidArgument(_) | Self::InvalidStateTransition { .. } => {
                ErrorCode::InvalidArgument
            }
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            Self::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Self::Remote { code, .. } => *code,
            Self::Config(_)
            | Self::Serialisation(_)
            | Self::Http(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<figment::Error> for SchedulerError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialisation(e.to_string())
    }
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
