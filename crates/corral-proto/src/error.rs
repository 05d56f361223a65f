//! Error payloads returned by the registry API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::admission::Rejection;

/// Structured error codes.
///
/// Callers branch on these rather than on message text. `AlreadyExists` on
/// register is expected while an agent retries its startup and should not
/// be treated as fatal; `NoCapacity` is an actionable signal to queue or
/// back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A live cluster with that name exists.
    AlreadyExists,
    /// Unknown or deleted cluster.
    NotFound,
    /// No cluster can take the workload.
    NoCapacity,
    /// Malformed request or forbidden state change.
    InvalidArgument,
    /// Backing store unreachable; retry with backoff.
    StorageUnavailable,
    /// The operation ran out of time; its outcome is unknown.
    DeadlineExceeded,
    /// Unexpected server error.
    Internal,
}

impl ErrorCode {
    /// Returns the code name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::NoCapacity => "no_capacity",
            Self::InvalidArgument => "invalid_argument",
            Self::StorageUnavailable => "storage_unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Internal => "internal",
        }
    }

    /// Returns true if the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::DeadlineExceeded)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code.
    pub code: ErrorCode,
    /// Error message.
    pub message: String,
    /// Per-cluster admission diagnostics, for `NoCapacity`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejection>,
}

impl ErrorBody {
    /// Creates an error body without diagnostics.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            rejections: Vec::new(),
        }
    }
}
