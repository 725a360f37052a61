//! # Errors
//!
//! `ThreadError` is the taxonomy surfaced to callers; `RepoError` is what a
//! storage adapter may fail with. Every storage failure is transient from the
//! caller's point of view.

use thiserror::Error;

/// Failure reported by a persistence adapter.
#[derive(Error, Debug)]
pub enum RepoError {
    /// The backing store could not be reached or rejected the statement.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// The primary error type for thread operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// Rejected input (empty body, oversized title, malformed reference).
    #[error("validation error: {0}")]
    Validation(String),

    /// Stale, deleted or nonexistent node.
    #[error("{kind} not found with ID {id}")]
    NotFound { kind: &'static str, id: String },

    /// Caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Storage or network failure; the same request may be retried.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ThreadError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Only transient failures may be retried as-is. A `NotFound` needs a
    /// fresh assembly first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ThreadError::Transient(_))
    }

    /// Stable machine-readable code for API bodies and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ThreadError::Validation(_) => "VALIDATION_ERROR",
            ThreadError::NotFound { .. } => "NOT_FOUND",
            ThreadError::Unauthorized(_) => "UNAUTHORIZED",
            ThreadError::Transient(_) => "TRANSIENT",
        }
    }
}

impl From<RepoError> for ThreadError {
    fn from(err: RepoError) -> Self {
        ThreadError::Transient(err.to_string())
    }
}

/// Failure while resolving a bearer credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,

    #[error("invalid credentials: {0}")]
    Invalid(String),
}

/// A specialized Result type for thread operations.
pub type Result<T> = std::result::Result<T, ThreadError>;
