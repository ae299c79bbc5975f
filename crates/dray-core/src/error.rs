//! Error types and result aliases for Dray.
//!
//! Every component surfaces these kinds; the API layer owns the translation
//! to HTTP status codes. Cancellation is deliberately its own variant: it is
//! reported verbatim and never retried by the service.

use std::fmt;

/// The result type used throughout Dray.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Dray operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed request was provided (negative capacity, empty robot id,
    /// invalid status, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of what made the argument invalid.
        message: String,
    },

    /// A reservation failed because selected orders were no longer shippable
    /// at commit time. Transient; the caller may retry.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting transition.
        message: String,
    },

    /// The request deadline elapsed or the caller cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested resource was not found.
    #[error("not found: {resource_type} with id {id}")]
    NotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An invariant violation that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new not-found error.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true when the caller may retry the operation.
    ///
    /// Only reservation conflicts are transient; cancellation is reported
    /// verbatim and everything else is a hard failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
