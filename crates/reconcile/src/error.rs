//! Error types for reconciliation operations.
//!
//! Identity and descriptor errors are programmer or configuration mistakes:
//! they are never retried. Backend errors are carried through unchanged so
//! the caller can decide whether the failed call is safe to repeat.

use crate::gateway::{ErrorCategory, GatewayError};
use thiserror::Error;

/// Errors surfaced by the reconciliation core.
#[derive(Debug, Error)]
pub enum Error {
    /// A handle string or segment value does not fit the kind's schema
    #[error("malformed {kind} identity `{input}`: {reason}")]
    MalformedIdentity {
        /// Schema (resource kind) the input was checked against
        kind: String,
        /// The offending input
        input: String,
        /// What did not match
        reason: String,
    },

    /// Composition was attempted under a parent of the wrong shape
    #[error("invalid parent for {kind}: expected segments {expected}, found {found}")]
    InvalidParent {
        /// Schema being composed into
        kind: String,
        /// Segment kinds the parent should have held
        expected: String,
        /// Segment kinds the parent actually held
        found: String,
    },

    /// A record does not satisfy its kind's field declarations
    #[error("invalid {kind} record: {message}")]
    InvalidRecord {
        /// Resource kind
        kind: String,
        /// Description of the violation
        message: String,
    },

    /// No descriptor is registered under this name
    #[error("unknown resource kind `{0}`")]
    UnknownKind(String),

    /// The write succeeded but the resource never became readable
    #[error("{id} was written but could not be read back after {attempts} attempts")]
    NotPersisted {
        /// Canonical identity of the written resource
        id: String,
        /// Number of re-read attempts made
        attempts: u32,
    },

    /// The worker pool for parallel execution could not be started
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),

    /// Backend failure, propagated verbatim
    #[error(transparent)]
    Backend(#[from] GatewayError),
}

impl Error {
    /// Error category for retry logic.
    ///
    /// Only backend errors can be retryable; everything else is a mistake
    /// in the caller's input.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Backend(e) => e.category(),
            Error::NotPersisted { .. } => ErrorCategory::Consistency,
            _ => ErrorCategory::Invalid,
        }
    }

    /// Whether repeating the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the operation was stopped by cancellation or deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Error::Backend(GatewayError::Cancelled | GatewayError::Timeout { .. })
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_are_not_retryable() {
        let err = Error::MalformedIdentity {
            kind: "api".into(),
            input: "x".into(),
            reason: "bad".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Invalid);

        let err = Error::InvalidParent {
            kind: "api".into(),
            expected: "[service]".into(),
            found: "[]".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_backend_errors_keep_their_category() {
        let err = Error::from(GatewayError::Transport {
            message: "connection reset".into(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "transport error: connection reset");

        let err = Error::from(GatewayError::Auth {
            message: "expired token".into(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_interrupted() {
        assert!(Error::from(GatewayError::Cancelled).is_interrupted());
        assert!(!Error::UnknownKind("x".into()).is_interrupted());
    }
}
