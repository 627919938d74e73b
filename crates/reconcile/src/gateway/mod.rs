//! Backend gateway capability
//!
//! The engine reaches the remote control plane only through
//! [`BackendGateway`]. "Not found" is part of the successful result
//! (`Ok(None)` from `fetch`, `Ok(false)` from `remove`); errors are reserved
//! for transport, authentication and rejection failures.
//!
//! # Testing
//!
//! Use [`MemoryGateway`] to reconcile against in-process state:
//!
//! ```
//! use reconcile::{BackendGateway, MemoryGateway, OperationContext};
//! use reconcile::catalog;
//!
//! let gateway = MemoryGateway::new();
//! let id = catalog::SERVICE.schema.build(&["sub", "rg", "svc"]).unwrap();
//! let found = gateway.fetch(&OperationContext::default(), &id).unwrap();
//! assert!(found.is_none());
//! ```

pub mod memory;

pub use memory::{Call, GatewayOp, MemoryGateway};

use crate::context::OperationContext;
use crate::identity::ResourceIdentity;
use crate::record::ResourceRecord;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Remote operations the engine needs, per resource.
///
/// Implementations choose how to translate their transport's "not found"
/// signal into the `Option`/`bool` convention. Every call receives the
/// operation context so deadlines and cancellation reach the transport.
pub trait BackendGateway: Send + Sync {
    /// Read the live record, `None` if the resource does not exist.
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError>;

    /// Create or replace the resource with `desired`.
    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError>;

    /// Delete the resource, `false` if it was already absent.
    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError>;
}

impl<G: BackendGateway + ?Sized> BackendGateway for Box<G> {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        (**self).fetch(ctx, id)
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        (**self).put(ctx, id, desired)
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        (**self).remove(ctx, id)
    }
}

impl<G: BackendGateway + ?Sized> BackendGateway for Arc<G> {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        (**self).fetch(ctx, id)
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        (**self).put(ctx, id, desired)
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        (**self).remove(ctx, id)
    }
}

/// Categories of failures for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS, throttling or server-side errors (transient, retryable)
    Network,
    /// Credentials missing, expired or insufficient
    Auth,
    /// The backend refused the request as invalid
    Rejected,
    /// The backend answered with something unreadable
    Format,
    /// Cancelled or past its deadline
    Interrupted,
    /// A write landed but was not yet visible to reads
    Consistency,
    /// Caller input did not fit the resource schema
    Invalid,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Consistency)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network or service availability issue",
            Self::Auth => "Authentication failed",
            Self::Rejected => "Request rejected by the backend",
            Self::Format => "Unreadable backend response",
            Self::Interrupted => "Operation interrupted",
            Self::Consistency => "Write not yet visible",
            Self::Invalid => "Invalid input",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the backend and try again",
            Self::Auth => "Refresh the credentials referenced by `backend.token_env`",
            Self::Rejected => "Fix the field values reported by the backend",
            Self::Format => "Check that the endpoint and api version are correct",
            Self::Interrupted => "Re-run the command; completed operations are not repeated",
            Self::Consistency => "Wait a moment and run `show` to confirm the resource exists",
            Self::Invalid => "Fix the identity or record in the configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Failures reported by a [`BackendGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connection-level or transient server failure
    #[error("transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// Authentication or authorization failure
    #[error("authentication failed: {message}")]
    Auth {
        /// Error message
        message: String,
    },

    /// The backend refused the request
    #[error("backend rejected request (HTTP {status}): {message}")]
    Remote {
        /// Status code returned by the backend
        status: u16,
        /// Error message from the backend
        message: String,
    },

    /// The response could not be decoded
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The operation deadline passed
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before giving up
        elapsed: Duration,
    },

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Transport { .. } => ErrorCategory::Network,
            GatewayError::Auth { .. } => ErrorCategory::Auth,
            GatewayError::Remote { .. } => ErrorCategory::Rejected,
            GatewayError::InvalidResponse(_) => ErrorCategory::Format,
            GatewayError::Timeout { .. } | GatewayError::Cancelled => ErrorCategory::Interrupted,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
