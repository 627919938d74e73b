//! # Gateway
//!
//! [`BackendGateway`](reconcile::BackendGateway) implementations for the
//! reconcile engine.
//!
//! - [`HttpGateway`]: JSON over HTTP against an ARM-style control plane
//! - [`FileGateway`]: A local JSON state file, for rehearsing a configuration
//!   without touching a live backend
//! - [`RetryingGateway`]: Wraps any gateway and retries transient read and
//!   delete failures with exponential backoff
//!
//! ## Example
//!
//! ```no_run
//! use gateway::{HttpConfig, HttpGateway, RetryConfig, RetryingGateway};
//! use reconcile::ReconciliationEngine;
//!
//! let http = HttpGateway::new(HttpConfig::new("https://management.example.com"));
//! let engine = ReconciliationEngine::new(RetryingGateway::new(http, RetryConfig::default()));
//! ```

pub mod file;
pub mod http;
pub mod retry;
pub mod wire;

pub use file::FileGateway;
pub use http::{HttpConfig, HttpGateway};
pub use retry::{LogCallback, NoCallback, RetryCallback, RetryConfig, RetryingGateway, with_retry};
