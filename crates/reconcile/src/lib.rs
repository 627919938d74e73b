//! # Reconcile
//!
//! Idempotent reconciliation of hierarchical remote resources.
//!
//! This crate provides the pieces a provisioning tool needs to converge
//! resources on a remote control plane to a declared desired state, without
//! duplicating work and without adopting resources it does not own.
//!
//! ## Core Concepts
//!
//! - **ResourceIdentity**: A typed path of segments (`/subscriptions/{sub}/.../apis/{api}`)
//!   with a lossless string form
//! - **ResourceKind**: A static descriptor of one resource type: identity
//!   layout plus field schema
//! - **DriftReport**: Field-level differences between desired and live records,
//!   with semantic comparison for markup documents
//! - **ReconciliationEngine**: Create/read/update/delete lifecycle with an
//!   import guard and read-after-write confirmation
//! - **ExecutionPlan**: Many operations ordered parents-first and run in parallel
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     catalog, MemoryGateway, OperationContext, Outcome, ReadAfterWrite,
//!     ReconciliationEngine, ResourceRecord,
//! };
//!
//! let engine = ReconciliationEngine::new(MemoryGateway::new())
//!     .with_read_after_write(ReadAfterWrite::immediate(3));
//! let ctx = OperationContext::default();
//!
//! let id = catalog::API
//!     .schema
//!     .parse("/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/gw/apis/petstore")
//!     .unwrap();
//! let desired = ResourceRecord::new(id)
//!     .with_field("display_name", "Pet Store")
//!     .with_field("path", "pets")
//!     .with_field("protocols", "https");
//!
//! let first = engine.create(&ctx, &catalog::API, &desired).unwrap();
//! assert_eq!(first.outcome, Outcome::Created);
//!
//! // Creating again never adopts the existing resource.
//! let second = engine.create(&ctx, &catalog::API, &desired).unwrap();
//! assert_eq!(second.outcome, Outcome::ConflictExists);
//! ```
//!
//! ## Provider Traits
//!
//! - [`BackendGateway`]: Reaches the remote control plane
//! - [`ProgressCallback`]: Receives progress updates during plan execution
//!
//! The core performs no I/O of its own and imposes no timeout; transports,
//! credentials and deadlines belong to the caller.

pub mod catalog;
pub mod context;
pub mod drift;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod identity;
pub mod kind;
pub mod outcome;
pub mod planner;
pub mod record;
pub mod textdiff;

// Re-export main types at crate root
pub use context::{CancelToken, NoProgress, OperationContext, ProgressCallback};
pub use drift::{Change, DriftReport, FieldChange};
pub use engine::{Plan, PlannedAction, ReadAfterWrite, ReconciliationEngine, WriteMode};
pub use error::{Error, Result};
pub use executor::{
    ExecuteOptions, ExecuteReport, OperationReport, OperationStatus, execute, execute_simple,
};
pub use gateway::{BackendGateway, ErrorCategory, GatewayError, MemoryGateway};
pub use identity::{IdentitySchema, ResourceIdentity, Segment, SegmentSpec};
pub use kind::{FieldSpec, ResourceKind};
pub use outcome::{ExecuteSummary, Outcome, Reconciliation};
pub use planner::{Action, ExecutionPlan, Operation};
pub use record::{FieldKind, FieldValue, Fields, ResourceRecord};
