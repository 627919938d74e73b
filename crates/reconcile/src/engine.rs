//! Reconciliation engine
//!
//! Drives the lifecycle of one resource against a [`BackendGateway`]:
//!
//! 1. **Plan**: validate the desired record and fetch the live one
//! 2. **Guard**: refuse to adopt an existing resource on create
//! 3. **Write**: put the desired record only when there is material drift
//! 4. **Confirm**: re-read until the write is visible, then report residual drift
//!
//! Reads and deletes treat "not found" as a successful
//! [`Outcome::AlreadyAbsent`] so a stale handle can be cleared without error.

use crate::context::OperationContext;
use crate::drift::{self, DriftReport};
use crate::error::{Error, Result};
use crate::gateway::BackendGateway;
use crate::identity::ResourceIdentity;
use crate::kind::ResourceKind;
use crate::outcome::{Outcome, Reconciliation};
use crate::record::ResourceRecord;
use std::time::Duration;

/// Whether a write may adopt a resource that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// The resource must not exist yet (import guard)
    #[default]
    CreateNew,
    /// Create or converge whatever is there
    Upsert,
}

/// Polling policy for confirming a write is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadAfterWrite {
    /// Total fetch attempts after a put, at least one
    pub attempts: u32,
    /// Delay before the second attempt
    pub delay: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_factor: f64,
    /// Upper bound on a single delay
    pub max_delay: Duration,
}

impl Default for ReadAfterWrite {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReadAfterWrite {
    /// Poll `attempts` times without waiting in between.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay after the given (0-based) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// What a write would do, computed without writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update,
    NoChange,
    /// Create refused because the resource already exists
    Conflict,
}

/// A planned write for one resource.
#[derive(Debug, Clone)]
pub struct Plan {
    pub action: PlannedAction,
    /// Normalized and validated desired record
    pub desired: ResourceRecord,
    /// Live record, if the resource exists
    pub live: Option<ResourceRecord>,
    pub drift: DriftReport,
}

impl Plan {
    pub fn identity(&self) -> &ResourceIdentity {
        self.desired.identity()
    }
}

/// Converges remote resources to desired records.
pub struct ReconciliationEngine<G> {
    gateway: G,
    read_after_write: ReadAfterWrite,
}

impl<G: BackendGateway> ReconciliationEngine<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            read_after_write: ReadAfterWrite::default(),
        }
    }

    pub fn with_read_after_write(mut self, policy: ReadAfterWrite) -> Self {
        self.read_after_write = policy;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Create a resource that must not exist yet.
    ///
    /// An existing resource is reported as [`Outcome::ConflictExists`] and
    /// left untouched; adopting it requires an explicit import.
    pub fn create(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        desired: &ResourceRecord,
    ) -> Result<Reconciliation> {
        self.apply(ctx, kind, desired, WriteMode::CreateNew)
    }

    /// Converge a resource to `desired`, creating it if needed.
    pub fn update(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        desired: &ResourceRecord,
    ) -> Result<Reconciliation> {
        self.apply(ctx, kind, desired, WriteMode::Upsert)
    }

    /// Compute what a write would do without writing.
    pub fn plan(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        desired: &ResourceRecord,
        mode: WriteMode,
    ) -> Result<Plan> {
        let desired = kind.normalize(desired.clone());
        kind.validate(&desired)?;

        let live = self.fetch(ctx, kind, desired.identity())?;
        let (action, drift) = match (&live, mode) {
            (None, _) => (
                PlannedAction::Create,
                DriftReport::creation(kind, &desired),
            ),
            (Some(live), WriteMode::CreateNew) => {
                (PlannedAction::Conflict, drift::compute(kind, &desired, live))
            }
            (Some(live), WriteMode::Upsert) => {
                let drift = drift::compute(kind, &desired, live);
                let action = if drift.has_drift() {
                    PlannedAction::Update
                } else {
                    PlannedAction::NoChange
                };
                (action, drift)
            }
        };

        Ok(Plan {
            action,
            desired,
            live,
            drift,
        })
    }

    /// Plan and, if needed, write one resource.
    pub fn apply(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        desired: &ResourceRecord,
        mode: WriteMode,
    ) -> Result<Reconciliation> {
        let plan = self.plan(ctx, kind, desired, mode)?;
        let id = plan.identity().clone();

        let outcome = match plan.action {
            PlannedAction::Conflict => {
                log::warn!("{id} already exists and is not managed here; import it to adopt it");
                let mut result = Reconciliation::new(Outcome::ConflictExists, id);
                result.record = plan.live;
                return Ok(result.with_drift(plan.drift));
            }
            PlannedAction::NoChange => {
                log::debug!("{id} is up to date");
                let live = plan.live.unwrap_or_else(|| plan.desired.clone());
                let live = kind.carry_write_only(&plan.desired, live);
                return Ok(Reconciliation::new(Outcome::Unchanged, id)
                    .with_record(live)
                    .with_drift(plan.drift));
            }
            PlannedAction::Create => Outcome::Created,
            PlannedAction::Update => Outcome::Updated,
        };

        let verb = if outcome == Outcome::Created {
            "creating"
        } else {
            "updating"
        };
        log::info!("{verb} {} {id}", kind.name);
        ctx.check()?;
        self.gateway.put(ctx, &id, &plan.desired)?;

        let live = self.read_after_write(ctx, kind, &id)?;
        let live = kind.carry_write_only(&plan.desired, live);
        let residual = drift::compute(kind, &plan.desired, &live);
        if residual.has_drift() {
            log::warn!(
                "{id} still differs after write in: {}",
                residual.field_names()
            );
        }

        Ok(Reconciliation::new(outcome, id)
            .with_record(live)
            .with_drift(plan.drift)
            .with_residual(residual))
    }

    /// Read the live state of a resource.
    ///
    /// A missing resource is [`Outcome::AlreadyAbsent`], telling the caller
    /// to clear its handle.
    pub fn read(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &ResourceIdentity,
    ) -> Result<Reconciliation> {
        kind.schema.check(id)?;
        match self.fetch(ctx, kind, id)? {
            Some(live) => {
                Ok(Reconciliation::new(Outcome::Unchanged, id.clone()).with_record(live))
            }
            None => {
                log::info!("{id} no longer exists");
                Ok(Reconciliation::new(Outcome::AlreadyAbsent, id.clone()))
            }
        }
    }

    /// Remove a resource; removing a missing resource succeeds.
    pub fn delete(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &ResourceIdentity,
    ) -> Result<Reconciliation> {
        kind.schema.check(id)?;
        ctx.check()?;
        if self.gateway.remove(ctx, id)? {
            log::info!("deleted {} {id}", kind.name);
            Ok(Reconciliation::new(Outcome::Deleted, id.clone()))
        } else {
            log::debug!("{id} was already gone");
            Ok(Reconciliation::new(Outcome::AlreadyAbsent, id.clone()))
        }
    }

    /// [`read`](Self::read) from a persisted handle string.
    pub fn read_handle(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        handle: &str,
    ) -> Result<Reconciliation> {
        let id = kind.parse_handle(handle)?;
        self.read(ctx, kind, &id)
    }

    /// [`delete`](Self::delete) from a persisted handle string.
    pub fn delete_handle(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        handle: &str,
    ) -> Result<Reconciliation> {
        let id = kind.parse_handle(handle)?;
        self.delete(ctx, kind, &id)
    }

    fn fetch(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>> {
        ctx.check()?;
        let Some(live) = self.gateway.fetch(ctx, id)? else {
            return Ok(None);
        };
        let live = if kind.schema.accepts(live.identity()) {
            live
        } else {
            log::warn!(
                "backend returned identity {} for {id}; keeping the requested one",
                live.identity()
            );
            live.with_identity(id.clone())
        };
        Ok(Some(kind.normalize(live)))
    }

    fn read_after_write(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &ResourceIdentity,
    ) -> Result<ResourceRecord> {
        let policy = self.read_after_write;
        let attempts = policy.attempts.max(1);

        for attempt in 0..attempts {
            if let Some(live) = self.fetch(ctx, kind, id)? {
                return Ok(live);
            }
            if attempt + 1 < attempts {
                let mut delay = policy.delay_for_attempt(attempt);
                if let Some(remaining) = ctx.remaining() {
                    delay = delay.min(remaining);
                }
                log::debug!(
                    "{id} not visible yet (attempt {}/{attempts}), waiting {delay:?}",
                    attempt + 1
                );
                ctx.sleep(delay)?;
            }
        }

        Err(Error::NotPersisted {
            id: id.format(),
            attempts,
        })
    }
}
