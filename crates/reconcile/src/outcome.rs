//! Reconciliation outcomes and execution summaries

use crate::drift::DriftReport;
use crate::identity::ResourceIdentity;
use crate::record::ResourceRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a lifecycle operation did to the remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Resource did not exist and was created
    Created,
    /// Resource existed with drift and was rewritten
    Updated,
    /// Resource already matched; nothing was written
    Unchanged,
    /// Resource was removed
    Deleted,
    /// Resource was not there to read or remove
    AlreadyAbsent,
    /// A create found an unmanaged resource at the target identity
    ConflictExists,
}

impl Outcome {
    /// Check if the outcome represents a change to the remote side
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }

    /// Whether dependents of this resource may proceed.
    pub fn unblocks_children(&self) -> bool {
        !matches!(self, Self::ConflictExists)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::AlreadyAbsent => "already absent",
            Self::ConflictExists => "already exists",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one engine operation.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub outcome: Outcome,
    /// Canonical identity, taken from the backend's answer when it had one
    pub identity: ResourceIdentity,
    /// Live record after the operation, `None` when the resource is gone
    pub record: Option<ResourceRecord>,
    /// Differences that led to the write (or to the conflict)
    pub drift: DriftReport,
    /// Differences still visible after the write landed
    pub residual: DriftReport,
}

impl Reconciliation {
    pub fn new(outcome: Outcome, identity: ResourceIdentity) -> Self {
        Self {
            outcome,
            identity,
            record: None,
            drift: DriftReport::default(),
            residual: DriftReport::default(),
        }
    }

    pub fn with_record(mut self, record: ResourceRecord) -> Self {
        self.identity = record.identity().clone();
        self.record = Some(record);
        self
    }

    pub fn with_drift(mut self, drift: DriftReport) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_residual(mut self, residual: DriftReport) -> Self {
        self.residual = residual;
        self
    }

    /// The handle the caller should persist, `None` when it must be cleared.
    pub fn handle(&self) -> Option<String> {
        match self.outcome {
            Outcome::Deleted | Outcome::AlreadyAbsent | Outcome::ConflictExists => None,
            _ => Some(self.identity.format()),
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub absent: usize,
    pub conflicts: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (no failures, no conflicts)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.conflicts == 0
    }

    /// Total number of operations processed
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.unchanged
            + self.deleted
            + self.absent
            + self.conflicts
            + self.skipped
            + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.absent += other.absent;
        self.conflicts += other.conflicts;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::AlreadyAbsent => self.absent += 1,
            Outcome::ConflictExists => self.conflicts += 1,
        }
    }
}
