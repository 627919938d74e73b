//! Field-level drift between desired and live records
//!
//! Drift is computed only over fields the desired record sets and the kind
//! does not mark as computed. Fields the backend adds on its own never count
//! as drift. A write-only field the backend does not echo counts as added.

use crate::kind::{FieldSpec, ResourceKind};
use crate::record::{FieldValue, ResourceRecord};
use crate::textdiff;
use std::fmt;

/// How one field differs.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The live record does not have the field
    Added { desired: FieldValue },
    /// The live value differs
    Modified {
        live: FieldValue,
        desired: FieldValue,
    },
    /// Textually different documents that compare as semantically equal
    Equivalent {
        live: FieldValue,
        desired: FieldValue,
    },
}

/// A difference in one named field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub change: Change,
}

impl FieldChange {
    /// Whether applying the desired value would change the resource.
    pub fn is_material(&self) -> bool {
        !matches!(self.change, Change::Equivalent { .. })
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.change {
            Change::Added { desired } => write!(f, "{}: + {desired}", self.field),
            Change::Modified { live, desired } => {
                write!(f, "{}: {live} -> {desired}", self.field)
            }
            Change::Equivalent { .. } => write!(f, "{}: (equivalent)", self.field),
        }
    }
}

/// All field differences between a desired and a live record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    pub changes: Vec<FieldChange>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report for a resource that does not exist yet: every set field is added.
    pub fn creation(kind: &ResourceKind, desired: &ResourceRecord) -> Self {
        let changes = desired
            .fields()
            .iter()
            .filter(|(name, _)| kind.field(name).is_some_and(|f| !f.computed))
            .map(|(name, value)| FieldChange {
                field: name.clone(),
                change: Change::Added {
                    desired: value.clone(),
                },
            })
            .collect();
        Self { changes }
    }

    /// Whether any change would alter the resource.
    pub fn has_drift(&self) -> bool {
        self.changes.iter().any(FieldChange::is_material)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes that would alter the resource.
    pub fn material(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(|c| c.is_material())
    }

    /// Fields whose difference was suppressed as semantically equivalent.
    pub fn suppressed(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(|c| !c.is_material())
    }

    /// Names of materially changed fields, comma separated.
    pub fn field_names(&self) -> String {
        self.material()
            .map(|c| c.field.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compare `desired` against `live` field by field.
pub fn compute(
    kind: &ResourceKind,
    desired: &ResourceRecord,
    live: &ResourceRecord,
) -> DriftReport {
    let changes = kind
        .compared_fields()
        .filter_map(|spec| {
            let wanted = desired.get(spec.name)?;
            compare_field(spec, wanted, live.get(spec.name)).map(|change| FieldChange {
                field: spec.name.to_string(),
                change,
            })
        })
        .collect();
    DriftReport { changes }
}

fn compare_field(
    spec: &FieldSpec,
    desired: &FieldValue,
    live: Option<&FieldValue>,
) -> Option<Change> {
    let Some(live) = live else {
        return Some(Change::Added {
            desired: desired.clone(),
        });
    };

    if let (Some(a), Some(b)) = (live.text(), desired.text()) {
        if a == b {
            return None;
        }
        if spec.suppress_equivalent && textdiff::equivalent(a, b) {
            log::debug!("{} differs only in formatting", spec.name);
            return Some(Change::Equivalent {
                live: live.clone(),
                desired: desired.clone(),
            });
        }
    } else if live == desired {
        return None;
    }

    Some(Change::Modified {
        live: live.clone(),
        desired: desired.clone(),
    })
}
