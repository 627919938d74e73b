//! Resource kind descriptors
//!
//! A [`ResourceKind`] is the static description the engine needs to handle
//! one type of remote resource: its identity layout and its field schema.
//! Kinds are declared as `static` tables (see [`crate::catalog`]), so adding a
//! new resource type means writing one more table, not another lifecycle.

use crate::error::{Error, Result};
use crate::identity::{IdentitySchema, ResourceIdentity};
use crate::record::{FieldKind, FieldValue, ResourceRecord};

/// Declaration of one field of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present in every desired record
    pub required: bool,
    /// Assigned by the backend; never set by callers and never diffed
    pub computed: bool,
    /// Accepted on write but possibly never echoed back by reads
    pub write_only: bool,
    /// Compared with [`crate::textdiff`] instead of exact equality
    pub suppress_equivalent: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            computed: false,
            write_only: false,
            suppress_equivalent: false,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub const fn record(name: &'static str) -> Self {
        Self::new(name, FieldKind::Record)
    }

    pub const fn document(name: &'static str) -> Self {
        Self::new(name, FieldKind::Document)
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn computed(self) -> Self {
        Self {
            computed: true,
            ..self
        }
    }

    pub const fn write_only(self) -> Self {
        Self {
            write_only: true,
            ..self
        }
    }

    /// Treat semantically equivalent documents as unchanged.
    pub const fn semantic(self) -> Self {
        Self {
            suppress_equivalent: true,
            ..self
        }
    }

    /// Whether this field takes part in drift detection.
    ///
    /// Write-only fields are compared too: a value the backend does not echo
    /// cannot be confirmed, so it shows up as drift and is written again.
    pub fn is_compared(&self) -> bool {
        !self.computed
    }

    fn accepts(&self, value: &FieldValue) -> bool {
        value.kind() == self.kind
            || (self.kind == FieldKind::Document && value.kind() == FieldKind::String)
    }
}

/// Static description of one resource type.
#[derive(Debug)]
pub struct ResourceKind {
    /// Stable kind name used in configuration and the ledger
    pub name: &'static str,
    /// One-line summary for listings
    pub summary: &'static str,
    pub schema: &'static IdentitySchema,
    pub fields: &'static [FieldSpec],
    /// Fixed leaf value for singleton children (policies are always `policy`)
    pub default_name: Option<&'static str>,
}

impl ResourceKind {
    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that participate in drift detection, in declaration order.
    pub fn compared_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_compared())
    }

    /// Parse a stored handle for this kind, tolerating backend keyword casing.
    pub fn parse_handle(&self, handle: &str) -> Result<ResourceIdentity> {
        self.schema.parse_insensitive(handle)
    }

    /// Identity of a child of `scope` named `name`.
    ///
    /// `name` may be omitted for kinds with a default leaf value.
    pub fn identity_in(
        &self,
        scope: &ResourceIdentity,
        name: Option<&str>,
    ) -> Result<ResourceIdentity> {
        let leaf = self.schema.leaf_kind();
        let value = name.or(self.default_name).ok_or_else(|| Error::InvalidRecord {
            kind: self.name.to_string(),
            message: format!("a `{leaf}` name is required"),
        })?;
        self.schema.compose(scope, leaf, value)
    }

    /// Bring a record into the shape the schema declares.
    ///
    /// Backends and configuration files cannot tell a document from a plain
    /// string, so string values of document fields are promoted.
    pub fn normalize(&self, record: ResourceRecord) -> ResourceRecord {
        let (identity, mut fields) = record.into_parts();
        for spec in self.fields.iter().filter(|f| f.kind == FieldKind::Document) {
            if let Some(FieldValue::String(text)) = fields.get_mut(spec.name) {
                let text = std::mem::take(text);
                fields.insert(spec.name.to_string(), FieldValue::Document(text));
            }
        }
        ResourceRecord::with_fields(identity, fields)
    }

    /// Check a desired record against the identity layout and field schema.
    pub fn validate(&self, record: &ResourceRecord) -> Result<()> {
        self.schema.check(record.identity())?;

        let invalid = |message: String| Error::InvalidRecord {
            kind: self.name.to_string(),
            message,
        };

        for (name, value) in record.fields() {
            let spec = self
                .field(name)
                .ok_or_else(|| invalid(format!("unknown field `{name}`")))?;
            if spec.computed {
                return Err(invalid(format!(
                    "field `{name}` is assigned by the backend and cannot be set"
                )));
            }
            if !spec.accepts(value) {
                return Err(invalid(format!(
                    "field `{name}` expects a {}, got a {}",
                    spec.kind,
                    value.kind()
                )));
            }
        }

        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| f.required && record.get(f.name).is_none())
        {
            return Err(invalid(format!("missing required field `{}`", missing.name)));
        }
        Ok(())
    }

    /// Copy write-only fields from `desired` into `live`.
    ///
    /// The backend never returns them, so the last written value is the only
    /// value there is.
    pub fn carry_write_only(
        &self,
        desired: &ResourceRecord,
        live: ResourceRecord,
    ) -> ResourceRecord {
        self.fields
            .iter()
            .filter(|f| f.write_only)
            .filter_map(|f| desired.get(f.name).map(|v| (f.name, v.clone())))
            .fold(live, |record, (name, value)| record.with_field(name, value))
    }
}
