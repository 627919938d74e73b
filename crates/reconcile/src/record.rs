//! Desired and live resource records

use crate::identity::ResourceIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name to value mapping, ordered for stable rendering.
pub type Fields = BTreeMap<String, FieldValue>;

/// The closed set of value kinds a field may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Bool,
    Number,
    Record,
    /// Opaque text document (policy markup and similar)
    Document,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Number => "number",
            FieldKind::Record => "record",
            FieldKind::Document => "document",
        };
        f.write_str(name)
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Number(f64),
    Record(Fields),
    Document(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Record(_) => FieldKind::Record,
            FieldValue::Document(_) => FieldKind::Document,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Fields> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&str> {
        match self {
            FieldValue::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Text of a string or document value.
    pub fn text(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) | FieldValue::Document(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self {
        FieldValue::Record(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s:?}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Record(r) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str(" }")
            }
            FieldValue::Document(d) => write!(f, "<document, {} bytes>", d.len()),
        }
    }
}

/// Desired or live state of one resource.
///
/// Records are never edited in place; the builder methods consume the
/// record and return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    identity: ResourceIdentity,
    fields: Fields,
}

impl ResourceRecord {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            fields: Fields::new(),
        }
    }

    pub fn with_fields(identity: ResourceIdentity, fields: Fields) -> Self {
        Self { identity, fields }
    }

    /// Return a copy with `name` set to `value`.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Return a copy addressed by `identity`.
    pub fn with_identity(mut self, identity: ResourceIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn into_parts(self) -> (ResourceIdentity, Fields) {
        (self.identity, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentitySchema, SegmentSpec};

    const SCHEMA: IdentitySchema = IdentitySchema::new("api", &[SegmentSpec::bare("api")]);

    #[test]
    fn test_builder_returns_new_record() {
        let id = SCHEMA.build(&["petstore"]).unwrap();
        let base = ResourceRecord::new(id);
        let with_path = base.clone().with_field("path", "pets");

        assert!(base.get("path").is_none());
        assert_eq!(with_path.get("path").and_then(FieldValue::as_str), Some("pets"));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from(3_i64).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Document("<a/>".into()).text(), Some("<a/>"));
        assert_eq!(FieldValue::from("x").as_document(), None);
        assert_eq!(FieldValue::from("x").kind(), FieldKind::String);
    }

    #[test]
    fn test_display() {
        let mut nested = Fields::new();
        nested.insert("name".into(), "ops".into());
        nested.insert("email".into(), "ops@example.com".into());
        assert_eq!(
            FieldValue::Record(nested).to_string(),
            r#"{ email = "ops@example.com", name = "ops" }"#
        );
        assert_eq!(
            FieldValue::Document("<p/>".into()).to_string(),
            "<document, 4 bytes>"
        );
    }

    #[test]
    fn test_serde_is_tagged() {
        let json = serde_json::to_string(&FieldValue::Document("<p/>".into())).unwrap();
        assert_eq!(json, r#"{"type":"document","value":"<p/>"}"#);
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldValue::Document("<p/>".into()));
    }
}
