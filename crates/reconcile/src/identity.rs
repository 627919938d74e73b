//! Hierarchical resource identity codec
//!
//! A [`ResourceIdentity`] is an ordered path of segments from a root scope
//! down to a leaf resource. Each resource kind declares an immutable
//! [`IdentitySchema`] describing the segment kinds it expects and the keyword
//! tokens that introduce them in the canonical string form:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ApiManagement/service/{svc}/apis/{api}
//! ```
//!
//! Schemas whose segments carry no keyword format as bare relative paths
//! (`svcA/apiB/opC`). A leading separator is emitted iff the first segment has
//! a keyword, so formatting depends only on the segment sequence.

use crate::error::{Error, Result};
use std::fmt;

/// Separator between tokens of the canonical form.
pub const SEPARATOR: char = '/';

/// One position in an identity schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentSpec {
    /// Segment kind, e.g. `service` or `api`
    pub kind: &'static str,
    /// Keyword tokens preceding the value, e.g. `apis` or
    /// `providers/Microsoft.ApiManagement/service`
    pub keyword: Option<&'static str>,
}

impl SegmentSpec {
    /// A segment rendered as its value only.
    pub const fn bare(kind: &'static str) -> Self {
        Self {
            kind,
            keyword: None,
        }
    }

    /// A segment introduced by one or more keyword tokens.
    pub const fn keyed(kind: &'static str, keyword: &'static str) -> Self {
        Self {
            kind,
            keyword: Some(keyword),
        }
    }

    fn keyword_tokens(&self) -> impl Iterator<Item = &'static str> {
        self.keyword.into_iter().flat_map(|k| k.split(SEPARATOR))
    }
}

/// How keyword tokens are matched while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordCase {
    Exact,
    Insensitive,
}

impl KeywordCase {
    fn matches(self, expected: &str, found: &str) -> bool {
        match self {
            Self::Exact => expected == found,
            Self::Insensitive => expected.eq_ignore_ascii_case(found),
        }
    }
}

/// The fixed segment layout of one resource kind.
#[derive(Debug, PartialEq, Eq)]
pub struct IdentitySchema {
    /// Name used in error messages (usually the resource kind)
    pub name: &'static str,
    /// Segments from root to leaf
    pub segments: &'static [SegmentSpec],
}

impl IdentitySchema {
    pub const fn new(name: &'static str, segments: &'static [SegmentSpec]) -> Self {
        Self { name, segments }
    }

    /// Number of segments in a complete identity of this schema.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Kind of the final segment.
    pub fn leaf_kind(&self) -> &'static str {
        self.segments.last().map(|s| s.kind).unwrap_or_default()
    }

    /// Position of a segment kind within the schema.
    pub fn position(&self, kind: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.kind == kind)
    }

    /// Parse a canonical identity string.
    ///
    /// Accepts exactly what [`ResourceIdentity::format`] produces for an
    /// identity of this schema.
    pub fn parse(&self, input: &str) -> Result<ResourceIdentity> {
        parse_segments(self.name, self.segments, input, KeywordCase::Exact)
    }

    /// Parse an identity, accepting keyword tokens in any ASCII case.
    ///
    /// The returned identity always formats with the schema's canonical
    /// keyword casing. Segment values keep their casing.
    pub fn parse_insensitive(&self, input: &str) -> Result<ResourceIdentity> {
        parse_segments(self.name, self.segments, input, KeywordCase::Insensitive)
    }

    /// Build the depth-1 identity holding only the root segment.
    pub fn root(&self, value: &str) -> Result<ResourceIdentity> {
        let spec = self.segments.first().ok_or_else(|| Error::MalformedIdentity {
            kind: self.name.to_string(),
            input: value.to_string(),
            reason: "schema has no segments".to_string(),
        })?;
        Ok(ResourceIdentity {
            segments: vec![Segment::new(self.name, *spec, value)?],
        })
    }

    /// Append one segment to `parent`.
    ///
    /// `parent` must hold exactly the segments this schema expects before
    /// `leaf_kind`; anything else is an [`Error::InvalidParent`].
    pub fn compose(
        &self,
        parent: &ResourceIdentity,
        leaf_kind: &str,
        value: &str,
    ) -> Result<ResourceIdentity> {
        let invalid_parent = |expected: String| Error::InvalidParent {
            kind: self.name.to_string(),
            expected,
            found: parent.describe(),
        };

        let position = self
            .position(leaf_kind)
            .ok_or_else(|| invalid_parent(format!("a schema containing `{leaf_kind}`")))?;

        let expected = &self.segments[..position];
        if !parent.matches_specs(expected) {
            return Err(invalid_parent(describe_specs(expected)));
        }

        let mut segments = parent.segments.clone();
        segments.push(Segment::new(self.name, self.segments[position], value)?);
        Ok(ResourceIdentity { segments })
    }

    /// Build a complete identity from one value per segment, root first.
    pub fn build(&self, values: &[&str]) -> Result<ResourceIdentity> {
        if values.len() != self.depth() {
            return Err(Error::MalformedIdentity {
                kind: self.name.to_string(),
                input: values.join(", "),
                reason: format!(
                    "expected {} segment values, got {}",
                    self.depth(),
                    values.len()
                ),
            });
        }
        let segments = self
            .segments
            .iter()
            .zip(values)
            .map(|(spec, value)| Segment::new(self.name, *spec, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResourceIdentity { segments })
    }

    /// Whether `identity` is a complete identity of this schema.
    pub fn accepts(&self, identity: &ResourceIdentity) -> bool {
        identity.matches_specs(self.segments)
    }

    /// Fail with [`Error::MalformedIdentity`] unless `identity` is complete
    /// for this schema.
    pub fn check(&self, identity: &ResourceIdentity) -> Result<()> {
        if self.accepts(identity) {
            Ok(())
        } else {
            Err(Error::MalformedIdentity {
                kind: self.name.to_string(),
                input: identity.format(),
                reason: format!(
                    "expected segments {}, got {}",
                    describe_specs(self.segments),
                    identity.describe()
                ),
            })
        }
    }
}

/// One (kind, value) pair of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    spec: SegmentSpec,
    value: String,
}

impl Segment {
    fn new(schema: &str, spec: SegmentSpec, value: &str) -> Result<Self> {
        let reason = if value.is_empty() {
            Some(format!("empty value for `{}`", spec.kind))
        } else if value.contains(SEPARATOR) {
            Some(format!(
                "value for `{}` contains the separator `{SEPARATOR}`",
                spec.kind
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::MalformedIdentity {
                kind: schema.to_string(),
                input: value.to_string(),
                reason,
            }),
            None => Ok(Self {
                spec,
                value: value.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.spec.kind
    }

    pub fn keyword(&self) -> Option<&'static str> {
        self.spec.keyword
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A hierarchical handle addressing one remote resource.
///
/// Immutable once constructed. Equality compares segment kinds, keywords
/// and values, so an identity recovered by [`truncate`](Self::truncate) equals
/// the one composed independently from the same parent fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    segments: Vec<Segment>,
}

impl ResourceIdentity {
    /// Canonical string form.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 || segment.spec.keyword.is_some() {
                out.push(SEPARATOR);
            }
            if let Some(keyword) = segment.spec.keyword {
                out.push_str(keyword);
                out.push(SEPARATOR);
            }
            out.push_str(&segment.value);
        }
        out
    }

    /// Ancestor identity holding the first `depth` segments.
    ///
    /// Callers validate `depth` against the schema; a depth past the end
    /// returns the identity unchanged.
    pub fn truncate(&self, depth: usize) -> Self {
        let depth = depth.min(self.segments.len());
        Self {
            segments: self.segments[..depth].to_vec(),
        }
    }

    /// Immediate parent scope, or `None` for a root identity.
    pub fn parent(&self) -> Option<Self> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(self.truncate(n - 1)),
        }
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Re-parse a string using this identity's segment layout.
    ///
    /// Backends echo ids with their own keyword casing; this recovers the
    /// canonical form without knowing the resource kind.
    pub fn reparse(&self, input: &str) -> Result<Self> {
        let specs: Vec<SegmentSpec> = self.segments.iter().map(|s| s.spec).collect();
        parse_segments(
            self.leaf().map(Segment::kind).unwrap_or("identity"),
            &specs,
            input,
            KeywordCase::Insensitive,
        )
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn leaf(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Value of the leaf segment (the resource's own name).
    pub fn name(&self) -> &str {
        self.leaf().map(Segment::value).unwrap_or_default()
    }

    /// Value of the first segment of the given kind.
    pub fn value_of(&self, kind: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.spec.kind == kind)
            .map(Segment::value)
    }

    fn matches_specs(&self, specs: &[SegmentSpec]) -> bool {
        self.segments.len() == specs.len()
            && self.segments.iter().zip(specs).all(|(s, spec)| s.spec == *spec)
    }

    fn describe(&self) -> String {
        let kinds: Vec<&str> = self.segments.iter().map(Segment::kind).collect();
        format!("[{}]", kinds.join(", "))
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn describe_specs(specs: &[SegmentSpec]) -> String {
    let kinds: Vec<&str> = specs.iter().map(|s| s.kind).collect();
    format!("[{}]", kinds.join(", "))
}

fn parse_segments(
    name: &str,
    specs: &[SegmentSpec],
    input: &str,
    case: KeywordCase,
) -> Result<ResourceIdentity> {
    let malformed = |reason: String| Error::MalformedIdentity {
        kind: name.to_string(),
        input: input.to_string(),
        reason,
    };

    if input.is_empty() {
        return Err(malformed("empty identity".to_string()));
    }

    let rooted = specs.first().is_some_and(|s| s.keyword.is_some());
    let body = if rooted {
        input
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| malformed(format!("expected leading `{SEPARATOR}`")))?
    } else {
        input
    };

    let mut tokens = body.split(SEPARATOR);
    let mut segments = Vec::with_capacity(specs.len());

    for spec in specs {
        for expected in spec.keyword_tokens() {
            match tokens.next() {
                Some(found) if case.matches(expected, found) => {}
                Some(found) => {
                    return Err(malformed(format!(
                        "expected `{expected}` but found `{found}`"
                    )));
                }
                None => return Err(malformed(format!("missing `{expected}` token"))),
            }
        }

        let value = tokens
            .next()
            .ok_or_else(|| malformed(format!("missing value for `{}`", spec.kind)))?;
        if value.is_empty() {
            return Err(malformed(format!("empty value for `{}`", spec.kind)));
        }

        segments.push(Segment {
            spec: *spec,
            value: value.to_string(),
        });
    }

    if let Some(extra) = tokens.next() {
        return Err(malformed(format!("unexpected trailing token `{extra}`")));
    }

    Ok(ResourceIdentity { segments })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: SegmentSpec = SegmentSpec::bare("service");
    const API: SegmentSpec = SegmentSpec::bare("api");
    const OPERATION: SegmentSpec = SegmentSpec::bare("operation");
    const BARE: IdentitySchema = IdentitySchema::new("operation", &[SERVICE, API, OPERATION]);
    const BARE_API: IdentitySchema = IdentitySchema::new("api", &[SERVICE, API]);

    const SUBSCRIPTION: SegmentSpec = SegmentSpec::keyed("subscription", "subscriptions");
    const RESOURCE_GROUP: SegmentSpec = SegmentSpec::keyed("resourceGroup", "resourceGroups");
    const KEYED_SERVICE: SegmentSpec =
        SegmentSpec::keyed("service", "providers/Microsoft.ApiManagement/service");
    const KEYED_API: SegmentSpec = SegmentSpec::keyed("api", "apis");
    const ARM: IdentitySchema = IdentitySchema::new(
        "api",
        &[SUBSCRIPTION, RESOURCE_GROUP, KEYED_SERVICE, KEYED_API],
    );

    const ARM_ID: &str = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/svc1/apis/petstore";

    #[test]
    fn test_bare_schema_formats_as_relative_path() {
        let id = BARE.build(&["svcA", "apiB", "opC"]).unwrap();
        assert_eq!(id.format(), "svcA/apiB/opC");
        assert_eq!(BARE.parse("svcA/apiB/opC").unwrap(), id);
    }

    #[test]
    fn test_keyed_schema_round_trip() {
        let id = ARM.parse(ARM_ID).unwrap();
        assert_eq!(id.format(), ARM_ID);
        assert_eq!(id.value_of("resourceGroup"), Some("rg1"));
        assert_eq!(id.name(), "petstore");
        assert_eq!(id.to_string(), ARM_ID);
    }

    #[test]
    fn test_parse_rejects_missing_keyword() {
        let err = ARM
            .parse("/subscriptions/0000/resourceGroups/rg1/service/svc1/apis/petstore")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        assert!(BARE.parse("svcA/apiB").is_err());
        assert!(BARE.parse("svcA/apiB/opC/extra").is_err());
        assert!(BARE.parse("svcA/apiB/opC/").is_err());
        assert!(BARE.parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_values() {
        assert!(BARE.parse("svcA//opC").is_err());
        assert!(ARM.parse(&ARM_ID.replace("/rg1/", "//")).is_err());
    }

    #[test]
    fn test_parse_requires_leading_separator_for_keyed_schema() {
        assert!(ARM.parse(ARM_ID.trim_start_matches('/')).is_err());
    }

    #[test]
    fn test_keyword_case_is_exact_unless_insensitive() {
        let lowered = ARM_ID
            .replace("resourceGroups", "resourcegroups")
            .replace("Microsoft.ApiManagement", "microsoft.apimanagement");

        assert!(ARM.parse(&lowered).is_err());

        let id = ARM.parse_insensitive(&lowered).unwrap();
        assert_eq!(id.format(), ARM_ID);
    }

    #[test]
    fn test_insensitive_parse_keeps_value_casing() {
        let id = ARM
            .parse_insensitive(&ARM_ID.replace("petstore", "PetStore"))
            .unwrap();
        assert_eq!(id.name(), "PetStore");
    }

    #[test]
    fn test_compose_then_truncate_recovers_parent() {
        let parent = BARE_API.build(&["svcA", "apiB"]).unwrap();
        let child = BARE.compose(&parent, "operation", "opC").unwrap();

        assert_eq!(child.format(), "svcA/apiB/opC");
        assert_eq!(child.truncate(parent.depth()), parent);
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn test_compose_chain_from_root() {
        let root = ARM.root("0000").unwrap();
        let rg = ARM.compose(&root, "resourceGroup", "rg1").unwrap();
        let svc = ARM.compose(&rg, "service", "svc1").unwrap();
        let api = ARM.compose(&svc, "api", "petstore").unwrap();

        assert_eq!(api.format(), ARM_ID);
        assert!(ARM.accepts(&api));
        assert!(!ARM.accepts(&svc));
    }

    #[test]
    fn test_compose_rejects_wrong_parent() {
        let service_only = BARE_API.root("svcA").unwrap();
        let err = BARE.compose(&service_only, "operation", "opC").unwrap_err();
        assert!(matches!(err, Error::InvalidParent { .. }));

        let unknown = BARE.compose(&service_only, "tag", "t1").unwrap_err();
        assert!(matches!(unknown, Error::InvalidParent { .. }));
    }

    #[test]
    fn test_compose_rejects_separator_in_value() {
        let parent = BARE_API.build(&["svcA", "apiB"]).unwrap();
        let err = BARE.compose(&parent, "operation", "op/C").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));
    }

    #[test]
    fn test_truncate_past_end_is_identity() {
        let id = BARE.build(&["a", "b", "c"]).unwrap();
        assert_eq!(id.truncate(10), id);
        assert_eq!(id.truncate(0).format(), "");
    }

    #[test]
    fn test_ancestor_relation() {
        let op = BARE.build(&["a", "b", "c"]).unwrap();
        let api = op.truncate(2);
        assert!(api.is_ancestor_of(&op));
        assert!(!op.is_ancestor_of(&api));
        assert!(!op.is_ancestor_of(&op));
    }

    #[test]
    fn test_reparse_canonicalizes_backend_casing() {
        let requested = ARM.parse(ARM_ID).unwrap();
        // all segment values in ARM_ID are already lowercase
        let echoed = ARM_ID.to_lowercase();
        let canonical = requested.reparse(&echoed).unwrap();
        assert_eq!(canonical, requested);
        assert_eq!(canonical.format(), ARM_ID);
    }

    #[test]
    fn test_check_reports_shape_mismatch() {
        let id = BARE_API.build(&["svcA", "apiB"]).unwrap();
        assert!(BARE.check(&id).is_err());
        assert!(BARE_API.check(&id).is_ok());
    }
}
