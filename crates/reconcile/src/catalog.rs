//! Built-in API gateway resource kinds
//!
//! Every kind is scoped under a gateway service, which itself lives in a
//! subscription and resource group:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ApiManagement/service/{svc}
//!     /apis/{api}
//!         /operations/{op}
//!             /tags/{tag}
//!             /policies/policy
//!         /policies/policy
//!     /products/{product}
//!         /apis/{api}
//!     /gateways/{gateway}
//!     /backends/{backend}
//!     /namedValues/{name}
//!     /policies/policy
//! ```

use crate::error::{Error, Result};
use crate::identity::{IdentitySchema, SegmentSpec};
use crate::kind::{FieldSpec, ResourceKind};

const SUBSCRIPTION: SegmentSpec = SegmentSpec::keyed("subscription", "subscriptions");
const RESOURCE_GROUP: SegmentSpec = SegmentSpec::keyed("resourceGroup", "resourceGroups");
const SERVICE_SEGMENT: SegmentSpec =
    SegmentSpec::keyed("service", "providers/Microsoft.ApiManagement/service");
const API_SEGMENT: SegmentSpec = SegmentSpec::keyed("api", "apis");
const OPERATION_SEGMENT: SegmentSpec = SegmentSpec::keyed("operation", "operations");
const TAG_SEGMENT: SegmentSpec = SegmentSpec::keyed("tag", "tags");
const POLICY_SEGMENT: SegmentSpec = SegmentSpec::keyed("policy", "policies");
const PRODUCT_SEGMENT: SegmentSpec = SegmentSpec::keyed("product", "products");
const GATEWAY_SEGMENT: SegmentSpec = SegmentSpec::keyed("gateway", "gateways");
const BACKEND_SEGMENT: SegmentSpec = SegmentSpec::keyed("backend", "backends");
const NAMED_VALUE_SEGMENT: SegmentSpec = SegmentSpec::keyed("namedValue", "namedValues");

/// Leaf value of every policy resource.
pub const POLICY_NAME: &str = "policy";

// ============================================================================
// Identity layouts
// ============================================================================

static SERVICE_SCHEMA: IdentitySchema = IdentitySchema::new(
    "service",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT],
);

static SERVICE_POLICY_SCHEMA: IdentitySchema = IdentitySchema::new(
    "service_policy",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT, POLICY_SEGMENT],
);

static API_SCHEMA: IdentitySchema = IdentitySchema::new(
    "api",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT, API_SEGMENT],
);

static API_POLICY_SCHEMA: IdentitySchema = IdentitySchema::new(
    "api_policy",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        API_SEGMENT,
        POLICY_SEGMENT,
    ],
);

static API_OPERATION_SCHEMA: IdentitySchema = IdentitySchema::new(
    "api_operation",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        API_SEGMENT,
        OPERATION_SEGMENT,
    ],
);

static API_OPERATION_TAG_SCHEMA: IdentitySchema = IdentitySchema::new(
    "api_operation_tag",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        API_SEGMENT,
        OPERATION_SEGMENT,
        TAG_SEGMENT,
    ],
);

static API_OPERATION_POLICY_SCHEMA: IdentitySchema = IdentitySchema::new(
    "api_operation_policy",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        API_SEGMENT,
        OPERATION_SEGMENT,
        POLICY_SEGMENT,
    ],
);

static PRODUCT_SCHEMA: IdentitySchema = IdentitySchema::new(
    "product",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT, PRODUCT_SEGMENT],
);

static PRODUCT_API_SCHEMA: IdentitySchema = IdentitySchema::new(
    "product_api",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        PRODUCT_SEGMENT,
        API_SEGMENT,
    ],
);

static GATEWAY_SCHEMA: IdentitySchema = IdentitySchema::new(
    "gateway",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT, GATEWAY_SEGMENT],
);

static BACKEND_SCHEMA: IdentitySchema = IdentitySchema::new(
    "backend",
    &[SUBSCRIPTION, RESOURCE_GROUP, SERVICE_SEGMENT, BACKEND_SEGMENT],
);

static NAMED_VALUE_SCHEMA: IdentitySchema = IdentitySchema::new(
    "named_value",
    &[
        SUBSCRIPTION,
        RESOURCE_GROUP,
        SERVICE_SEGMENT,
        NAMED_VALUE_SEGMENT,
    ],
);

// ============================================================================
// Field tables
// ============================================================================

const SERVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("location").required(),
    FieldSpec::string("publisher_name").required(),
    FieldSpec::string("publisher_email").required(),
    FieldSpec::string("sku_name").required(),
    FieldSpec::string("notification_sender_email"),
    FieldSpec::record("tags"),
    FieldSpec::string("gateway_url").computed(),
    FieldSpec::string("portal_url").computed(),
    FieldSpec::string("etag").computed(),
];

const POLICY_FIELDS: &[FieldSpec] = &[
    FieldSpec::document("xml_content").semantic(),
    FieldSpec::string("xml_link").write_only(),
    FieldSpec::string("etag").computed(),
];

const API_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("display_name").required(),
    FieldSpec::string("path").required(),
    FieldSpec::string("protocols").required(),
    FieldSpec::string("revision"),
    FieldSpec::string("description"),
    FieldSpec::string("service_url"),
    FieldSpec::boolean("subscription_required"),
    FieldSpec::string("version"),
    FieldSpec::string("version_set_id"),
    FieldSpec::record("subscription_key_parameter_names"),
    FieldSpec::record("contact"),
    FieldSpec::boolean("is_current").computed(),
    FieldSpec::boolean("is_online").computed(),
    FieldSpec::string("etag").computed(),
];

const API_OPERATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("display_name").required(),
    FieldSpec::string("method").required(),
    FieldSpec::string("url_template").required(),
    FieldSpec::string("description"),
    FieldSpec::record("request"),
    FieldSpec::record("response"),
    FieldSpec::string("etag").computed(),
];

const API_OPERATION_TAG_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("display_name").required(),
    FieldSpec::string("etag").computed(),
];

const PRODUCT_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("display_name").required(),
    FieldSpec::boolean("published").required(),
    FieldSpec::boolean("subscription_required"),
    FieldSpec::boolean("approval_required"),
    FieldSpec::number("subscriptions_limit"),
    FieldSpec::string("description"),
    FieldSpec::string("terms"),
    FieldSpec::string("etag").computed(),
];

const LINK_FIELDS: &[FieldSpec] = &[FieldSpec::string("etag").computed()];

const GATEWAY_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("description"),
    FieldSpec::record("location_data").required(),
    FieldSpec::string("etag").computed(),
];

const BACKEND_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("protocol").required(),
    FieldSpec::string("url").required(),
    FieldSpec::string("description"),
    FieldSpec::string("title"),
    FieldSpec::string("resource_id"),
    FieldSpec::record("credentials"),
    FieldSpec::record("tls"),
    FieldSpec::string("etag").computed(),
];

const NAMED_VALUE_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("display_name").required(),
    FieldSpec::string("value").required().write_only(),
    FieldSpec::boolean("secret"),
    FieldSpec::string("etag").computed(),
];

// ============================================================================
// Kinds
// ============================================================================

pub static SERVICE: ResourceKind = ResourceKind {
    name: "service",
    summary: "API gateway service instance",
    schema: &SERVICE_SCHEMA,
    fields: SERVICE_FIELDS,
    default_name: None,
};

pub static SERVICE_POLICY: ResourceKind = ResourceKind {
    name: "service_policy",
    summary: "Policy document applied to every API of a service",
    schema: &SERVICE_POLICY_SCHEMA,
    fields: POLICY_FIELDS,
    default_name: Some(POLICY_NAME),
};

pub static API: ResourceKind = ResourceKind {
    name: "api",
    summary: "API published through a service",
    schema: &API_SCHEMA,
    fields: API_FIELDS,
    default_name: None,
};

pub static API_POLICY: ResourceKind = ResourceKind {
    name: "api_policy",
    summary: "Policy document applied to every operation of an API",
    schema: &API_POLICY_SCHEMA,
    fields: POLICY_FIELDS,
    default_name: Some(POLICY_NAME),
};

pub static API_OPERATION: ResourceKind = ResourceKind {
    name: "api_operation",
    summary: "Single operation of an API",
    schema: &API_OPERATION_SCHEMA,
    fields: API_OPERATION_FIELDS,
    default_name: None,
};

pub static API_OPERATION_TAG: ResourceKind = ResourceKind {
    name: "api_operation_tag",
    summary: "Tag attached to an API operation",
    schema: &API_OPERATION_TAG_SCHEMA,
    fields: API_OPERATION_TAG_FIELDS,
    default_name: None,
};

pub static API_OPERATION_POLICY: ResourceKind = ResourceKind {
    name: "api_operation_policy",
    summary: "Policy document applied to one API operation",
    schema: &API_OPERATION_POLICY_SCHEMA,
    fields: POLICY_FIELDS,
    default_name: Some(POLICY_NAME),
};

pub static PRODUCT: ResourceKind = ResourceKind {
    name: "product",
    summary: "Product grouping APIs for subscription",
    schema: &PRODUCT_SCHEMA,
    fields: PRODUCT_FIELDS,
    default_name: None,
};

pub static PRODUCT_API: ResourceKind = ResourceKind {
    name: "product_api",
    summary: "Link making an API part of a product",
    schema: &PRODUCT_API_SCHEMA,
    fields: LINK_FIELDS,
    default_name: None,
};

pub static GATEWAY: ResourceKind = ResourceKind {
    name: "gateway",
    summary: "Self-hosted gateway registration",
    schema: &GATEWAY_SCHEMA,
    fields: GATEWAY_FIELDS,
    default_name: None,
};

pub static BACKEND: ResourceKind = ResourceKind {
    name: "backend",
    summary: "Backend service that APIs forward to",
    schema: &BACKEND_SCHEMA,
    fields: BACKEND_FIELDS,
    default_name: None,
};

pub static NAMED_VALUE: ResourceKind = ResourceKind {
    name: "named_value",
    summary: "Named value referenced from policies",
    schema: &NAMED_VALUE_SCHEMA,
    fields: NAMED_VALUE_FIELDS,
    default_name: None,
};

static ALL: [&ResourceKind; 12] = [
    &SERVICE,
    &SERVICE_POLICY,
    &API,
    &API_POLICY,
    &API_OPERATION,
    &API_OPERATION_TAG,
    &API_OPERATION_POLICY,
    &PRODUCT,
    &PRODUCT_API,
    &GATEWAY,
    &BACKEND,
    &NAMED_VALUE,
];

/// Every built-in kind, parents before children.
pub fn all() -> &'static [&'static ResourceKind] {
    &ALL
}

/// Find a kind by name.
pub fn lookup(name: &str) -> Option<&'static ResourceKind> {
    ALL.iter().copied().find(|k| k.name == name)
}

/// Find a kind by name, failing with [`Error::UnknownKind`].
pub fn require(name: &str) -> Result<&'static ResourceKind> {
    lookup(name).ok_or_else(|| Error::UnknownKind(name.to_string()))
}

/// Guess the kind of a canonical identity string.
///
/// Tries every kind's schema and returns the one that parses `input`.
/// Keyword casing is not significant.
pub fn detect(input: &str) -> Option<&'static ResourceKind> {
    ALL.iter()
        .copied()
        .find(|k| k.schema.parse_insensitive(input).is_ok())
}
