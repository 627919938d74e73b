//! End-to-end behaviour of the reconciliation core against an in-memory backend.

use proptest::prelude::*;
use reconcile::{
    BackendGateway, CancelToken, Error, FieldValue, GatewayError, IdentitySchema,
    MemoryGateway, OperationContext, Outcome, ReadAfterWrite, ReconciliationEngine,
    ResourceRecord, SegmentSpec, catalog, textdiff,
};
use reconcile::gateway::{Call, GatewayOp};
use reconcile::textdiff::Comparison;

const SERVICE: SegmentSpec = SegmentSpec::bare("service");
const API: SegmentSpec = SegmentSpec::bare("api");
const OPERATION: SegmentSpec = SegmentSpec::bare("operation");
const BARE: IdentitySchema = IdentitySchema::new("operation", &[SERVICE, API, OPERATION]);

const POLICY_XML: &str = r#"<policies><inbound><base /><set-header name="x-env" exists-action="override"><value>prod</value></set-header></inbound></policies>"#;

fn engine(gateway: &MemoryGateway) -> ReconciliationEngine<MemoryGateway> {
    ReconciliationEngine::new(gateway.clone())
        .with_read_after_write(ReadAfterWrite::immediate(4))
}

fn api_record(name: &str) -> ResourceRecord {
    let id = catalog::API
        .schema
        .build(&["sub1", "rg1", "gw", name])
        .unwrap();
    ResourceRecord::new(id)
        .with_field("display_name", name)
        .with_field("path", name)
        .with_field("protocols", "https")
}

fn policy_record(xml: &str) -> ResourceRecord {
    let api = api_record("petstore").identity().clone();
    let id = catalog::API_POLICY.identity_in(&api, None).unwrap();
    ResourceRecord::new(id)
        .with_field("xml_content", xml)
        .with_field("xml_link", "https://example.com/policies/petstore.xml")
}

// ============================================================================
// Example scenarios
// ============================================================================

#[test]
fn scenario_bare_identity_round_trip() {
    let id = BARE.build(&["svcA", "apiB", "opC"]).unwrap();
    assert_eq!(id.format(), "svcA/apiB/opC");

    let parsed = BARE.parse("svcA/apiB/opC").unwrap();
    assert_eq!(parsed, id);
    let values: Vec<_> = parsed.segments().iter().map(|s| s.value()).collect();
    assert_eq!(values, vec!["svcA", "apiB", "opC"]);
}

#[test]
fn scenario_whitespace_only_markup_difference() {
    assert!(textdiff::equivalent("<p><a/></p>", "<p>\n  <a/>\n</p>"));
}

#[test]
fn scenario_escaped_expression_falls_back() {
    assert!(textdiff::equivalent(
        r#"<x v="@(Foo("a"))" />"#,
        r#"<x v="@(Foo(&quot;a&quot;))" />"#,
    ));
}

#[test]
fn scenario_import_guard_makes_no_put() {
    let gateway = MemoryGateway::new();
    gateway.insert(api_record("petstore"));

    let result = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API,
            &api_record("petstore"),
        )
        .unwrap();

    assert_eq!(result.outcome, Outcome::ConflictExists);
    assert_eq!(gateway.count(GatewayOp::Put), 0);
    assert_eq!(result.handle(), None);
}

#[test]
fn scenario_delete_of_missing_resource_is_absent() {
    let gateway = MemoryGateway::new();
    let id = api_record("ghost").identity().clone();

    let result = engine(&gateway)
        .delete(&OperationContext::default(), &catalog::API, &id)
        .unwrap();

    assert_eq!(result.outcome, Outcome::AlreadyAbsent);
    assert_eq!(gateway.calls(), vec![Call::Remove(id.format())]);
}

// ============================================================================
// Lifecycle properties
// ============================================================================

#[test]
fn read_and_delete_tolerate_never_created_identity() {
    let gateway = MemoryGateway::new();
    let engine = engine(&gateway);
    let ctx = OperationContext::default();
    let id = api_record("never").identity().clone();

    assert_eq!(
        engine.read(&ctx, &catalog::API, &id).unwrap().outcome,
        Outcome::AlreadyAbsent
    );
    assert_eq!(
        engine.delete(&ctx, &catalog::API, &id).unwrap().outcome,
        Outcome::AlreadyAbsent
    );
}

#[test]
fn delete_twice_is_absent_second_time() {
    let gateway = MemoryGateway::new();
    let engine = engine(&gateway);
    let ctx = OperationContext::default();
    engine
        .create(&ctx, &catalog::API, &api_record("petstore"))
        .unwrap();
    let id = api_record("petstore").identity().clone();

    assert_eq!(
        engine.delete(&ctx, &catalog::API, &id).unwrap().outcome,
        Outcome::Deleted
    );
    assert_eq!(
        engine.delete(&ctx, &catalog::API, &id).unwrap().outcome,
        Outcome::AlreadyAbsent
    );
}

#[test]
fn write_only_link_survives_re_read() {
    let gateway = MemoryGateway::new();
    let result = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API_POLICY,
            &policy_record(POLICY_XML),
        )
        .unwrap();

    let record = result.record.unwrap();
    assert_eq!(
        record.get("xml_link").and_then(FieldValue::as_str),
        Some("https://example.com/policies/petstore.xml")
    );
    assert!(result.residual.is_empty());
}

#[test]
fn reformatted_policy_is_unchanged_without_put() {
    let gateway = MemoryGateway::new();
    let engine = engine(&gateway);
    let ctx = OperationContext::default();
    engine
        .update(&ctx, &catalog::API_POLICY, &policy_record(POLICY_XML))
        .unwrap();

    let reformatted = POLICY_XML.replace("><", ">\n    <");
    let result = engine
        .update(&ctx, &catalog::API_POLICY, &policy_record(&reformatted))
        .unwrap();

    assert_eq!(result.outcome, Outcome::Unchanged);
    assert_eq!(result.drift.suppressed().count(), 1);
    assert_eq!(gateway.count(GatewayOp::Put), 1);
}

#[test]
fn changed_policy_is_updated() {
    let gateway = MemoryGateway::new();
    let engine = engine(&gateway);
    let ctx = OperationContext::default();
    engine
        .update(&ctx, &catalog::API_POLICY, &policy_record(POLICY_XML))
        .unwrap();

    let changed = POLICY_XML.replace("prod", "staging");
    let result = engine
        .update(&ctx, &catalog::API_POLICY, &policy_record(&changed))
        .unwrap();

    assert_eq!(result.outcome, Outcome::Updated);
    assert_eq!(result.drift.field_names(), "xml_content");
    assert_eq!(gateway.count(GatewayOp::Put), 2);
}

#[test]
fn changed_policy_link_is_written() {
    let gateway = MemoryGateway::new();
    let engine = engine(&gateway);
    let ctx = OperationContext::default();
    engine
        .update(&ctx, &catalog::API_POLICY, &policy_record(POLICY_XML))
        .unwrap();

    let moved = policy_record(POLICY_XML)
        .with_field("xml_link", "https://example.com/policies/petstore-v2.xml");
    let result = engine.update(&ctx, &catalog::API_POLICY, &moved).unwrap();

    assert_eq!(result.outcome, Outcome::Updated);
    assert_eq!(result.drift.field_names(), "xml_link");
    assert_eq!(gateway.count(GatewayOp::Put), 2);
    assert_eq!(
        gateway
            .get(&result.identity)
            .unwrap()
            .get("xml_link")
            .and_then(FieldValue::as_str),
        Some("https://example.com/policies/petstore-v2.xml")
    );
}

#[test]
fn eventually_visible_write_is_confirmed() {
    let gateway = MemoryGateway::new();
    gateway.delay_visibility(2);

    let result = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API,
            &api_record("slow"),
        )
        .unwrap();

    assert_eq!(result.outcome, Outcome::Created);
    // guard fetch + two hidden reads + the visible one
    assert_eq!(gateway.count(GatewayOp::Fetch), 4);
}

#[test]
fn never_visible_write_is_not_persisted() {
    let gateway = MemoryGateway::new();
    gateway.delay_visibility(100);

    let err = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API,
            &api_record("lost"),
        )
        .unwrap_err();

    assert!(matches!(err, Error::NotPersisted { attempts: 4, .. }));
    assert!(err.is_retryable());
}

#[test]
fn transport_errors_propagate_verbatim() {
    let gateway = MemoryGateway::new();
    gateway.fail_next(GatewayOp::Fetch, GatewayError::transport("connection reset"));

    let err = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API,
            &api_record("x"),
        )
        .unwrap_err();

    assert_eq!(err.to_string(), "transport error: connection reset");
    assert_eq!(gateway.count(GatewayOp::Put), 0);
}

#[test]
fn cancellation_during_re_read_is_not_absence() {
    let gateway = MemoryGateway::new();
    gateway.fail_after(GatewayOp::Fetch, 1, GatewayError::Cancelled);

    let err = engine(&gateway)
        .create(
            &OperationContext::default(),
            &catalog::API,
            &api_record("x"),
        )
        .unwrap_err();

    assert!(err.is_interrupted());
    assert!(!matches!(err, Error::NotPersisted { .. }));
    assert_eq!(gateway.count(GatewayOp::Put), 1);
    assert_eq!(gateway.count(GatewayOp::Fetch), 2);
}

#[test]
fn cancelled_context_stops_before_any_call() {
    let gateway = MemoryGateway::new();
    let token = CancelToken::new();
    let ctx = OperationContext::new().with_cancel(token.clone());
    token.cancel();

    let err = engine(&gateway)
        .read(&ctx, &catalog::API, api_record("x").identity())
        .unwrap_err();

    assert!(err.is_interrupted());
    assert!(gateway.calls().is_empty());
}

#[test]
fn malformed_handle_makes_no_calls() {
    let gateway = MemoryGateway::new();
    let err = engine(&gateway)
        .read_handle(
            &OperationContext::default(),
            &catalog::API,
            "/subscriptions/sub1/resourceGroups/rg1/apis/petstore",
        )
        .unwrap_err();

    assert!(matches!(err, Error::MalformedIdentity { .. }));
    assert!(gateway.calls().is_empty());
}

#[test]
fn gateway_is_shared_not_global() {
    let gateway = MemoryGateway::new();
    let first = engine(&gateway);
    let second = engine(&gateway);
    let ctx = OperationContext::default();

    first
        .create(&ctx, &catalog::API, &api_record("shared"))
        .unwrap();
    let seen = second
        .gateway()
        .fetch(&ctx, api_record("shared").identity())
        .unwrap();
    assert!(seen.is_some());
}

// ============================================================================
// Laws
// ============================================================================

fn segment_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9._;=-]{0,15}"
}

proptest! {
    #[test]
    fn round_trip_every_catalog_schema(values in proptest::collection::vec(segment_value(), 6)) {
        for kind in catalog::all() {
            let depth = kind.schema.depth();
            let assigned: Vec<&str> = values[..depth].iter().map(String::as_str).collect();
            let id = kind.schema.build(&assigned).unwrap();
            prop_assert_eq!(kind.schema.parse(&id.format()).unwrap(), id);
        }
    }

    #[test]
    fn round_trip_bare_schema(a in segment_value(), b in segment_value(), c in segment_value()) {
        let id = BARE.build(&[&a, &b, &c]).unwrap();
        prop_assert_eq!(BARE.parse(&id.format()).unwrap(), id);
    }

    #[test]
    fn truncate_recovers_parent(
        values in proptest::collection::vec(segment_value(), 5),
        leaf in segment_value(),
    ) {
        let assigned: Vec<&str> = values.iter().map(String::as_str).collect();
        let parent = catalog::API_OPERATION.schema.build(&assigned).unwrap();
        let child = catalog::API_OPERATION_TAG.schema.compose(&parent, "tag", &leaf).unwrap();
        prop_assert_eq!(child.truncate(parent.depth()), parent);
    }

    #[test]
    fn normalize_is_idempotent(x in ".{0,64}") {
        let once = textdiff::normalize(&x);
        prop_assert_eq!(textdiff::normalize(&once), once);
    }

    #[test]
    fn normalizing_unparseable_input_keeps_it_equivalent(
        expr in "[a-z\"&; ]{0,16}",
        name in "[a-z]{1,8}",
    ) {
        // bare text before the root element never parses as a document
        let x = format!("@({expr}) <{name}/>");
        let once = textdiff::normalize(&x);
        let is_normalized = matches!(textdiff::compare(&once, &x), Comparison::Normalized { .. });
        prop_assert!(is_normalized);
        prop_assert_eq!(
            textdiff::equivalent(&once, &x),
            textdiff::equivalent(&x, &x)
        );
    }

    #[test]
    fn normalizing_indented_markup_keeps_it_equivalent(
        root in "[a-z]{1,8}",
        empty in "[a-z]{1,8}",
        leaf in "[a-z]{1,8}",
        text in "[a-z0-9]{1,8}",
    ) {
        let x = format!("<{root}>\n  <{empty}/>\n  <{leaf}>{text}</{leaf}>\n</{root}>\n");
        let once = textdiff::normalize(&x);
        prop_assert_eq!(
            textdiff::compare(&once, &x),
            Comparison::Structural { equal: true }
        );
        prop_assert_eq!(
            textdiff::equivalent(&once, &x),
            textdiff::equivalent(&x, &x)
        );
    }

    #[test]
    fn diff_is_reflexive(x in ".{0,64}") {
        prop_assert!(textdiff::equivalent(&x, &x));
    }

    #[test]
    fn diff_is_reflexive_on_markup(
        name in "[a-z]{1,8}",
        attr in "[a-z]{1,8}",
        value in "[ -~]{0,16}",
    ) {
        let doc = format!(r#"<{name} {attr}="{value}"><child/></{name}>"#);
        prop_assert!(textdiff::equivalent(&doc, &doc));
    }
}
