//! The reconcile engine running against a state file.

use gateway::{FileGateway, RetryConfig, RetryingGateway};
use reconcile::{
    ExecuteOptions, ExecutionPlan, Operation, OperationContext, Outcome, ReadAfterWrite,
    ReconciliationEngine, ResourceRecord, catalog, execute_simple,
};
use tempfile::TempDir;

const SERVICE: &str =
    "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/gw";

fn engine(dir: &TempDir) -> ReconciliationEngine<RetryingGateway<FileGateway>> {
    let file = FileGateway::new(dir.path().join("state.json"));
    ReconciliationEngine::new(RetryingGateway::new(file, RetryConfig::no_retry()))
        .with_read_after_write(ReadAfterWrite::immediate(2))
}

fn service() -> ResourceRecord {
    let id = catalog::SERVICE.schema.parse(SERVICE).unwrap();
    ResourceRecord::new(id)
        .with_field("location", "westeurope")
        .with_field("publisher_name", "Contoso")
        .with_field("publisher_email", "api@contoso.example")
        .with_field("sku_name", "Developer_1")
}

fn api() -> ResourceRecord {
    let id = catalog::API
        .schema
        .parse(&format!("{SERVICE}/apis/petstore"))
        .unwrap();
    ResourceRecord::new(id)
        .with_field("display_name", "Pet Store")
        .with_field("path", "pets")
        .with_field("protocols", "https")
}

fn policy(xml: &str) -> ResourceRecord {
    let id = catalog::API_POLICY
        .identity_in(api().identity(), None)
        .unwrap();
    ResourceRecord::new(id).with_field("xml_content", xml)
}

#[test]
fn plan_converges_and_is_stable() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);

    let mut plan = ExecutionPlan::new();
    plan.add(Operation::update(
        &catalog::API_POLICY,
        policy("<policies><inbound><base/></inbound></policies>"),
    ));
    plan.add(Operation::update(&catalog::API, api()));
    plan.add(Operation::update(&catalog::SERVICE, service()));

    let first = execute_simple(&engine, &plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(first.summary.created, 3);
    assert!(first.summary.is_success());

    let second = execute_simple(&engine, &plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(second.summary.unchanged, 3);
    assert_eq!(second.summary.total_changes(), 0);
}

#[test]
fn server_values_do_not_cause_drift() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let ctx = OperationContext::default();

    let created = engine.create(&ctx, &catalog::SERVICE, &service()).unwrap();
    assert_eq!(created.outcome, Outcome::Created);
    assert!(created.record.unwrap().get("etag").is_some());

    let again = engine.update(&ctx, &catalog::SERVICE, &service()).unwrap();
    assert_eq!(again.outcome, Outcome::Unchanged);
}

#[test]
fn create_without_parent_fails() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);

    let err = engine
        .create(&OperationContext::default(), &catalog::API, &api())
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[test]
fn destroy_runs_children_first() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let ctx = OperationContext::default();
    engine.create(&ctx, &catalog::SERVICE, &service()).unwrap();
    engine.create(&ctx, &catalog::API, &api()).unwrap();

    let mut plan = ExecutionPlan::new();
    plan.add(Operation::delete(&catalog::SERVICE, service().identity().clone()));
    plan.add(Operation::delete(&catalog::API, api().identity().clone()));

    let report = execute_simple(&engine, &plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(report.summary.deleted, 2);
    assert!(engine.gateway().inner().identities().unwrap().is_empty());
}
