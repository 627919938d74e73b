//! End-to-end runs of the converge binary against a file backend.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"
ledger = "ledger.toml"

[backend]
kind = "file"
state_file = "backend.json"

[engine]
read_after_write_attempts = 2
read_after_write_delay_ms = 0

[defaults]
subscription = "sub1"
resource_group = "rg1"
service = "gw"

[[resources]]
kind = "service"
name = "gw"
fields = { location = "westeurope", publisher_name = "Contoso", publisher_email = "api@contoso.example", sku_name = "Developer_1" }

[[resources]]
kind = "api"
name = "petstore"
fields = { display_name = "Pet Store", path = "pets", protocols = "https" }

[[resources]]
kind = "api_policy"
scope = { api = "petstore" }
fields = { xml_content = { file = "policy.xml" } }
"#;

const POLICY: &str = "<policies><inbound><base /></inbound></policies>";

const API_ID: &str = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/gw/apis/petstore";

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("converge.toml"), CONFIG).unwrap();
    fs::write(dir.path().join("policy.xml"), POLICY).unwrap();
    dir
}

fn converge(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_converge"))
        .arg("--config")
        .arg(dir.join("converge.toml"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn kinds_lists_catalog() {
    let dir = workspace();
    let output = converge(dir.path(), &["kinds"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("api_operation_policy"));
    assert!(out.contains("named_value"));
}

#[test]
fn id_parse_canonicalizes_keywords() {
    let dir = workspace();
    let output = converge(
        dir.path(),
        &[
            "id",
            "parse",
            "/SUBSCRIPTIONS/sub1/resourcegroups/rg1/providers/microsoft.apimanagement/service/gw/apis/petstore",
        ],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains(API_ID));
}

#[test]
fn validate_accepts_config() {
    let dir = workspace();
    let output = converge(dir.path(), &["validate"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("3 resources"));
}

#[test]
fn apply_then_reapply_is_stable() {
    let dir = workspace();

    let first = converge(dir.path(), &["apply", "--yes"]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(stdout(&first).contains("3 to create"));

    let ledger = fs::read_to_string(dir.path().join("ledger.toml")).unwrap();
    assert!(ledger.contains(API_ID));

    // reformatting the policy is not drift
    fs::write(
        dir.path().join("policy.xml"),
        "<policies>\n  <inbound>\n    <base />\n  </inbound>\n</policies>\n",
    )
    .unwrap();
    let second = converge(dir.path(), &["apply", "--yes"]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("Everything is up to date"));
}

#[test]
fn unmanaged_resource_is_not_adopted() {
    let dir = workspace();
    assert!(converge(dir.path(), &["apply", "--yes"]).status.success());
    assert!(converge(dir.path(), &["forget", API_ID]).status.success());

    let plan = converge(dir.path(), &["plan", "api"]);
    assert!(plan.status.success());
    assert!(stdout(&plan).contains("exists, not managed"));

    assert!(converge(dir.path(), &["import", "api", API_ID]).status.success());
    let plan = converge(dir.path(), &["plan", "api"]);
    assert!(stdout(&plan).contains("0 to create, 0 to update, 1 unchanged"));
}

#[test]
fn destroy_removes_everything() {
    let dir = workspace();
    assert!(converge(dir.path(), &["apply", "--yes"]).status.success());

    let output = converge(dir.path(), &["destroy", "--yes"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let backend = fs::read_to_string(dir.path().join("backend.json")).unwrap();
    assert!(!backend.contains("petstore"));

    let show = converge(dir.path(), &["show", "api", API_ID]);
    assert!(show.status.success());
    assert!(stdout(&show).contains("does not exist"));
}

#[test]
fn destroy_target_only_touches_matching_kind() {
    let dir = workspace();
    assert!(converge(dir.path(), &["apply", "--yes"]).status.success());

    let output = converge(dir.path(), &["destroy", "api_policy", "--yes"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let backend = fs::read_to_string(dir.path().join("backend.json")).unwrap();
    assert!(!backend.contains("/policies/policy"));
    assert!(backend.contains(API_ID));

    let ledger = fs::read_to_string(dir.path().join("ledger.toml")).unwrap();
    assert!(ledger.contains(API_ID));
    assert!(!ledger.contains("/policies/policy"));
}
