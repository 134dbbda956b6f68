use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ORDERS: &str = "\
order_id,customer_id,status,amount
1,10,shipped,20.5
2,11,pending,13.0
3,12,lost,7.25
2,99,shipped,
";

const CLEAN_ORDERS: &str = "\
order_id,customer_id,status,amount
1,10,shipped,20.5
2,11,pending,13.0
";

const CUSTOMERS: &str = "\
id,name
10,alice
11,bob
12,carol
";

const SUITE: &str = r#"
name: orders_suite
description: Nightly order checks
settings:
  batch_size: 2
references:
  - name: customers
    path: customers.csv
sources:
  - name: orders
    path: orders.csv
    columns:
      order_id: integer
      amount: float
    rules:
      - kind: uniqueness
        name: order_id_unique
        params:
          field: order_id
      - kind: referential_integrity
        name: known_customer
        params:
          field: customer_id
          reference: customers
          reference_field: id
rules:
  - kind: allowed_values
    name: status_known
    params:
      field: status
      values: [shipped, pending]
  - kind: mandatory_field
    name: amount_present
    severity: warning
    params:
      field: amount
"#;

/// Helper to create a Command for the dqe binary
#[allow(deprecated)]
fn dqe() -> Command {
    Command::cargo_bin("dqe").expect("Failed to find dqe binary")
}

/// Writes the orders suite and its data files into a fresh directory.
fn workspace(orders: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("orders.csv"), orders).unwrap();
    fs::write(dir.path().join("customers.csv"), CUSTOMERS).unwrap();
    let suite = dir.path().join("orders.yml");
    fs::write(&suite, SUITE).unwrap();
    (dir, suite)
}

fn write_suite(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// rules command tests
// ============================================================================

#[test]
fn test_rules_lists_builtin_kinds() {
    dqe()
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("mandatory_field"))
        .stdout(predicate::str::contains("referential_integrity"))
        .stdout(predicate::str::contains("statistical_outlier"));
}

// ============================================================================
// check command tests
// ============================================================================

#[test]
fn test_check_valid_suite() {
    let (_dir, suite) = workspace(ORDERS);
    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("orders_suite"))
        .stdout(predicate::str::contains("Suite is valid"))
        .stdout(predicate::str::contains("Nightly order checks"))
        .stdout(predicate::str::contains("orders (orders.csv): 4 rules"))
        .stdout(predicate::str::contains("known_customer"))
        .stdout(predicate::str::contains("customers"));
}

#[test]
fn test_check_does_not_read_data() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(dir.path(), "orders.yml", SUITE);
    dqe().arg("check").arg(&suite).assert().success();
}

#[test]
fn test_check_toml_suite() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(
        dir.path(),
        "events.toml",
        r#"
name = "events_suite"

[[sources]]
name = "events"
path = "events.csv"

[[rules]]
kind = "pattern_match"
params = { field = "email", pattern = "[^@]+@[^@]+" }
"#,
    );

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("events_suite"))
        .stdout(predicate::str::contains("pattern_match#0"));
}

#[test]
fn test_check_json_output() {
    let (_dir, suite) = workspace(ORDERS);
    let output = dqe()
        .arg("check")
        .arg(&suite)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["rule_count"], 4);
    assert_eq!(
        json["sources"][0]["rules"],
        serde_json::json!(["status_known", "amount_present", "order_id_unique", "known_customer"])
    );
}

#[test]
fn test_check_unknown_rule_kind() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(
        dir.path(),
        "bad.yml",
        "name: bad\nsources:\n  - name: s\n    path: s.csv\nrules:\n  - kind: no_such_rule\n",
    );

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("Unknown rule kind: 'no_such_rule'"));
}

#[test]
fn test_check_invalid_params() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(
        dir.path(),
        "bad.yml",
        "name: bad\nsources:\n  - name: s\n    path: s.csv\nrules:\n  - kind: pattern_match\n    params:\n      field: a\n      pattern: '(unclosed'\n",
    );

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pattern_match"));
}

#[test]
fn test_check_unknown_reference_source() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(
        dir.path(),
        "bad.yml",
        r#"
name: bad
sources:
  - name: orders
    path: orders.csv
rules:
  - kind: referential_integrity
    params:
      field: customer_id
      reference: customers
"#,
    );

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown source 'customers'"));
}

#[test]
fn test_check_suite_without_sources() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(dir.path(), "empty.yml", "name: empty\nsources: []\n");

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least one source"));
}

#[test]
fn test_check_missing_file() {
    dqe()
        .arg("check")
        .arg("nonexistent.yml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_check_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(dir.path(), "suite.json", "{}");

    dqe()
        .arg("check")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unsupported file format"));
}

// ============================================================================
// validate command tests
// ============================================================================

#[test]
fn test_validate_failing_suite() {
    let (_dir, suite) = workspace(ORDERS);
    dqe()
        .arg("validate")
        .arg(&suite)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DATA QUALITY REPORT"))
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("order_id_unique"))
        .stdout(predicate::str::contains("duplicate of row 1"))
        .stdout(predicate::str::contains("value not found in customers.id"))
        .stdout(predicate::str::contains("lost"));
}

#[test]
fn test_validate_passing_suite() {
    let (_dir, suite) = workspace(CLEAN_ORDERS);
    dqe()
        .arg("validate")
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"));
}

#[test]
fn test_validate_json_report() {
    let (_dir, suite) = workspace(ORDERS);
    let output = dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["summary"]["sources"], 1);

    let source = &json["sources"][0];
    assert_eq!(source["source"], "orders");
    assert_eq!(source["rows_processed"], 4);
    assert_eq!(source["batches_processed"], 2);

    let failed: Vec<(String, u64)> = source["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["rule"].as_str().unwrap().to_string(),
                r["failed_count"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        failed,
        vec![
            ("status_known".to_string(), 1),
            ("amount_present".to_string(), 1),
            ("order_id_unique".to_string(), 1),
            ("known_customer".to_string(), 1),
        ]
    );
    assert_eq!(source["results"][1]["severity"], "WARNING");
}

#[test]
fn test_validate_writes_output_file() {
    let (dir, suite) = workspace(ORDERS);
    let report = dir.path().join("report.json");

    dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--output")
        .arg(&report)
        .assert()
        .code(1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["sources"][0]["status"], "failed");
}

#[test]
fn test_validate_source_override() {
    let (dir, suite) = workspace(ORDERS);
    let clean = dir.path().join("clean.csv");
    fs::write(&clean, CLEAN_ORDERS).unwrap();

    dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--source")
        .arg(format!("orders={}", clean.display()))
        .assert()
        .success();
}

#[test]
fn test_validate_unknown_source_override() {
    let (_dir, suite) = workspace(ORDERS);
    dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--source")
        .arg("products=products.csv")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown source 'products'"));
}

#[test]
fn test_validate_sample_cap_override() {
    let (_dir, suite) = workspace(ORDERS);
    let output = dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--max-samples")
        .arg("0")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let result = &json["sources"][0]["results"][0];
    assert_eq!(result["failed_count"], 1);
    assert_eq!(result["samples"], serde_json::json!([]));
}

#[test]
fn test_validate_fail_fast_aborts_source() {
    let (_dir, suite) = workspace(ORDERS);
    let output = dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--fail-fast")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let source = &json["sources"][0];
    assert_eq!(source["status"], "aborted");
    assert_eq!(source["aborted"]["reason"], "fail_fast");
    assert_eq!(source["aborted"]["rule"], "status_known");
    assert_eq!(source["aborted"]["batch"], 2);
}

#[test]
fn test_validate_zero_batch_size() {
    let (_dir, suite) = workspace(ORDERS);
    dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--batch-size")
        .arg("0")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_validate_missing_data_file() {
    let dir = TempDir::new().unwrap();
    let suite = write_suite(dir.path(), "orders.yml", SUITE);

    dqe()
        .arg("validate")
        .arg(&suite)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to open source 'orders'"));
}

#[test]
fn test_validate_malformed_data_aborts_with_source_error() {
    let (_dir, suite) = workspace("order_id,customer_id,status,amount\n1,10,shipped,1.0\n2,11\n");
    let output = dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["sources"][0]["aborted"]["reason"], "source_error");
}

#[test]
fn test_validate_missing_file() {
    dqe()
        .arg("validate")
        .arg("nonexistent.yml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_validate_warnings_only_exit_zero() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("people.csv"), "name,nickname\nalice,\nbob,bobby\n").unwrap();
    let suite = write_suite(
        dir.path(),
        "people.yml",
        r#"
name: people
sources:
  - name: people
    path: people.csv
rules:
  - kind: mandatory_field
    severity: warning
    params:
      field: nickname
"#,
    );

    dqe()
        .arg("validate")
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"));
}

#[test]
fn test_invalid_format_argument() {
    let (_dir, suite) = workspace(ORDERS);
    dqe()
        .arg("validate")
        .arg(&suite)
        .arg("--format")
        .arg("xml")
        .assert()
        .failure();
}
