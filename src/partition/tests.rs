//! Tests for partition module

use super::*;
use crate::catalog::{Catalog, ChildContextRule};
use crate::error::Error;
use crate::types::Record;
use pretty_assertions::assert_eq;
use serde_json::json;

fn accounts(ids: &[&str]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

const RUN_RULE: ChildContextRule = ChildContextRule {
    fields: &[("run_id", "id"), ("artifacts_saved", "artifacts_saved")],
};

// ============================================================================
// Partition Tests
// ============================================================================

#[test]
fn test_partition_with_value() {
    let partition = Partition::new("p1")
        .with_value("account_id", "1000")
        .with_value("run_id", 42)
        .with_value("artifacts_saved", true);

    assert_eq!(partition.get("run_id"), Some(&json!(42)));
    assert_eq!(partition.get_string("run_id"), Some("42".to_string()));
    assert_eq!(partition.get_string("account_id"), Some("1000".to_string()));
    assert!(partition.gate_open("artifacts_saved"));
    assert!(!partition.gate_open("missing"));
    assert_eq!(partition.to_string(), "[p1]");
}

#[test]
fn test_render_path() {
    let partition = Partition::new("p")
        .with_value("account_id", "1000")
        .with_value("run_id", 7);

    assert_eq!(
        partition
            .render_path("/accounts/{account_id}/runs/{run_id}/artifacts")
            .unwrap(),
        "/accounts/1000/runs/7/artifacts"
    );
    assert_eq!(partition.render_path("/accounts").unwrap(), "/accounts");
}

#[test]
fn test_render_path_unresolved() {
    let partition = Partition::new("p").with_value("account_id", "1000");
    let err = partition
        .render_path("/accounts/{account_id}/runs/{run_id}/artifacts")
        .unwrap_err();

    match &err {
        Error::UnresolvedPlaceholder { placeholder, .. } => assert_eq!(placeholder, "run_id"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_config());
}

#[test]
fn test_render_path_null_is_unresolved() {
    let partition = Partition::new("p").with_value("account_id", serde_json::Value::Null);
    assert!(partition.render_path("/accounts/{account_id}/jobs").is_err());
}

#[test]
fn test_state_key() {
    let partition = Partition::new("p")
        .with_value("account_id", "1000")
        .with_value("run_id", 5);

    assert_eq!(partition.state_key(&[]), None);
    assert_eq!(
        partition.state_key(&["account_id"]),
        Some("account_id=1000".to_string())
    );
    assert_eq!(
        partition.state_key(&["account_id", "run_id"]),
        Some("account_id=1000,run_id=5".to_string())
    );
}

#[test]
fn test_context() {
    let partition = Partition::new("p").with_value("account_id", "1");
    assert_eq!(partition.context(), json!({"account_id": "1"}));
}

#[test]
fn test_placeholders() {
    assert_eq!(
        placeholders("/accounts/{account_id}/runs/{run_id}/artifacts"),
        vec!["account_id", "run_id"]
    );
    assert!(placeholders("/accounts").is_empty());
}

// ============================================================================
// Enumeration Tests
// ============================================================================

#[test]
fn test_one_partition_per_account() {
    let jobs = Catalog::dbt_cloud().get("jobs").unwrap();
    let partitions = enumerate(jobs, &accounts(&["1000", "2000"])).unwrap();

    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].id, "account_id=1000");
    assert_eq!(partitions[1].get_string("account_id"), Some("2000".to_string()));
}

#[test]
fn test_zero_accounts_is_config_error() {
    let jobs = Catalog::dbt_cloud().get("jobs").unwrap();
    let err = enumerate(jobs, &[]).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_unscoped_resource_single_empty_partition() {
    let accounts_resource = Catalog::dbt_cloud().get("accounts").unwrap();

    let partitions = enumerate(accounts_resource, &accounts(&["1", "2", "3"])).unwrap();
    assert_eq!(partitions, vec![Partition::empty()]);

    // no accounts needed either
    assert_eq!(enumerate(accounts_resource, &[]).unwrap().len(), 1);
}

#[test]
fn test_child_resource_cannot_be_enumerated() {
    let artifacts = Catalog::dbt_cloud().get("run_artifacts").unwrap();
    let err = enumerate(artifacts, &accounts(&["1"])).unwrap_err();
    assert!(matches!(err, Error::UnresolvedPlaceholder { .. }));
}

// ============================================================================
// Child Partition Tests
// ============================================================================

#[test]
fn test_child_partition_inherits_context() {
    let parent = Partition::new("account_id=1000").with_value("account_id", "1000");
    let run = record(json!({"id": 42, "artifacts_saved": true, "status": 10}));

    let child = child_partition(&parent, &run, RUN_RULE);

    assert_eq!(child.id, "account_id=1000,run_id=42");
    assert_eq!(child.get("account_id"), Some(&json!("1000")));
    assert_eq!(child.get("run_id"), Some(&json!(42)));
    assert!(child.gate_open("artifacts_saved"));
    assert!(child.get("status").is_none());
    assert_eq!(
        child
            .render_path("/accounts/{account_id}/runs/{run_id}/artifacts")
            .unwrap(),
        "/accounts/1000/runs/42/artifacts"
    );
}

#[test]
fn test_child_partition_gate_closed() {
    let parent = Partition::new("account_id=1").with_value("account_id", "1");

    let not_saved = child_partition(&parent, &record(json!({"id": 1, "artifacts_saved": false})), RUN_RULE);
    assert!(!not_saved.gate_open("artifacts_saved"));

    let missing = child_partition(&parent, &record(json!({"id": 2})), RUN_RULE);
    assert!(!missing.gate_open("artifacts_saved"));
}

#[test]
fn test_child_partition_missing_field() {
    let parent = Partition::new("account_id=1").with_value("account_id", "1");
    let child = child_partition(&parent, &record(json!({"id": null})), RUN_RULE);

    assert!(child.get("run_id").is_none());
    assert_eq!(child.id, "account_id=1");
    assert!(child
        .render_path("/accounts/{account_id}/runs/{run_id}/artifacts")
        .is_err());
}

#[test]
fn test_child_of_empty_partition() {
    let child = child_partition(
        &Partition::empty(),
        &record(json!({"id": "abc", "artifacts_saved": true})),
        RUN_RULE,
    );
    assert_eq!(child.id, "run_id=abc");
}
