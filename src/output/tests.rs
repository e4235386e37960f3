//! Tests for output module

use super::*;
use crate::engine::Message;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record(value: Value) -> crate::types::Record {
    value.as_object().cloned().unwrap()
}

fn lines(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_json_lines_shapes() {
    let mut writer = JsonLinesWriter::new(Vec::new());

    writer
        .send(&Message::Schema {
            stream: "runs".to_string(),
            schema: json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
            key_properties: vec!["id".to_string()],
            bookmark_properties: vec!["finished_at".to_string()],
        })
        .await
        .unwrap();
    writer
        .send(&Message::Record {
            stream: "runs".to_string(),
            record: record(json!({"id": 1})),
            time_extracted: None,
        })
        .await
        .unwrap();
    writer
        .send(&Message::state(json!({"streams": {}})))
        .await
        .unwrap();
    writer.flush().await.unwrap();

    assert_eq!(writer.lines(), 3);
    let out = lines(&writer.into_inner());
    assert_eq!(
        out,
        vec![
            json!({
                "type": "SCHEMA",
                "stream": "runs",
                "schema": {"type": "object", "properties": {"id": {"type": "integer"}}},
                "key_properties": ["id"],
                "bookmark_properties": ["finished_at"]
            }),
            json!({"type": "RECORD", "stream": "runs", "record": {"id": 1}}),
            json!({"type": "STATE", "value": {"streams": {}}}),
        ]
    );
}

#[tokio::test]
async fn test_schema_without_bookmarks() {
    let mut writer = JsonLinesWriter::new(Vec::new());
    writer
        .send(&Message::Schema {
            stream: "jobs".to_string(),
            schema: json!({"type": "object"}),
            key_properties: vec!["id".to_string()],
            bookmark_properties: vec![],
        })
        .await
        .unwrap();

    let out = lines(&writer.into_inner());
    assert!(out[0].get("bookmark_properties").is_none());
}

#[tokio::test]
async fn test_record_time_extracted() {
    let message = Message::record("jobs", record(json!({"id": 7})));
    let mut writer = JsonLinesWriter::new(Vec::new());
    writer.send(&message).await.unwrap();

    let out = lines(&writer.into_inner());
    let extracted = out[0]["time_extracted"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(extracted).is_ok());
    assert_eq!(message.stream(), Some("jobs"));
}

#[tokio::test]
async fn test_collecting_sink() {
    let mut sink = CollectingSink::new();
    sink.send(&Message::Schema {
        stream: "jobs".to_string(),
        schema: json!({}),
        key_properties: vec![],
        bookmark_properties: vec![],
    })
    .await
    .unwrap();
    sink.send(&Message::record("jobs", record(json!({"id": 1}))))
        .await
        .unwrap();
    sink.send(&Message::record("runs", record(json!({"id": 2}))))
        .await
        .unwrap();
    sink.send(&Message::state(json!({"a": 1}))).await.unwrap();
    sink.send(&Message::state(json!({"a": 2}))).await.unwrap();

    assert_eq!(sink.schemas(), vec!["jobs"]);
    assert_eq!(sink.records("jobs").len(), 1);
    assert_eq!(sink.records("runs")[0]["id"], json!(2));
    assert_eq!(sink.last_state(), Some(&json!({"a": 2})));
}
