//! Schema resolution tests

use super::*;
use crate::catalog::{Catalog, SchemaRef};
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

fn components() -> serde_json::Value {
    json!({
        "Timestamp": {"type": "string", "format": "date-time"},
        "Owner": {
            "type": "object",
            "nullable": false,
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string", "nullable": true}
            }
        },
        "Widget": {
            "type": "object",
            "properties": {
                "id": {"type": "integer", "nullable": true},
                "label": {"type": "string", "nullable": false},
                "note": {"type": "string"},
                "created_at": {"$ref": "#/components/schemas/Timestamp"},
                "owner": {"$ref": "#/components/schemas/Owner"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        },
        "Loop": {
            "type": "object",
            "properties": {"next": {"$ref": "#/components/schemas/Loop"}}
        },
        "Broken": {
            "type": "object",
            "properties": {"other": {"$ref": "#/components/schemas/Missing"}}
        }
    })
}

fn types_of(node: &serde_json::Value) -> BTreeSet<JsonType> {
    JsonType::set_of(node)
}

#[test]
fn test_primary_key_never_nullable() {
    let schema = resolve_component(&components(), "Widget", &["id"]).unwrap();

    // declared nullable upstream, still a plain integer
    assert_eq!(schema["properties"]["id"]["type"], json!("integer"));
    assert!(schema["properties"]["id"].get("nullable").is_none());
}

#[test]
fn test_nullability_widening() {
    let schema = resolve_component(&components(), "Widget", &["id"]).unwrap();
    let props = &schema["properties"];

    assert_eq!(props["label"]["type"], json!("string"));
    assert_eq!(props["note"]["type"], json!(["string", "null"]));
    assert_eq!(props["created_at"]["type"], json!(["string", "null"]));
    assert_eq!(props["created_at"]["format"], json!("date-time"));
    assert_eq!(props["tags"]["type"], json!(["array", "null"]));
    assert_eq!(props["tags"]["items"]["type"], json!(["string", "null"]));
}

#[test]
fn test_root_is_not_widened() {
    let schema = resolve_component(&components(), "Widget", &["id"]).unwrap();
    assert_eq!(schema["type"], json!("object"));
}

#[test]
fn test_nested_objects() {
    let schema = resolve_component(&components(), "Widget", &["id"]).unwrap();
    let owner = &schema["properties"]["owner"];

    // explicitly non-nullable object
    assert_eq!(owner["type"], json!("object"));
    assert_eq!(
        owner["properties"]["name"]["type"],
        json!(["string", "null"])
    );
    // nested field named like a key field keeps its type
    assert_eq!(owner["properties"]["id"]["type"], json!("integer"));
}

#[test]
fn test_no_refs_or_nullable_left() {
    let schema = resolve_component(&components(), "Widget", &["id"]).unwrap();
    let text = serde_json::to_string(&schema).unwrap();
    assert!(!text.contains("$ref"));
    assert!(!text.contains("\"nullable\""));
}

#[test]
fn test_circular_reference() {
    let err = resolve_component(&components(), "Loop", &["id"]).unwrap_err();
    assert!(err.contains("circular"), "{err}");
}

#[test]
fn test_unknown_reference() {
    let err = resolve_component(&components(), "Broken", &["id"]).unwrap_err();
    assert!(err.contains("Missing"), "{err}");

    let err = resolve_component(&components(), "Nope", &["id"]).unwrap_err();
    assert!(err.contains("Nope"), "{err}");
}

#[test]
fn test_all_of_merge() {
    let components = json!({
        "Base": {
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "integer"}, "status": {"type": "integer"}}
        },
        "Extended": {
            "allOf": [
                {"$ref": "#/components/schemas/Base"},
                {
                    "type": "object",
                    "required": ["finished_at"],
                    "properties": {
                        "finished_at": {"type": "string", "format": "date-time", "nullable": true}
                    }
                }
            ]
        }
    });

    let schema = resolve_component(&components, "Extended", &["id"]).unwrap();
    assert_eq!(schema["type"], json!("object"));
    assert_eq!(schema["required"], json!(["id", "finished_at"]));
    assert_eq!(schema["properties"]["id"]["type"], json!("integer"));
    assert_eq!(
        schema["properties"]["status"]["type"],
        json!(["integer", "null"])
    );
    assert_eq!(
        schema["properties"]["finished_at"]["type"],
        json!(["string", "null"])
    );
    assert!(schema.get("allOf").is_none());
}

#[test]
fn test_parse_components() {
    let doc = "openapi: 3.0.0\ncomponents:\n  schemas:\n    A:\n      type: object\n";
    let components = parse_components(doc).unwrap();
    assert_eq!(components["A"]["type"], json!("object"));

    assert!(parse_components("openapi: 3.0.0\n").is_err());
    assert!(parse_components("components: [unclosed").is_err());
}

#[tokio::test]
async fn test_every_bundled_resource_resolves() {
    let cache = SchemaCache::bundled();
    for resource in Catalog::dbt_cloud().iter() {
        let resolved = cache.resolve(resource).await.unwrap();
        for key in resource.primary_key {
            assert!(
                !resolved.is_nullable(key),
                "{}.{key} should not be nullable",
                resource.name
            );
        }
        assert!(!resolved.fields().is_empty(), "{}", resource.name);
    }
}

#[tokio::test]
async fn test_bundled_runs_schema() {
    let cache = SchemaCache::bundled();
    let runs = Catalog::dbt_cloud().get("runs").unwrap();
    let resolved = cache.resolve(runs).await.unwrap();

    assert_eq!(resolved.key_properties, vec!["id".to_string()]);
    assert_eq!(
        types_of(resolved.property("finished_at").unwrap()),
        BTreeSet::from([JsonType::String, JsonType::Null])
    );
    // merged from the base member
    assert!(resolved.property("job_definition_id").is_some());

    let fields = resolved.fields();
    assert!(fields["artifacts_saved"].nullable);
    assert_eq!(
        fields["artifacts_saved"].types,
        BTreeSet::from([JsonType::Boolean])
    );
}

#[tokio::test]
async fn test_inline_schema_is_passed_through() {
    let cache = SchemaCache::bundled();
    let artifacts = Catalog::dbt_cloud().get("run_artifacts").unwrap();
    assert!(matches!(artifacts.schema, SchemaRef::Inline(_)));

    let resolved = cache.resolve(artifacts).await.unwrap();
    assert_eq!(
        resolved.key_properties,
        vec!["account_id", "run_id", "path"]
    );
    assert_eq!(resolved.field_types("path"), BTreeSet::from([JsonType::String]));
    assert!(resolved.required().contains("run_id"));
}

#[tokio::test]
async fn test_cache_returns_same_schema() {
    let cache = SchemaCache::bundled();
    let jobs = Catalog::dbt_cloud().get("jobs").unwrap();

    let first = cache.resolve(jobs).await.unwrap();
    let second = cache.resolve(jobs).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let v2 = cache.document("v2").await.unwrap();
    let again = cache.document("v2").await.unwrap();
    assert!(Arc::ptr_eq(&v2, &again));
}

#[tokio::test]
async fn test_directory_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("openapi_v2.yaml"),
        "components:\n  schemas:\n    Job:\n      type: object\n      properties:\n        id:\n          type: integer\n          nullable: true\n        name:\n          type: string\n",
    )
    .unwrap();

    let cache = SchemaCache::new(SchemaSource::Directory(dir.path().to_path_buf()));
    let jobs = Catalog::dbt_cloud().get("jobs").unwrap();
    let resolved = cache.resolve(jobs).await.unwrap();

    assert_eq!(resolved.field_types("id"), BTreeSet::from([JsonType::Integer]));
    assert!(resolved.is_nullable("name"));

    // v3 document is absent from the directory
    let groups = Catalog::dbt_cloud().get("groups").unwrap();
    let err = cache.resolve(groups).await.unwrap_err();
    assert!(matches!(err, Error::SchemaResolution { .. }));
}

#[tokio::test]
async fn test_remote_source_fetches_document_once() {
    use crate::http::{HttpClient, HttpClientConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schemas/openapi_v2.yaml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("../../schemas/openapi_v2.yaml")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(
        HttpClientConfig::builder().max_retries(0).no_rate_limit().build(),
    )
    .unwrap();
    let cache = SchemaCache::new(SchemaSource::Remote {
        url_template: format!("{}/schemas/openapi_{{version}}.yaml", server.uri()),
        client,
    });

    let catalog = Catalog::dbt_cloud();
    let jobs = cache.resolve(catalog.get("jobs").unwrap()).await.unwrap();
    let runs = cache.resolve(catalog.get("runs").unwrap()).await.unwrap();

    assert_eq!(jobs.key_properties, vec!["id".to_string()]);
    assert_eq!(runs.field_types("id"), BTreeSet::from([JsonType::Integer]));
}

#[tokio::test]
async fn test_remote_source_error_is_schema_error() {
    use crate::http::{HttpClient, HttpClientConfig};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(
        HttpClientConfig::builder().max_retries(0).no_rate_limit().build(),
    )
    .unwrap();
    let cache = SchemaCache::new(SchemaSource::Remote {
        url_template: format!("{}/openapi_{{version}}.yaml", server.uri()),
        client,
    });

    let err = cache
        .resolve(Catalog::dbt_cloud().get("jobs").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaResolution { .. }));
}

#[tokio::test]
async fn test_missing_component_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("openapi_v2.yaml"),
        "components:\n  schemas:\n    Other:\n      type: object\n",
    )
    .unwrap();

    let cache = SchemaCache::new(SchemaSource::Directory(dir.path().to_path_buf()));
    let runs = Catalog::dbt_cloud().get("runs").unwrap();
    match cache.resolve(runs).await.unwrap_err() {
        Error::SchemaResolution { resource, message } => {
            assert_eq!(resource, "runs");
            assert!(message.contains("Run"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_json_type_display_and_parse() {
    assert_eq!(JsonType::parse("integer"), Some(JsonType::Integer));
    assert_eq!(JsonType::parse("date"), None);
    assert_eq!(JsonType::Null.to_string(), "null");
}
