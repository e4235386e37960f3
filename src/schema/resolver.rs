//! Schema resolution
//!
//! Turns an OpenAPI component into a self-contained JSON schema: references
//! are inlined, `allOf` objects are merged, and every typed node that is
//! nullable (explicitly or by omission) accepts `null`, except primary-key
//! properties which keep their declared type.

use super::source::SchemaSource;
use super::types::ResolvedSchema;
use crate::catalog::{ResourceDescriptor, SchemaRef};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Process-wide memo of OpenAPI documents and resolved schemas
///
/// Entries are never invalidated: a schema is fixed for a given API version.
#[derive(Debug)]
pub struct SchemaCache {
    source: SchemaSource,
    documents: RwLock<HashMap<String, Arc<Value>>>,
    resolved: RwLock<HashMap<(String, String), Arc<ResolvedSchema>>>,
}

impl SchemaCache {
    /// Create an empty cache over a document source
    pub fn new(source: SchemaSource) -> Self {
        Self {
            source,
            documents: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Cache over the bundled documents
    pub fn bundled() -> Self {
        Self::new(SchemaSource::Bundled)
    }

    /// `components.schemas` of an API version, loaded at most once
    pub async fn document(&self, api_version: &str) -> Result<Arc<Value>> {
        if let Some(doc) = self.documents.read().await.get(api_version) {
            return Ok(Arc::clone(doc));
        }

        let mut documents = self.documents.write().await;
        if let Some(doc) = documents.get(api_version) {
            return Ok(Arc::clone(doc));
        }
        let doc = Arc::new(self.source.load(api_version).await?);
        documents.insert(api_version.to_string(), Arc::clone(&doc));
        Ok(doc)
    }

    /// Resolve the schema of a resource
    pub async fn resolve(&self, resource: &ResourceDescriptor) -> Result<Arc<ResolvedSchema>> {
        let component = match resource.schema {
            SchemaRef::Inline(schema) => {
                return Ok(Arc::new(ResolvedSchema::new(
                    schema(),
                    resource.primary_key,
                )));
            }
            SchemaRef::Component(component) => component,
        };

        let key = (component.to_string(), resource.api_version.to_string());
        if let Some(hit) = self.resolved.read().await.get(&key) {
            return Ok(Arc::clone(hit));
        }

        let document = self
            .document(resource.api_version)
            .await
            .map_err(|e| Error::schema(resource.name, e.to_string()))?;
        let schema = resolve_component(&document, component, resource.primary_key)
            .map_err(|message| Error::schema(resource.name, message))?;
        debug!(
            stream = resource.name,
            component,
            version = resource.api_version,
            "Resolved schema"
        );

        let resolved = Arc::new(ResolvedSchema::new(schema, resource.primary_key));
        self.resolved
            .write()
            .await
            .insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }
}

/// Dereference a component and apply the nullability rule
pub fn resolve_component(
    components: &Value,
    component: &str,
    primary_key: &[&str],
) -> std::result::Result<Value, String> {
    let root = components
        .get(component)
        .ok_or_else(|| format!("component '{component}' not found"))?;
    let mut visiting = vec![component.to_string()];
    let dereferenced = dereference(root, components, &mut visiting)?;

    // The record itself is never null; only its properties are widened.
    let mut record = normalize(&dereferenced, primary_key, false);
    if let Value::Object(map) = &mut record {
        map.entry("type".to_string())
            .or_insert_with(|| Value::from("object"));
        map.insert(
            "properties".to_string(),
            normalize_properties(&dereferenced, primary_key, true),
        );
    }
    Ok(record)
}

/// Inline every `$ref` and merge `allOf` members
fn dereference(
    node: &Value,
    components: &Value,
    visiting: &mut Vec<String>,
) -> std::result::Result<Value, String> {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                let reference = reference
                    .as_str()
                    .ok_or_else(|| "$ref is not a string".to_string())?;
                let name = reference
                    .strip_prefix(COMPONENT_PREFIX)
                    .ok_or_else(|| format!("unsupported reference '{reference}'"))?;
                if visiting.iter().any(|v| v == name) {
                    return Err(format!("circular reference '{reference}'"));
                }
                let target = components
                    .get(name)
                    .ok_or_else(|| format!("unknown reference '{reference}'"))?;

                visiting.push(name.to_string());
                let mut resolved = dereference(target, components, visiting)?;
                visiting.pop();

                // siblings of $ref (nullable, description) override the target
                if let Value::Object(out) = &mut resolved {
                    for (key, value) in map.iter().filter(|(k, _)| *k != "$ref") {
                        out.insert(key.clone(), dereference(value, components, visiting)?);
                    }
                }
                return Ok(resolved);
            }

            let mut out = Map::new();
            for (key, value) in map {
                if key == "allOf" {
                    continue;
                }
                out.insert(key.clone(), dereference(value, components, visiting)?);
            }

            if let Some(Value::Array(members)) = map.get("allOf") {
                let mut merged = Map::new();
                for member in members {
                    let member = dereference(member, components, visiting)?;
                    merge_object_schema(&mut merged, member);
                }
                // explicit keys on the node win over merged members
                for (key, value) in out {
                    if let (Some(Value::Object(props)), Value::Object(extra)) =
                        (merged.get_mut(&key), &value)
                    {
                        if key == "properties" {
                            props.extend(extra.clone());
                            continue;
                        }
                    }
                    merged.insert(key, value);
                }
                return Ok(Value::Object(merged));
            }

            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| dereference(item, components, visiting))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Merge one `allOf` member into the accumulated schema
fn merge_object_schema(merged: &mut Map<String, Value>, member: Value) {
    let Value::Object(member) = member else {
        return;
    };
    for (key, value) in member {
        match merged.get_mut(&key) {
            Some(existing) => merge_keyword(&key, existing, value),
            None => {
                merged.insert(key, value);
            }
        }
    }
}

/// Combine a keyword present in more than one `allOf` member; first wins otherwise
fn merge_keyword(key: &str, existing: &mut Value, value: Value) {
    match (key, existing, value) {
        ("properties", Value::Object(props), Value::Object(extra)) => {
            for (name, schema) in extra {
                props.entry(name).or_insert(schema);
            }
        }
        ("required", Value::Array(required), Value::Array(extra)) => {
            for name in extra {
                if !required.contains(&name) {
                    required.push(name);
                }
            }
        }
        _ => {}
    }
}

/// Apply the nullability rule to a node and everything below it
///
/// With `widen` false the node keeps its declared types, and so does its
/// subtree; this is how primary-key properties are handled.
fn normalize(node: &Value, primary_key: &[&str], widen: bool) -> Value {
    let Value::Object(map) = node else {
        return node.clone();
    };

    let mut out = map.clone();
    let nullable = out
        .remove("nullable")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    if widen && nullable {
        if let Some(ty) = out.get("type").cloned() {
            out.insert("type".to_string(), append_null(ty));
        }
    }

    if out.contains_key("properties") {
        out.insert(
            "properties".to_string(),
            normalize_properties(node, primary_key, widen),
        );
    }
    if let Some(items) = map.get("items") {
        out.insert("items".to_string(), normalize(items, primary_key, widen));
    }

    Value::Object(out)
}

/// Normalize the `properties` of an object node, skipping primary-key fields
fn normalize_properties(node: &Value, primary_key: &[&str], widen: bool) -> Value {
    let Some(Value::Object(props)) = node.get("properties") else {
        return Value::Object(Map::new());
    };
    props
        .iter()
        .map(|(name, schema)| {
            let widen_child = widen && !primary_key.contains(&name.as_str());
            (name.clone(), normalize(schema, primary_key, widen_child))
        })
        .collect::<Map<_, _>>()
        .into()
}

/// Add `null` to a `type` keyword
fn append_null(ty: Value) -> Value {
    match ty {
        Value::String(tag) if tag == "null" => Value::String(tag),
        Value::String(tag) => Value::Array(vec![Value::String(tag), Value::from("null")]),
        Value::Array(mut tags) => {
            if !tags.iter().any(|t| t.as_str() == Some("null")) {
                tags.push(Value::from("null"));
            }
            Value::Array(tags)
        }
        other => other,
    }
}
