//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// JSON Schema primitive type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Parse a type tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(JsonType::String),
            "number" => Some(JsonType::Number),
            "integer" => Some(JsonType::Integer),
            "boolean" => Some(JsonType::Boolean),
            "object" => Some(JsonType::Object),
            "array" => Some(JsonType::Array),
            "null" => Some(JsonType::Null),
            _ => None,
        }
    }

    /// Type tags of a schema node's `type` keyword (string or array form)
    pub fn set_of(node: &Value) -> BTreeSet<JsonType> {
        match node.get("type") {
            Some(Value::String(tag)) => JsonType::parse(tag).into_iter().collect(),
            Some(Value::Array(tags)) => tags
                .iter()
                .filter_map(Value::as_str)
                .filter_map(JsonType::parse)
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// Types of a single top-level field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Non-null type tags
    pub types: BTreeSet<JsonType>,
    /// Whether `null` is accepted
    pub nullable: bool,
}

/// A fully dereferenced record schema with nullability applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSchema {
    /// JSON Schema document (`type: object` with `properties`)
    pub schema: Value,
    /// Primary key fields, in order
    pub key_properties: Vec<String>,
}

impl ResolvedSchema {
    /// Create a resolved schema
    pub fn new(schema: Value, key_properties: &[&str]) -> Self {
        Self {
            schema,
            key_properties: key_properties.iter().map(ToString::to_string).collect(),
        }
    }

    /// Schema node of a top-level property
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.schema.get("properties")?.get(name)
    }

    /// Type tags of a top-level property, including `null` when nullable
    pub fn field_types(&self, name: &str) -> BTreeSet<JsonType> {
        self.property(name).map(JsonType::set_of).unwrap_or_default()
    }

    /// Whether a top-level property accepts null
    pub fn is_nullable(&self, name: &str) -> bool {
        self.field_types(name).contains(&JsonType::Null)
    }

    /// Fields that must always be present and non-null
    pub fn required(&self) -> BTreeSet<&str> {
        self.key_properties.iter().map(String::as_str).collect()
    }

    /// Top-level fields with their types split from nullability
    pub fn fields(&self) -> BTreeMap<String, FieldSpec> {
        let Some(Value::Object(props)) = self.schema.get("properties") else {
            return BTreeMap::new();
        };
        props
            .iter()
            .map(|(name, node)| {
                let mut types = JsonType::set_of(node);
                let nullable = types.remove(&JsonType::Null);
                (name.clone(), FieldSpec { types, nullable })
            })
            .collect()
    }
}
