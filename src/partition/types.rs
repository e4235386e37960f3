//! Partition types and traits

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Matches `{placeholder}` tokens in path templates
pub(crate) static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Context of one partition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    /// Identifier used in logs and error messages
    pub id: String,
    /// Context fields, in key order
    pub values: BTreeMap<String, Value>,
}

impl Partition {
    /// Create a new partition
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// The single partition of an unscoped resource
    pub fn empty() -> Self {
        Self::new("*")
    }

    /// Add a value to the partition
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value rendered for a URL path or state key; null and structured values have no rendering
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether a gate field is present and true
    pub fn gate_open(&self, gate: &str) -> bool {
        self.values.get(gate).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Substitute every `{placeholder}` in a path template
    pub fn render_path(&self, template: &str) -> Result<String> {
        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER_REGEX.captures_iter(template) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = self
                .get_string(name.as_str())
                .ok_or_else(|| Error::UnresolvedPlaceholder {
                    placeholder: name.as_str().to_string(),
                    path: template.to_string(),
                })?;
            rendered.push_str(&template[last..token.start()]);
            rendered.push_str(&value);
            last = token.end();
        }
        rendered.push_str(&template[last..]);
        Ok(rendered)
    }

    /// Key under which this partition's watermark is stored
    ///
    /// `None` for resources whose state is kept at stream level.
    pub fn state_key(&self, keys: &[&str]) -> Option<String> {
        if keys.is_empty() {
            return None;
        }
        let parts: Vec<String> = keys
            .iter()
            .map(|k| format!("{k}={}", self.get_string(k).unwrap_or_default()))
            .collect();
        Some(parts.join(","))
    }

    /// Context as a JSON object
    pub fn context(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.id)
    }
}

/// Produces the top-level partitions of a resource
pub trait PartitionRouter {
    /// Generate all partitions
    fn partitions(&self) -> Result<Vec<Partition>>;
}
