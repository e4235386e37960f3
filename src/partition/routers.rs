//! Partition router implementations

use super::types::{Partition, PartitionRouter, PLACEHOLDER_REGEX};
use crate::catalog::{ChildContextRule, ResourceDescriptor};
use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Placeholder names of a path template, in order of appearance
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

// ============================================================================
// Account Router
// ============================================================================

/// One partition per configured account, or a single empty partition for
/// resources whose path is not account-scoped
#[derive(Debug, Clone, Copy)]
pub struct AccountRouter<'a> {
    resource: &'a ResourceDescriptor,
    account_ids: &'a [String],
}

impl<'a> AccountRouter<'a> {
    /// Create a router for a top-level resource
    pub fn new(resource: &'a ResourceDescriptor, account_ids: &'a [String]) -> Self {
        Self {
            resource,
            account_ids,
        }
    }
}

impl PartitionRouter for AccountRouter<'_> {
    fn partitions(&self) -> Result<Vec<Partition>> {
        if let Some(other) = placeholders(self.resource.path)
            .into_iter()
            .find(|p| *p != "account_id")
        {
            return Err(Error::UnresolvedPlaceholder {
                placeholder: other.to_string(),
                path: self.resource.path.to_string(),
            });
        }

        if !self.resource.requires_account() {
            return Ok(vec![Partition::empty()]);
        }
        if self.account_ids.is_empty() {
            return Err(Error::config(format!(
                "stream '{}' requires at least one account id",
                self.resource.name
            )));
        }

        Ok(self
            .account_ids
            .iter()
            .map(|id| Partition::new(format!("account_id={id}")).with_value("account_id", id.as_str()))
            .collect())
    }
}

/// Partitions of a top-level resource
pub fn enumerate(resource: &ResourceDescriptor, account_ids: &[String]) -> Result<Vec<Partition>> {
    AccountRouter::new(resource, account_ids).partitions()
}

// ============================================================================
// Parent Router
// ============================================================================

/// Derives child partitions from parent records
#[derive(Debug, Clone, Copy)]
pub struct ParentRouter {
    rule: ChildContextRule,
}

impl ParentRouter {
    /// Create a parent router from a child context rule
    pub fn new(rule: ChildContextRule) -> Self {
        Self { rule }
    }

    /// Child context for one parent record
    ///
    /// The parent's context is inherited; fields missing or null in the
    /// record are left out, so a path that needs them fails to render.
    pub fn child_partition(&self, parent: &Partition, record: &Record) -> Partition {
        let mut child = parent.clone();
        let mut id_parts = Vec::new();
        if !parent.values.is_empty() {
            id_parts.push(parent.id.clone());
        }

        for (context_key, field) in self.rule.fields {
            match record.get(*field) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    child.values.insert((*context_key).to_string(), value.clone());
                    if !value.is_boolean() {
                        let rendered = value
                            .as_str()
                            .map_or_else(|| value.to_string(), ToString::to_string);
                        id_parts.push(format!("{context_key}={rendered}"));
                    }
                }
            }
        }

        if !id_parts.is_empty() {
            child.id = id_parts.join(",");
        }
        child
    }
}

/// Child context derived from a parent partition and record
pub fn child_partition(parent: &Partition, record: &Record, rule: ChildContextRule) -> Partition {
    ParentRouter::new(rule).child_partition(parent, record)
}
