//! Resource catalog
//!
//! Every dbt Cloud collection this connector knows about is described once,
//! as data. The engine never branches on a resource name: pagination,
//! cutoff, post-processing and child derivation are all picked from the
//! strategy variants attached to each [`ResourceDescriptor`].

use crate::error::{Error, Result};
use crate::types::ReplicationMethod;
use serde_json::{json, Value};

// ============================================================================
// Strategy Variants
// ============================================================================

/// Where a resource's schema comes from
#[derive(Debug, Clone, Copy)]
pub enum SchemaRef {
    /// Named component under `components.schemas` of the OpenAPI document
    Component(&'static str),
    /// Hand-declared schema for resources with no OpenAPI component
    Inline(fn() -> Value),
}

/// Replication strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// Re-fetch every record on every sync
    FullTable,
    /// Cut off at the stored watermark of `key`
    Incremental {
        /// Timestamp field used for ordering and cutoff
        key: &'static str,
    },
}

impl Replication {
    /// Replication key, if any
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Replication::FullTable => None,
            Replication::Incremental { key } => Some(key),
        }
    }

    /// Method reported in the catalog
    pub fn method(&self) -> ReplicationMethod {
        match self {
            Replication::FullTable => ReplicationMethod::FullTable,
            Replication::Incremental { .. } => ReplicationMethod::Incremental,
        }
    }
}

/// Pagination strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// `limit`/`offset` with `extra.pagination` metadata
    Offset,
    /// One request, no pagination wrapper
    SinglePage,
}

/// Shape of the items under `data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// Items are JSON objects
    Object,
    /// Items are scalars, wrapped into `{field: item}`
    Scalar {
        /// Name of the wrapping field
        field: &'static str,
    },
}

/// Hook applied to every raw record before the cutoff check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    /// Pass records through unchanged
    None,
    /// Copy these partition context fields into the record
    InjectContext(&'static [&'static str]),
    /// Drop records whose field is null or missing
    DropMissing(&'static str),
}

/// A documented error response that means "zero records"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftError {
    /// HTTP status code
    pub status: u16,
    /// Exact value of `data.reason` in the response body
    pub reason: &'static str,
}

/// How a parent record becomes a child partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildContextRule {
    /// `(context key, parent record field)` pairs added to the parent's context
    pub fields: &'static [(&'static str, &'static str)],
}

// ============================================================================
// Resource Descriptor
// ============================================================================

/// Static description of one dbt Cloud collection
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    /// Stream name
    pub name: &'static str,
    /// Path relative to the versioned base URL, with `{placeholder}` tokens
    pub path: &'static str,
    /// Schema source
    pub schema: SchemaRef,
    /// Ordered primary key
    pub primary_key: &'static [&'static str],
    /// Replication strategy
    pub replication: Replication,
    /// Name of the parent resource for child collections
    pub parent: Option<&'static str>,
    /// API version segment (`v2`, `v3`)
    pub api_version: &'static str,
    /// Pagination strategy
    pub pagination: PaginationStrategy,
    /// Shape of items under `data`
    pub record_shape: RecordShape,
    /// Post-processing hook
    pub post_process: PostProcess,
    /// Error responses reinterpreted as empty results
    pub soft_errors: &'static [SoftError],
    /// Context emitted to child resources per record
    pub child_context: Option<ChildContextRule>,
    /// Boolean context field that must be true for this child to be fetched
    pub child_gate: Option<&'static str>,
    /// Query parameter receiving `[start, max]` when a watermark is active
    pub range_filter: Option<&'static str>,
    /// Whether the stream is synced when no explicit selection is given
    pub selected_by_default: bool,
    /// Context keys that identify a partition in the state file
    pub state_partition_keys: &'static [&'static str],
}

impl ResourceDescriptor {
    /// Account-scoped, full-table resource backed by an OpenAPI component
    const fn account_scoped(name: &'static str, path: &'static str, component: &'static str) -> Self {
        Self {
            name,
            path,
            schema: SchemaRef::Component(component),
            primary_key: &["id"],
            replication: Replication::FullTable,
            parent: None,
            api_version: "v2",
            pagination: PaginationStrategy::Offset,
            record_shape: RecordShape::Object,
            post_process: PostProcess::None,
            soft_errors: &[],
            child_context: None,
            child_gate: None,
            range_filter: None,
            selected_by_default: true,
            state_partition_keys: &["account_id"],
        }
    }

    const fn api_version(mut self, version: &'static str) -> Self {
        self.api_version = version;
        self
    }

    const fn not_selected_by_default(mut self) -> Self {
        self.selected_by_default = false;
        self
    }

    /// Whether the path is scoped by `{account_id}`
    pub fn requires_account(&self) -> bool {
        self.path.contains("{account_id}")
    }

    /// Whether this resource is derived from a parent's records
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Whether a field is part of the primary key
    pub fn is_key(&self, field: &str) -> bool {
        self.primary_key.contains(&field)
    }

    /// Soft error matching a status and reason
    pub fn soft_error(&self, status: u16, reason: Option<&str>) -> Option<&SoftError> {
        self.soft_errors
            .iter()
            .find(|soft| soft.status == status && Some(soft.reason) == reason)
    }
}

/// Reason returned by the audit log endpoint on accounts without the feature
pub const AUDIT_LOGS_DISABLED: &str = "Audit logs are not enabled on this account";

fn run_artifact_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "account_id": {"type": ["string"]},
            "run_id": {"type": ["integer"]},
            "path": {"type": ["string"]}
        }
    })
}

const RESOURCES: &[ResourceDescriptor] = &[
    ResourceDescriptor {
        state_partition_keys: &[],
        ..ResourceDescriptor::account_scoped("accounts", "/accounts", "Account")
    },
    ResourceDescriptor::account_scoped("connections", "/accounts/{account_id}/connections", "Connection")
        .not_selected_by_default(),
    ResourceDescriptor::account_scoped("environments", "/accounts/{account_id}/environments", "Environment")
        .not_selected_by_default(),
    ResourceDescriptor::account_scoped("jobs", "/accounts/{account_id}/jobs", "Job"),
    ResourceDescriptor::account_scoped("projects", "/accounts/{account_id}/projects", "Project"),
    ResourceDescriptor::account_scoped("repositories", "/accounts/{account_id}/repositories", "Repository")
        .not_selected_by_default(),
    ResourceDescriptor {
        replication: Replication::Incremental { key: "finished_at" },
        child_context: Some(ChildContextRule {
            fields: &[("run_id", "id"), ("artifacts_saved", "artifacts_saved")],
        }),
        range_filter: Some("finished_at__range"),
        ..ResourceDescriptor::account_scoped("runs", "/accounts/{account_id}/runs", "Run")
    },
    ResourceDescriptor::account_scoped("users", "/accounts/{account_id}/users", "User")
        .not_selected_by_default(),
    ResourceDescriptor::account_scoped("groups", "/accounts/{account_id}/groups", "GroupResponse")
        .api_version("v3"),
    ResourceDescriptor {
        soft_errors: &[SoftError {
            status: 400,
            reason: AUDIT_LOGS_DISABLED,
        }],
        ..ResourceDescriptor::account_scoped(
            "audit_logs",
            "/accounts/{account_id}/audit-logs",
            "PublicAuditLogResponse",
        )
        .api_version("v3")
    },
    ResourceDescriptor {
        schema: SchemaRef::Inline(run_artifact_schema),
        primary_key: &["account_id", "run_id", "path"],
        parent: Some("runs"),
        pagination: PaginationStrategy::SinglePage,
        record_shape: RecordShape::Scalar { field: "path" },
        post_process: PostProcess::InjectContext(&["account_id", "run_id"]),
        child_gate: Some("artifacts_saved"),
        state_partition_keys: &[],
        ..ResourceDescriptor::account_scoped(
            "run_artifacts",
            "/accounts/{account_id}/runs/{run_id}/artifacts",
            "",
        )
    },
];

// ============================================================================
// Catalog
// ============================================================================

/// Registry of resource descriptors
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    resources: &'static [ResourceDescriptor],
}

impl Default for Catalog {
    fn default() -> Self {
        Self::dbt_cloud()
    }
}

impl Catalog {
    /// The dbt Cloud administrative API collections
    pub fn dbt_cloud() -> Self {
        Self {
            resources: RESOURCES,
        }
    }

    /// All resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &'static ResourceDescriptor> {
        self.resources.iter()
    }

    /// Look up a resource by name
    pub fn get(&self, name: &str) -> Result<&'static ResourceDescriptor> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::StreamNotFound {
                stream: name.to_string(),
            })
    }

    /// Direct children of a resource
    pub fn children_of(&self, name: &str) -> Vec<&'static ResourceDescriptor> {
        self.resources
            .iter()
            .filter(|r| r.parent == Some(name))
            .collect()
    }

    /// Resolve a stream selection
    ///
    /// `None` selects every stream marked `selected_by_default`. Unknown names
    /// are an error.
    pub fn select(&self, names: Option<&[String]>) -> Result<Vec<&'static ResourceDescriptor>> {
        match names {
            None => Ok(self.iter().filter(|r| r.selected_by_default).collect()),
            Some(names) => {
                for name in names {
                    self.get(name)?;
                }
                Ok(self
                    .iter()
                    .filter(|r| names.iter().any(|n| n == r.name))
                    .collect())
            }
        }
    }
}
