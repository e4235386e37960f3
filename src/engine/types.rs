//! Engine types
//!
//! Output messages, sync configuration and statistics.

use crate::types::Record;
use serde::Serialize;
use serde_json::Value;

/// A message emitted during sync
///
/// Serializes to the Singer wire format:
///
/// ```json
/// {"type": "RECORD", "stream": "jobs", "record": {"id": 1}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Schema of a stream, emitted before its first record
    Schema {
        /// Stream name
        stream: String,
        /// JSON schema of the records
        schema: Value,
        /// Primary key fields
        key_properties: Vec<String>,
        /// Replication key, for incremental streams
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: Record,
        /// When the record was extracted (RFC 3339)
        #[serde(skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },
    /// Full connector state
    State {
        /// State document
        value: Value,
    },
}

impl Message {
    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, record: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Create a state message
    pub fn state(value: Value) -> Self {
        Self::State { value }
    }

    /// Stream the message belongs to, if any
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}

/// Lifecycle of one partition sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing requested yet
    Pending,
    /// A page request is due
    Fetching,
    /// Draining a page; more pages follow
    Paginating,
    /// A record below the watermark was seen
    CutoffReached,
    /// Draining the last page
    Exhausted,
    /// Finished without error
    Done,
    /// Finished with an error
    Failed,
}

impl SyncPhase {
    /// Whether no more records will be produced
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CutoffReached | Self::Done | Self::Failed)
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records per page (`limit`)
    pub page_size: u32,
    /// Whether to stop at the first failed partition
    pub fail_fast: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            fail_fast: false,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Total streams synced
    pub streams_synced: usize,
    /// Partitions that completed
    pub partitions_synced: usize,
    /// Partitions that failed
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions attempted
    pub fn partitions_total(&self) -> usize {
        self.partitions_synced + self.errors
    }
}
