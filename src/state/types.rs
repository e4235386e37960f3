//! State types for tracking sync progress
//!
//! ```json
//! {"streams": {"runs": {"partitions": {
//!     "account_id=1000": {"cursor": "2023-06-03T10:00:00Z", "completed": true}}}}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state of the connector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Watermark of a stream, or of one of its partitions when `partition` is set
    pub fn watermark(&self, stream: &str, partition: Option<&str>) -> Option<&str> {
        let stream = self.streams.get(stream)?;
        match partition {
            None => stream.cursor.as_deref(),
            Some(key) => stream.partitions.get(key)?.cursor.as_deref(),
        }
    }

    /// Record a finished partition and its watermark
    ///
    /// A `None` watermark keeps the previous value.
    pub fn commit(&mut self, stream: &str, partition: Option<&str>, watermark: Option<String>) {
        let stream = self.get_stream_mut(stream);
        match partition {
            None => {
                if watermark.is_some() {
                    stream.cursor = watermark;
                }
            }
            Some(key) => {
                let partition = stream.get_partition_mut(key);
                if watermark.is_some() {
                    partition.cursor = watermark;
                }
                partition.completed = true;
            }
        }
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Stream-level watermark, for unpartitioned state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    /// Per-partition state
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partitions: BTreeMap<String, PartitionState>,
}

impl StreamState {
    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, partition_key: &str) -> &mut PartitionState {
        self.partitions.entry(partition_key.to_string()).or_default()
    }

    /// Check if a partition finished in the last run that reached it
    pub fn is_partition_completed(&self, partition_key: &str) -> bool {
        self.partitions
            .get(partition_key)
            .is_some_and(|p| p.completed)
    }
}

/// State for a single partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Watermark within this partition
    #[serde(default)]
    pub cursor: Option<String>,

    /// Whether this partition has been fully synced
    #[serde(default)]
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.streams.is_empty());
        assert!(state.watermark("runs", None).is_none());
    }

    #[test]
    fn test_commit_stream_level() {
        let mut state = State::new();
        state.commit("jobs", None, Some("2024-01-01T00:00:00Z".to_string()));
        assert_eq!(state.watermark("jobs", None), Some("2024-01-01T00:00:00Z"));

        // committing without a watermark keeps the old one
        state.commit("jobs", None, None);
        assert_eq!(state.watermark("jobs", None), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_commit_partition() {
        let mut state = State::new();
        state.commit("runs", Some("account_id=1"), Some("2023-06-03T00:00:00".to_string()));
        state.commit("runs", Some("account_id=2"), None);

        assert_eq!(
            state.watermark("runs", Some("account_id=1")),
            Some("2023-06-03T00:00:00")
        );
        assert!(state.watermark("runs", Some("account_id=2")).is_none());

        let runs = state.get_stream("runs").unwrap();
        assert!(runs.is_partition_completed("account_id=1"));
        assert!(runs.is_partition_completed("account_id=2"));
        assert!(!runs.is_partition_completed("account_id=3"));
        assert!(runs.cursor.is_none());
    }

    #[test]
    fn test_state_serialization() {
        let mut state = State::new();
        state.commit("runs", Some("account_id=1"), Some("2023-06-03T00:00:00".to_string()));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"streams": {"runs": {"partitions": {
                "account_id=1": {"cursor": "2023-06-03T00:00:00", "completed": true}
            }}}})
        );

        let restored: State = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let state: State = serde_json::from_str(
            r#"{"streams": {"runs": {"cursor": "x", "extra": 1}}, "bookmarks": {}}"#,
        )
        .unwrap();
        assert_eq!(state.watermark("runs", None), Some("x"));
    }
}
