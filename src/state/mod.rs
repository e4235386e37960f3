//! State management module
//!
//! Tracks the incremental watermark of every stream, per partition where
//! the stream is partitioned, and persists it between runs.
//!
//! # Overview
//!
//! - `State` - serialized shape of the state file
//! - `StateManager` - shared handle with atomic file persistence
//!
//! Watermarks are committed only when a partition completes, so an aborted
//! run never records progress past what was actually emitted.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{PartitionState, State, StreamState};
