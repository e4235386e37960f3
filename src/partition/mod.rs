//! Partition routing module
//!
//! Supports: per-account partitions, a single unscoped partition, and child
//! partitions derived from parent records.
//!
//! # Overview
//!
//! A partition is the context one sync of one resource runs in: the values
//! substituted into the path template (`account_id`, `run_id`) plus any flags
//! inherited from a parent record (`artifacts_saved`).

mod routers;
mod types;

pub use routers::{child_partition, enumerate, placeholders, AccountRouter, ParentRouter};
pub use types::{Partition, PartitionRouter};

#[cfg(test)]
mod tests;
