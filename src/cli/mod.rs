//! CLI module
//!
//! Command-line interface for running the extractor.
//!
//! # Commands
//!
//! - `discover` - Emit the catalog with resolved schemas
//! - `read` - Extract data from streams
//! - `streams` - List stream names (lightweight)
//! - `spec` - Show the configuration schema

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
