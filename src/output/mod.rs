//! Output module
//!
//! Where sync messages go.
//!
//! # Overview
//!
//! - `MessageSink` - async destination for `SCHEMA`/`RECORD`/`STATE` messages
//! - `JsonLinesWriter` - one JSON document per line, for stdout
//! - `CollectingSink` - keeps messages in memory

mod sink;

pub use sink::{CollectingSink, JsonLinesWriter, MessageSink};

#[cfg(test)]
mod tests;
