//! Message sinks

use crate::engine::Message;
use crate::error::{Error, Result};
use crate::types::Record;
use async_trait::async_trait;
use std::io::Write;

/// Destination for sync messages
#[async_trait]
pub trait MessageSink: Send {
    /// Write one message
    async fn send(&mut self, message: &Message) -> Result<()>;

    /// Flush anything buffered
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// JSON Lines
// ============================================================================

/// Writes each message as a single JSON line
///
/// The writer is flushed after every `STATE` message so a consumer never
/// sees a state that precedes records still sitting in the buffer.
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write + Send> {
    writer: W,
    lines: usize,
}

impl JsonLinesWriter<std::io::BufWriter<std::io::Stdout>> {
    /// Writer over standard output
    pub fn stdout() -> Self {
        Self::new(std::io::BufWriter::new(std::io::stdout()))
    }
}

impl<W: Write + Send> JsonLinesWriter<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> MessageSink for JsonLinesWriter<W> {
    async fn send(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        if message.is_state() {
            self.writer.flush()?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::Other(format!("Failed to flush output: {e}")))
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Keeps every message, in emission order
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    /// Messages received
    pub messages: Vec<Message>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted for a stream
    pub fn records(&self, stream: &str) -> Vec<&Record> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, record, ..
                } if s == stream => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Streams that received a `SCHEMA` message, in order
    pub fn schemas(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Schema { stream, .. } => Some(stream.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Value of the last `STATE` message
    pub fn last_state(&self) -> Option<&serde_json::Value> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::State { value } => Some(value),
            _ => None,
        })
    }
}

#[async_trait]
impl MessageSink for CollectingSink {
    async fn send(&mut self, message: &Message) -> Result<()> {
        self.messages.push(message.clone());
        Ok(())
    }
}
