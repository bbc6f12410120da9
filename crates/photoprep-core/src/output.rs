//! Response serialization as JSON or JSON Lines.
//!
//! JSON collects every response into a single array (or a bare object when
//! there is exactly one). JSON Lines streams one object per line as soon as
//! it is written.

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes responses to a writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    /// JSON mode buffers until `finish`
    pending: Vec<serde_json::Value>,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects JSON; JSON Lines is always compact.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            pending: Vec::new(),
            items_written: 0,
        }
    }

    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.pending
                    .push(serde_json::to_value(item).map_err(io::Error::other)?);
            }
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.items_written += 1;
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Emit anything buffered, flush, and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json && !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            let value = match <[_; 1]>::try_from(pending) {
                Ok([single]) => single,
                Err(many) => serde_json::Value::Array(many),
            };
            if self.pretty {
                serde_json::to_writer_pretty(&mut self.writer, &value)
            } else {
                serde_json::to_writer(&mut self.writer, &value)
            }
            .map_err(io::Error::other)?;
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
