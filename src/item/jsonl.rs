//! JSON-lines item reader and writer used by the CLI.

use super::{ExecutionContext, ItemReader, ItemStream, ItemWriter};
use crate::error::{BatchError, BatchResult};
use crate::request::Chunk;
use crate::transaction::Transaction;
use serde_json::Value;
use std::io::{BufRead, Write};

/// Reads one JSON value per line, skipping blank lines.
pub struct JsonLinesReader<R> {
    input: R,
    line_number: usize,
    item_count: usize,
    name: String,
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(name: impl Into<String>, input: R) -> Self {
        Self {
            input,
            line_number: 0,
            item_count: 0,
            name: name.into(),
        }
    }

    fn count_key(&self) -> String {
        format!("{}.read.count", self.name)
    }

    fn next_line(&mut self) -> BatchResult<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }
}

impl<R: BufRead> ItemReader<Value> for JsonLinesReader<R> {
    fn read(&mut self) -> BatchResult<Option<Value>> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let value = serde_json::from_str(line.trim()).map_err(|source| BatchError::Conversion {
            id: format!("line {}", self.line_number),
            target_type: "JSON value".to_string(),
            source,
        })?;
        self.item_count += 1;
        Ok(Some(value))
    }
}

impl<R: BufRead> ItemStream for JsonLinesReader<R> {
    /// Skip the items a previous run already consumed.
    fn open(&mut self, context: &ExecutionContext) -> BatchResult<()> {
        let Some(count) = context.get_usize(&self.count_key()) else {
            return Ok(());
        };
        while self.item_count < count {
            if self.next_line()?.is_none() {
                break;
            }
            self.item_count += 1;
        }
        Ok(())
    }

    fn update(&mut self, context: &mut ExecutionContext) -> BatchResult<()> {
        context.put_usize(self.count_key(), self.item_count);
        Ok(())
    }
}

/// Writes every item as one JSON line. Not transactional: lines are written
/// as soon as the chunk arrives.
pub struct JsonLinesWriter<W> {
    output: W,
    written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> ItemWriter<Value> for JsonLinesWriter<W> {
    fn write(&mut self, chunk: &Chunk<Value>, _transaction: Option<&mut Transaction>) -> BatchResult<()> {
        for item in chunk {
            serde_json::to_writer(&mut self.output, item).map_err(std::io::Error::from)?;
            self.output.write_all(b"\n")?;
            self.written += 1;
        }
        self.output.flush()?;
        Ok(())
    }
}

impl<W: Write> ItemStream for JsonLinesWriter<W> {
    fn close(&mut self) -> BatchResult<()> {
        self.output.flush()?;
        Ok(())
    }
}
