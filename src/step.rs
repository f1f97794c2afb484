//! Chunk-oriented step: read, process and write items one transaction per chunk.

use crate::error::{BatchResult, ConfigError};
use crate::item::{ExecutionContext, ItemReader, ItemStream, ItemWriter};
use crate::request::Chunk;
use crate::transaction::{Transaction, TransactionDefinition, TransactionManager};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// At least one item was read
    Completed,
    /// The reader had nothing to offer
    Noop,
}

/// Counters of a finished step. Only committed chunks are counted, except for
/// `rollback_count`. Items handed to the writer inside a read-only transaction
/// are not written and do not count towards `write_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepExecution {
    pub step_name: String,
    pub read_count: usize,
    pub filter_count: usize,
    pub write_count: usize,
    pub commit_count: usize,
    pub rollback_count: usize,
    pub status: StepStatus,
}

impl StepExecution {
    fn new(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            commit_count: 0,
            rollback_count: 0,
            status: StepStatus::Noop,
        }
    }
}

impl fmt::Display for StepExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: read={} filtered={} written={} commits={} rollbacks={}",
            self.step_name,
            self.read_count,
            self.filter_count,
            self.write_count,
            self.commit_count,
            self.rollback_count
        )
    }
}

#[derive(Debug, Default)]
struct ChunkCounts {
    read: usize,
    filtered: usize,
    written: usize,
}

pub struct ChunkStep {
    name: String,
    commit_interval: usize,
    definition: TransactionDefinition,
    manager: Arc<TransactionManager>,
}

impl ChunkStep {
    pub fn new(
        name: impl Into<String>,
        commit_interval: usize,
        manager: Arc<TransactionManager>,
    ) -> BatchResult<Self> {
        if commit_interval == 0 {
            return Err(ConfigError::InvalidCommitInterval.into());
        }
        let name = name.into();
        Ok(Self {
            definition: TransactionDefinition::named(name.clone()),
            name,
            commit_interval,
            manager,
        })
    }

    /// Transaction attributes used for every chunk. The name of each chunk
    /// transaction is derived from the step name unless the definition sets one.
    pub fn with_definition(mut self, definition: TransactionDefinition) -> Self {
        self.definition = definition;
        self
    }

    /// Run every chunk in a read-only transaction
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.definition.read_only = read_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit_interval(&self) -> usize {
        self.commit_interval
    }

    pub fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    /// Drive `reader` to exhaustion.
    ///
    /// `processor` returning `Ok(None)` filters the item out. Any error rolls the
    /// current chunk back, closes both streams and is returned as is; chunks that
    /// committed before stay committed.
    pub fn run<I, O, R, W, P>(
        &self,
        reader: &mut R,
        mut processor: P,
        writer: &mut W,
        context: &mut ExecutionContext,
    ) -> BatchResult<StepExecution>
    where
        R: ItemReader<I> + ItemStream,
        W: ItemWriter<O> + ItemStream,
        P: FnMut(I) -> BatchResult<Option<O>>,
    {
        info!(
            "Starting step '{}' (commit interval {}, read_only={})",
            self.name, self.commit_interval, self.definition.read_only
        );

        let mut execution = StepExecution::new(&self.name);
        let result = self.run_chunks(reader, &mut processor, writer, context, &mut execution);

        let closed = reader.close().and(writer.close());
        match (result, closed) {
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!("Failed to close streams of step '{}': {close_error}", self.name);
                }
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => {
                if execution.read_count > 0 {
                    execution.status = StepStatus::Completed;
                }
                info!("Finished step {execution}");
                Ok(execution)
            }
        }
    }

    fn run_chunks<I, O, R, W, P>(
        &self,
        reader: &mut R,
        processor: &mut P,
        writer: &mut W,
        context: &mut ExecutionContext,
        execution: &mut StepExecution,
    ) -> BatchResult<()>
    where
        R: ItemReader<I> + ItemStream,
        W: ItemWriter<O> + ItemStream,
        P: FnMut(I) -> BatchResult<Option<O>>,
    {
        reader.open(context)?;
        writer.open(context)?;

        loop {
            let mut transaction = self.manager.begin(&self.definition);

            let counts = match self.process_chunk(reader, processor, writer, &mut transaction) {
                Ok(counts) => counts,
                Err(e) => {
                    self.manager.rollback(&mut transaction)?;
                    execution.rollback_count += 1;
                    return Err(e);
                }
            };

            if let Err(e) = self.manager.commit(&mut transaction) {
                // a failed commit has already rolled the transaction back
                if transaction.is_completed() {
                    execution.rollback_count += 1;
                }
                return Err(e);
            }

            execution.commit_count += 1;
            execution.read_count += counts.read;
            execution.filter_count += counts.filtered;
            execution.write_count += counts.written;

            if counts.read == 0 {
                return Ok(());
            }

            reader.update(context)?;
            writer.update(context)?;
            debug!(
                "Step '{}' committed chunk {} ({} read, {} written)",
                self.name, execution.commit_count, counts.read, counts.written
            );
        }
    }

    fn process_chunk<I, O, R, W, P>(
        &self,
        reader: &mut R,
        processor: &mut P,
        writer: &mut W,
        transaction: &mut Transaction,
    ) -> BatchResult<ChunkCounts>
    where
        R: ItemReader<I>,
        W: ItemWriter<O>,
        P: FnMut(I) -> BatchResult<Option<O>>,
    {
        let mut counts = ChunkCounts::default();
        let mut chunk = Chunk::with_capacity(self.commit_interval);

        while counts.read < self.commit_interval {
            let Some(item) = reader.read()? else {
                break;
            };
            counts.read += 1;
            match processor(item)? {
                Some(output) => chunk.push(output),
                None => counts.filtered += 1,
            }
        }

        if !chunk.is_empty() {
            writer.write(&chunk, Some(transaction))?;
            if !transaction.is_read_only() {
                counts.written = chunk.len();
            }
        }
        Ok(counts)
    }
}
