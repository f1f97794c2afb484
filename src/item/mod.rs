//! Item-level building blocks of a chunk-oriented job
//!
//! A job pulls items from an [`ItemReader`], hands chunks of them to an
//! [`ItemWriter`] and lets every [`ItemStream`] save its position in an
//! [`ExecutionContext`] after each committed chunk.

pub mod context;
pub mod jsonl;
pub mod paging;

pub use context::ExecutionContext;
pub use jsonl::{JsonLinesReader, JsonLinesWriter};
pub use paging::{PageSource, PagingItemReader};

use crate::error::BatchResult;
use crate::request::Chunk;
use crate::transaction::Transaction;

/// Pull-based source of items. `Ok(None)` signals the end of the data.
pub trait ItemReader<T> {
    fn read(&mut self) -> BatchResult<Option<T>>;
}

/// Sink for chunks of items.
///
/// `transaction` is the scope the chunk is being processed in, if any.
pub trait ItemWriter<T> {
    fn write(&mut self, chunk: &Chunk<T>, transaction: Option<&mut Transaction>) -> BatchResult<()>;
}

/// Open/update/close lifecycle with restartable state.
pub trait ItemStream {
    fn open(&mut self, _context: &ExecutionContext) -> BatchResult<()> {
        Ok(())
    }

    fn update(&mut self, _context: &mut ExecutionContext) -> BatchResult<()> {
        Ok(())
    }

    fn close(&mut self) -> BatchResult<()> {
        Ok(())
    }
}
