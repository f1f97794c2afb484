//! Batch reading and writing of search index documents.
//!
//! [`SearchItemReader`] pages through the results of a query. [`SearchItemWriter`]
//! writes index and delete requests, and when it runs inside a transaction it holds
//! them back until that transaction commits.

pub mod config;
pub mod error;
pub mod item;
pub mod logging;
pub mod query;
pub mod reader;
pub mod request;
pub mod step;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod writer;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{BatchError, BatchResult, ConfigError};
pub use item::{ExecutionContext, ItemReader, ItemStream, ItemWriter, PageSource, PagingItemReader};
pub use query::{Criteria, PageRequest, Query};
pub use reader::{SearchItemReader, SearchItemReaderBuilder};
pub use request::{Chunk, DeleteRequest, IndexRequest, WriteRequest};
pub use step::{ChunkStep, StepExecution, StepStatus};
pub use storage::{
    DocumentOperations, InMemoryClient, RefreshPolicy, SearchHit, SearchHits, SearchOperations,
    StorageError, StorageResult, TantivyClient,
};
pub use transaction::{
    CompletionStatus, Propagation, SynchronizationMode, Transaction, TransactionDefinition,
    TransactionError, TransactionManager, TransactionSynchronization,
};
pub use types::{DocumentId, DocumentType, IndexName};
pub use writer::{SearchItemWriter, SearchItemWriterBuilder};
