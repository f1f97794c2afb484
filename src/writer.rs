//! Transaction-synchronized writer for search documents
//!
//! A chunk is written straight away when there is no transaction to wait for.
//! Inside an open transaction it is parked in a before-commit callback and hits
//! the client only when the transaction commits. A rollback discards it, and a
//! read-only transaction skips it.
//!
//! ```text
//!            register                 commit (not read-only)
//!   write() ---------> Pending ------------------------------> Applied
//!                         |
//!                         +-- rollback / read-only commit ----> Discarded
//! ```

use crate::error::{BatchError, BatchResult, ConfigError};
use crate::item::{ItemStream, ItemWriter};
use crate::request::{Chunk, WriteRequest};
use crate::storage::{DocumentOperations, StorageResult};
use crate::transaction::{CompletionStatus, Transaction, TransactionSynchronization};
use crate::types::IndexName;
use std::sync::Arc;
use tracing::{debug, trace};

pub const MISSING_DOCUMENT_OPERATIONS: &str = "A DocumentOperations implementation is required.";

/// Writes chunks of [`WriteRequest`]s to a search index.
#[derive(Clone)]
pub struct SearchItemWriter {
    client: Arc<dyn DocumentOperations>,
    index: Option<IndexName>,
}

impl SearchItemWriter {
    /// Build a writer. `index` may be `None`, in which case the client's default
    /// index receives the documents.
    pub fn new(
        client: Option<Arc<dyn DocumentOperations>>,
        index: Option<IndexName>,
    ) -> BatchResult<Self> {
        let client = client.ok_or(ConfigError::MissingCollaborators {
            missing: vec![MISSING_DOCUMENT_OPERATIONS],
        })?;
        Ok(Self { client, index })
    }

    pub fn builder() -> SearchItemWriterBuilder {
        SearchItemWriterBuilder::default()
    }

    pub fn index(&self) -> Option<&IndexName> {
        self.index.as_ref()
    }

    /// Write `chunk`, synchronizing with `transaction` when one is open.
    ///
    /// - empty chunk: nothing happens
    /// - no transaction, no synchronization, or no actual transaction: applied now
    /// - read-only transaction: skipped without error
    /// - otherwise: applied right before the transaction commits
    pub fn write(
        &self,
        chunk: &Chunk<WriteRequest>,
        transaction: Option<&mut Transaction>,
    ) -> BatchResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let transaction = match transaction {
            Some(tx) if tx.is_synchronization_active() && tx.is_actual_transaction_active() => tx,
            _ => {
                debug!("No transaction to synchronize with, writing {} request(s) now", chunk.len());
                return apply(self.client.as_ref(), self.index.as_ref(), chunk.items())
                    .map_err(BatchError::from);
            }
        };

        if transaction.is_read_only() {
            debug!(
                "Transaction '{}' is read-only, skipping {} request(s)",
                transaction.name(),
                chunk.len()
            );
            return Ok(());
        }

        debug!(
            "Deferring {} request(s) until transaction '{}' commits",
            chunk.len(),
            transaction.name()
        );
        transaction.register_synchronization(Box::new(DeferredWrite::new(
            self.client.clone(),
            self.index.clone(),
            chunk.items().to_vec(),
        )))?;
        Ok(())
    }
}

impl ItemWriter<WriteRequest> for SearchItemWriter {
    fn write(
        &mut self,
        chunk: &Chunk<WriteRequest>,
        transaction: Option<&mut Transaction>,
    ) -> BatchResult<()> {
        SearchItemWriter::write(self, chunk, transaction)
    }
}

impl ItemStream for SearchItemWriter {}

/// Apply requests in order, stopping at the first failure. Requests applied
/// before the failure stay applied.
fn apply(
    client: &dyn DocumentOperations,
    index: Option<&IndexName>,
    requests: &[WriteRequest],
) -> StorageResult<()> {
    for request in requests {
        match request {
            WriteRequest::Index(index_request) => {
                let id = client.index(index_request, index)?;
                trace!("Indexed {} '{id}'", index_request.document_type);
            }
            WriteRequest::Delete(delete) => {
                client.delete(&delete.id, &delete.document_type)?;
                trace!("Deleted {} '{}'", delete.document_type, delete.id);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    Pending,
    Applied,
    Discarded,
}

/// A chunk waiting for its transaction to commit.
struct DeferredWrite {
    client: Arc<dyn DocumentOperations>,
    index: Option<IndexName>,
    requests: Vec<WriteRequest>,
    state: DeferredState,
}

impl DeferredWrite {
    fn new(
        client: Arc<dyn DocumentOperations>,
        index: Option<IndexName>,
        requests: Vec<WriteRequest>,
    ) -> Self {
        Self {
            client,
            index,
            requests,
            state: DeferredState::Pending,
        }
    }
}

impl TransactionSynchronization for DeferredWrite {
    fn before_commit(&mut self, read_only: bool) -> BatchResult<()> {
        if self.state != DeferredState::Pending {
            return Ok(());
        }
        if read_only {
            self.state = DeferredState::Discarded;
            return Ok(());
        }

        // leaves Pending before the first request goes out, so a failure never re-applies
        self.state = DeferredState::Applied;
        let requests = std::mem::take(&mut self.requests);
        apply(self.client.as_ref(), self.index.as_ref(), &requests)?;
        Ok(())
    }

    fn after_completion(&mut self, status: CompletionStatus) {
        if self.state == DeferredState::Pending {
            self.state = DeferredState::Discarded;
            self.requests.clear();
        }
        trace!("Deferred write finished as {:?} ({status:?})", self.state);
    }
}

/// Builder for [`SearchItemWriter`].
#[derive(Default)]
pub struct SearchItemWriterBuilder {
    client: Option<Arc<dyn DocumentOperations>>,
    index: Option<IndexName>,
}

impl SearchItemWriterBuilder {
    pub fn client(mut self, client: Arc<dyn DocumentOperations>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn index(mut self, index: impl Into<IndexName>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn build(self) -> BatchResult<SearchItemWriter> {
        SearchItemWriter::new(self.client, self.index)
    }
}
