//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use search_batch::config::StoreConfig;
use search_batch::query::Query;
use search_batch::storage::{
    DocumentOperations, InMemoryClient, SearchHits, SearchOperations, StorageError, StorageResult,
};
use search_batch::{DocumentId, DocumentType, IndexName, IndexRequest};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One call received by a [`RecordingClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Index {
        id: Option<String>,
        document_type: String,
        index: Option<String>,
        source: Value,
    },
    Delete {
        id: String,
        document_type: String,
    },
    Search {
        page: usize,
        size: usize,
    },
}

/// Client that records every call and stores documents in memory.
///
/// With `fail_at(n)` the n-th write call (0-based) and every later one fails.
pub struct RecordingClient {
    inner: InMemoryClient,
    calls: Mutex<Vec<Call>>,
    writes: AtomicUsize,
    fail_at: Option<usize>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            inner: InMemoryClient::new(),
            calls: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    pub fn fail_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Search { .. }))
            .collect()
    }

    pub fn store(&self) -> &InMemoryClient {
        &self.inner
    }

    /// Seed documents without recording calls
    pub fn seed(&self, document_type: &str, count: usize) {
        for i in 0..count {
            self.inner
                .index(
                    &IndexRequest::new(document_type, json!({"n": i, "title": format!("doc {i}")}))
                        .with_id(format!("{document_type}-{i}")),
                    None,
                )
                .expect("seeding the in-memory store");
        }
    }

    fn check_failure(&self) -> StorageResult<()> {
        let call = self.writes.fetch_add(1, Ordering::SeqCst);
        match self.fail_at {
            Some(n) if call >= n => Err(StorageError::General(format!("write call {call} rejected"))),
            _ => Ok(()),
        }
    }
}

impl SearchOperations for RecordingClient {
    fn search(&self, query: &Query, document_type: &DocumentType) -> StorageResult<SearchHits<Value>> {
        let page = query.page();
        self.calls.lock().push(Call::Search {
            page: page.page,
            size: page.size,
        });
        self.inner.search(query, document_type)
    }
}

impl DocumentOperations for RecordingClient {
    fn index(&self, request: &IndexRequest, index: Option<&IndexName>) -> StorageResult<DocumentId> {
        self.calls.lock().push(Call::Index {
            id: request.id.as_ref().map(|id| id.to_string()),
            document_type: request.document_type.to_string(),
            index: index.map(|index| index.to_string()),
            source: request.source.clone(),
        });
        self.check_failure()?;
        self.inner.index(request, index)
    }

    fn delete(&self, id: &DocumentId, document_type: &DocumentType) -> StorageResult<()> {
        self.calls.lock().push(Call::Delete {
            id: id.to_string(),
            document_type: document_type.to_string(),
        });
        self.check_failure()?;
        self.inner.delete(id, document_type)
    }
}

/// Store settings sized for tests: one writer thread
pub fn test_store_config() -> StoreConfig {
    StoreConfig {
        writer_threads: 1,
        writer_heap_bytes: 50_000_000,
        ..StoreConfig::default()
    }
}
