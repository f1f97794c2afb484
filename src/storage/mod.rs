//! Search client collaborators.
//!
//! The reader only needs [`SearchOperations`], the writer only needs
//! [`DocumentOperations`]. Both are object safe so callers can hand in
//! `Arc<dyn ...>` handles. Two implementations ship with the crate:
//! [`InMemoryClient`] and [`TantivyClient`].

pub mod error;
pub mod memory;
pub mod tantivy;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryClient;
pub use self::tantivy::{RefreshPolicy, TantivyClient};

use crate::query::Query;
use crate::request::IndexRequest;
use crate::types::{DocumentId, DocumentType, IndexName};
use serde_json::Value;
use std::collections::HashMap;

/// One search result: the document plus ranking metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<T> {
    pub id: DocumentId,
    pub index: IndexName,
    pub score: f32,
    /// Highlighted fragments by field, empty when the client does not highlight
    pub highlight: HashMap<String, Vec<String>>,
    pub content: T,
}

impl<T> SearchHit<T> {
    pub fn new(id: DocumentId, index: IndexName, score: f32, content: T) -> Self {
        Self {
            id,
            index,
            score,
            highlight: HashMap::new(),
            content,
        }
    }

    pub fn into_content(self) -> T {
        self.content
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits<T> {
    /// Number of matches across all pages
    pub total_hits: u64,
    pub hits: Vec<SearchHit<T>>,
}

impl<T> SearchHits<T> {
    pub fn new(total_hits: u64, hits: Vec<SearchHit<T>>) -> Self {
        Self { total_hits, hits }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl<T> IntoIterator for SearchHits<T> {
    type Item = SearchHit<T>;
    type IntoIter = std::vec::IntoIter<SearchHit<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Query execution against a search index.
pub trait SearchOperations: Send + Sync {
    /// Run `query` restricted to documents of `target_type` and return the
    /// page selected by the query's cursor.
    fn search(&self, query: &Query, target_type: &DocumentType) -> StorageResult<SearchHits<Value>>;
}

/// Document mutations against a search index.
pub trait DocumentOperations: Send + Sync {
    /// Upsert the request's document into `index`, or the client's default
    /// index when `None`. Returns the id the document was stored under.
    fn index(&self, request: &IndexRequest, index: Option<&IndexName>) -> StorageResult<DocumentId>;

    /// Remove the document with `id` and `document_type`. Deleting a missing
    /// document is not an error.
    fn delete(&self, id: &DocumentId, document_type: &DocumentType) -> StorageResult<()>;
}

/// Collect every string and number value inside a JSON document, depth first.
pub(crate) fn text_values(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| text_values(item, out)),
        Value::Object(map) => map.values().for_each(|item| text_values(item, out)),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(_) | Value::Null => {}
    }
}

/// Render a JSON scalar the way term criteria compare it.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
