//! Write requests and the chunks they travel in.

use crate::types::{DocumentId, DocumentType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upsert of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    /// Explicit id; the client generates one when absent
    pub id: Option<DocumentId>,
    pub document_type: DocumentType,
    /// Document body as stored and returned by searches
    pub source: Value,
    /// Routing hint passed through to the client untouched
    pub routing: Option<String>,
}

impl IndexRequest {
    pub fn new(document_type: impl Into<DocumentType>, source: Value) -> Self {
        Self {
            id: None,
            document_type: document_type.into(),
            source,
            routing: None,
        }
    }

    /// Build a request from any serializable document.
    pub fn from_document<T: Serialize>(
        document_type: impl Into<DocumentType>,
        document: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(document_type, serde_json::to_value(document)?))
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }
}

/// Removal of one document by id and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: DocumentId,
    pub document_type: DocumentType,
}

impl DeleteRequest {
    pub fn new(id: impl Into<DocumentId>, document_type: impl Into<DocumentType>) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
        }
    }
}

/// A single write handed to [`crate::SearchItemWriter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum WriteRequest {
    Index(IndexRequest),
    Delete(DeleteRequest),
}

impl WriteRequest {
    pub fn index(request: IndexRequest) -> Self {
        Self::Index(request)
    }

    pub fn delete(id: impl Into<DocumentId>, document_type: impl Into<DocumentType>) -> Self {
        Self::Delete(DeleteRequest::new(id, document_type))
    }

    pub fn document_type(&self) -> &DocumentType {
        match self {
            Self::Index(request) => &request.document_type,
            Self::Delete(request) => &request.document_type,
        }
    }

    /// Short operation name used in log lines
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Index(_) => "index",
            Self::Delete(_) => "delete",
        }
    }
}

impl From<IndexRequest> for WriteRequest {
    fn from(request: IndexRequest) -> Self {
        Self::Index(request)
    }
}

impl From<DeleteRequest> for WriteRequest {
    fn from(request: DeleteRequest) -> Self {
        Self::Delete(request)
    }
}

/// Ordered group of items processed and written together.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    items: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for Chunk<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Chunk<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for Chunk<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Chunk<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Chunk<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
