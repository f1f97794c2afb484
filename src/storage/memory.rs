use super::{
    DocumentOperations, SearchHit, SearchHits, SearchOperations, StorageResult, scalar_text,
    text_values,
};
use crate::query::{Criteria, Query};
use crate::request::IndexRequest;
use crate::types::{DocumentId, DocumentType, IndexName};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default index used when a write names none
pub const DEFAULT_INDEX: &str = "default";

#[derive(Clone, Debug)]
struct StoredDocument {
    /// Insertion sequence, kept across upserts so result order is stable
    seq: u64,
    document_type: DocumentType,
    source: Value,
    routing: Option<String>,
}

/// Search client that keeps every document in process memory.
///
/// Hits come back in insertion order with a constant score of `1.0`.
#[derive(Clone, Debug)]
pub struct InMemoryClient {
    documents: Arc<DashMap<(IndexName, DocumentId), StoredDocument>>,
    next_seq: Arc<AtomicU64>,
    default_index: IndexName,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::with_default_index(IndexName::new(DEFAULT_INDEX))
    }

    pub fn with_default_index(default_index: IndexName) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            default_index,
        }
    }

    pub fn get(&self, index: &IndexName, id: &DocumentId) -> Option<Value> {
        self.documents
            .get(&(index.clone(), id.clone()))
            .map(|entry| entry.source.clone())
    }

    pub fn routing(&self, index: &IndexName, id: &DocumentId) -> Option<String> {
        self.documents
            .get(&(index.clone(), id.clone()))
            .and_then(|entry| entry.routing.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&self) {
        self.documents.clear();
    }

    fn matches(criteria: &Criteria, source: &Value) -> bool {
        match criteria {
            Criteria::MatchAll => true,
            Criteria::QueryString { text } => {
                let mut values = Vec::new();
                text_values(source, &mut values);
                let haystack = values.join(" ").to_lowercase();
                text.split_whitespace()
                    .all(|term| haystack.contains(&term.to_lowercase()))
            }
            Criteria::Term { field, value } => source
                .get(field)
                .and_then(scalar_text)
                .is_some_and(|actual| actual == *value),
        }
    }
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchOperations for InMemoryClient {
    fn search(&self, query: &Query, target_type: &DocumentType) -> StorageResult<SearchHits<Value>> {
        let mut matched: Vec<(u64, IndexName, DocumentId, Value)> = self
            .documents
            .iter()
            .filter(|entry| {
                let (index, _) = entry.key();
                let doc = entry.value();
                doc.document_type == *target_type
                    && query.index().is_none_or(|wanted| wanted == index)
                    && Self::matches(query.criteria(), &doc.source)
            })
            .map(|entry| {
                let (index, id) = entry.key();
                (
                    entry.value().seq,
                    index.clone(),
                    id.clone(),
                    entry.value().source.clone(),
                )
            })
            .collect();

        matched.sort_by_key(|(seq, ..)| *seq);

        let total_hits = matched.len() as u64;
        let page = query.page();
        let hits = matched
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .map(|(_, index, id, source)| SearchHit::new(id, index, 1.0, source))
            .collect();

        Ok(SearchHits::new(total_hits, hits))
    }
}

impl DocumentOperations for InMemoryClient {
    fn index(&self, request: &IndexRequest, index: Option<&IndexName>) -> StorageResult<DocumentId> {
        let index = index.cloned().unwrap_or_else(|| self.default_index.clone());
        let id = request.id.clone().unwrap_or_else(DocumentId::generate);
        let key = (index, id.clone());

        let seq = match self.documents.get(&key) {
            Some(existing) => existing.seq,
            None => self.next_seq.fetch_add(1, Ordering::SeqCst),
        };

        self.documents.insert(
            key,
            StoredDocument {
                seq,
                document_type: request.document_type.clone(),
                source: request.source.clone(),
                routing: request.routing.clone(),
            },
        );

        Ok(id)
    }

    fn delete(&self, id: &DocumentId, document_type: &DocumentType) -> StorageResult<()> {
        self.documents
            .retain(|(_, doc_id), doc| !(doc_id == id && doc.document_type == *document_type));
        Ok(())
    }
}
