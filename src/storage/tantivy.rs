//! Tantivy-backed search client
//!
//! Every document is stored as one tantivy document with these fields:
//! - `_id`, `_type`, `_index`: raw strings, stored, used for filtering and addressing
//! - `_source`: the original JSON body, stored only
//! - `_all`: every string and number value of the body, tokenized for query strings
//! - `_terms`: `field=value` for each top-level scalar, raw, for term criteria

use super::{
    DocumentOperations, SearchHit, SearchHits, SearchOperations, StorageError, StorageResult,
    scalar_text, text_values,
};
use crate::config::StoreConfig;
use crate::query::{Criteria, Query};
use crate::request::IndexRequest;
use crate::types::{DocumentId, DocumentType, IndexName};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query as TantivyQuery, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, STORED, STRING, Schema, TEXT, Value as _};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

/// Separator between field name and value inside `_terms`
const TERM_SEPARATOR: char = '=';

/// When writes become visible to searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Commit and reload after every index or delete call
    #[default]
    Immediate,
    /// Writes stay staged until [`TantivyClient::refresh`] is called
    Manual,
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    id: Field,
    doc_type: Field,
    index: Field,
    source: Field,
    all: Field,
    terms: Field,
}

impl Fields {
    fn resolve(schema: &Schema) -> StorageResult<Self> {
        Ok(Self {
            id: schema.get_field("_id")?,
            doc_type: schema.get_field("_type")?,
            index: schema.get_field("_index")?,
            source: schema.get_field("_source")?,
            all: schema.get_field("_all")?,
            terms: schema.get_field("_terms")?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("_id", STRING | STORED);
    builder.add_text_field("_type", STRING | STORED);
    builder.add_text_field("_index", STRING | STORED);
    builder.add_text_field("_source", STORED);
    builder.add_text_field("_all", TEXT);
    builder.add_text_field("_terms", STRING);
    builder.build()
}

/// Search client over a single tantivy index.
pub struct TantivyClient {
    index: Index,
    fields: Fields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    default_index: IndexName,
    refresh: RefreshPolicy,
}

impl TantivyClient {
    /// Open the index stored under `path`, creating it when missing.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StorageResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)?;
        let index = Index::open_or_create(directory, build_schema())?;
        debug!("Opened tantivy index at {}", path.display());
        Self::from_index(index, config)
    }

    /// Create a throwaway index that lives in memory.
    pub fn in_ram(config: &StoreConfig) -> StorageResult<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), config)
    }

    fn from_index(index: Index, config: &StoreConfig) -> StorageResult<Self> {
        let fields = Fields::resolve(&index.schema())?;
        let writer = index
            .writer_with_num_threads::<TantivyDocument>(config.writer_threads.max(1), config.writer_heap_bytes)
            .map_err(|e| StorageError::TantivyOperation {
                operation: "open_writer".to_string(),
                cause: e.to_string(),
            })?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader,
            default_index: IndexName::new(config.default_index.clone()),
            refresh: config.refresh,
        })
    }

    /// Commit staged writes and make them visible to searches.
    pub fn refresh(&self) -> StorageResult<()> {
        self.writer.lock().commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Number of live documents visible to searches
    pub fn document_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn default_index(&self) -> &IndexName {
        &self.default_index
    }

    fn term_clause(&self, field: Field, text: &str) -> (Occur, Box<dyn TantivyQuery>) {
        (
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_text(field, text),
                IndexRecordOption::Basic,
            )),
        )
    }

    fn criteria_query(&self, criteria: &Criteria) -> StorageResult<Box<dyn TantivyQuery>> {
        Ok(match criteria {
            Criteria::MatchAll => Box::new(AllQuery),
            Criteria::QueryString { text } => {
                let parser = QueryParser::for_index(&self.index, vec![self.fields.all]);
                parser.parse_query(text)?
            }
            Criteria::Term { field, value } => {
                let term = format!("{field}{TERM_SEPARATOR}{value}");
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.terms, &term),
                    IndexRecordOption::Basic,
                ))
            }
        })
    }

    fn after_write(&self, writer: &mut IndexWriter) -> StorageResult<()> {
        if self.refresh == RefreshPolicy::Immediate {
            writer.commit()?;
            self.reader.reload()?;
        }
        Ok(())
    }

    fn to_hit(
        &self,
        score: f32,
        document: &TantivyDocument,
    ) -> StorageResult<SearchHit<Value>> {
        let text = |field: Field| {
            document
                .get_first(field)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let id = text(self.fields.id);
        let source = serde_json::from_str(&text(self.fields.source))
            .map_err(|source| StorageError::CorruptSource { id: id.clone(), source })?;

        Ok(SearchHit::new(
            DocumentId::new(id),
            IndexName::new(text(self.fields.index)),
            score,
            source,
        ))
    }
}

impl SearchOperations for TantivyClient {
    fn search(&self, query: &Query, target_type: &DocumentType) -> StorageResult<SearchHits<Value>> {
        let mut clauses = vec![
            (Occur::Must, self.criteria_query(query.criteria())?),
            self.term_clause(self.fields.doc_type, target_type.as_str()),
        ];
        if let Some(index) = query.index() {
            clauses.push(self.term_clause(self.fields.index, index.as_str()));
        }
        let combined = BooleanQuery::new(clauses);

        let page = query.page();
        let searcher = self.reader.searcher();
        let collector = (
            Count,
            TopDocs::with_limit(page.size.max(1)).and_offset(page.offset()),
        );
        let (total, top_docs) = searcher.search(&combined, &collector)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let document: TantivyDocument = searcher.doc(address)?;
            hits.push(self.to_hit(score, &document)?);
        }

        Ok(SearchHits::new(total as u64, hits))
    }
}

impl DocumentOperations for TantivyClient {
    fn index(&self, request: &IndexRequest, index: Option<&IndexName>) -> StorageResult<DocumentId> {
        let index = index.unwrap_or(&self.default_index);
        let id = request.id.clone().unwrap_or_else(DocumentId::generate);

        let Value::Object(fields) = &request.source else {
            return Err(StorageError::InvalidDocument {
                id: id.to_string(),
                reason: "document source must be a JSON object".to_string(),
            });
        };
        let source_text =
            serde_json::to_string(&request.source).map_err(|e| StorageError::InvalidDocument {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let mut document = TantivyDocument::new();
        document.add_text(self.fields.id, id.as_str());
        document.add_text(self.fields.doc_type, request.document_type.as_str());
        document.add_text(self.fields.index, index.as_str());
        document.add_text(self.fields.source, &source_text);

        let mut all = Vec::new();
        text_values(&request.source, &mut all);
        document.add_text(self.fields.all, all.join(" "));

        for (name, value) in fields {
            if let Some(text) = scalar_text(value) {
                document.add_text(self.fields.terms, format!("{name}{TERM_SEPARATOR}{text}"));
            }
        }

        let mut writer = self.writer.lock();
        writer.delete_query(Box::new(BooleanQuery::new(vec![
            self.term_clause(self.fields.id, id.as_str()),
            self.term_clause(self.fields.index, index.as_str()),
        ])))?;
        writer.add_document(document)?;
        self.after_write(&mut writer)?;

        Ok(id)
    }

    fn delete(&self, id: &DocumentId, document_type: &DocumentType) -> StorageResult<()> {
        let mut writer = self.writer.lock();
        writer.delete_query(Box::new(BooleanQuery::new(vec![
            self.term_clause(self.fields.id, id.as_str()),
            self.term_clause(self.fields.doc_type, document_type.as_str()),
        ])))?;
        self.after_write(&mut writer)
    }
}
