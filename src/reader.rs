//! Paginated reader over a search query
//!
//! [`SearchItemReader`] is the page source: each call executes the query for
//! one page and converts the hits into the target type. Wrap it in a
//! [`PagingItemReader`] (or use [`SearchItemReader::builder`]) to read item by
//! item.

use crate::error::{BatchError, BatchResult, ConfigError};
use crate::item::{PageSource, PagingItemReader};
use crate::query::{DEFAULT_PAGE_SIZE, PageRequest, Query};
use crate::storage::SearchOperations;
use crate::types::DocumentType;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

pub const MISSING_SEARCH_OPERATIONS: &str = "A SearchOperations implementation is required.";
pub const MISSING_QUERY: &str = "A query is required.";
pub const MISSING_TARGET_TYPE: &str = "A target type to convert the input into is required.";

/// Default name, used as the prefix of saved reader state
pub const DEFAULT_READER_NAME: &str = "SearchItemReader";

/// Reads documents of one type from a search index, one page per call.
pub struct SearchItemReader<T> {
    client: Arc<dyn SearchOperations>,
    query: Query,
    target_type: DocumentType,
    _target: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> SearchItemReader<T> {
    /// Validate the collaborators and build the page source.
    ///
    /// Every missing collaborator is reported, not just the first one.
    pub fn new(
        client: Option<Arc<dyn SearchOperations>>,
        query: Option<Query>,
        target_type: Option<DocumentType>,
    ) -> BatchResult<Self> {
        match (client, query, target_type) {
            (Some(client), Some(query), Some(target_type)) => Ok(Self {
                client,
                query,
                target_type,
                _target: PhantomData,
            }),
            (client, query, target_type) => {
                let mut missing = Vec::new();
                if client.is_none() {
                    missing.push(MISSING_SEARCH_OPERATIONS);
                }
                if query.is_none() {
                    missing.push(MISSING_QUERY);
                }
                if target_type.is_none() {
                    missing.push(MISSING_TARGET_TYPE);
                }
                Err(ConfigError::MissingCollaborators { missing }.into())
            }
        }
    }

    pub fn builder() -> SearchItemReaderBuilder<T> {
        SearchItemReaderBuilder::default()
    }

    /// The query, including the cursor of the last fetched page
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn target_type(&self) -> &DocumentType {
        &self.target_type
    }
}

impl<T: DeserializeOwned> PageSource<T> for SearchItemReader<T> {
    fn read_page(&mut self, page: PageRequest) -> BatchResult<Vec<T>> {
        self.query.set_page(page);
        debug!("executing query {}", self.query);

        let hits = self.client.search(&self.query, &self.target_type)?;
        hits.into_iter()
            .map(|hit| {
                let id = hit.id;
                serde_json::from_value(hit.content).map_err(|source| BatchError::Conversion {
                    id: id.to_string(),
                    target_type: self.target_type.to_string(),
                    source,
                })
            })
            .collect()
    }
}

/// Builder for a ready-to-use paging reader over a search query.
pub struct SearchItemReaderBuilder<T> {
    name: String,
    client: Option<Arc<dyn SearchOperations>>,
    query: Option<Query>,
    target_type: Option<DocumentType>,
    page_size: usize,
    max_item_count: Option<usize>,
    save_state: bool,
    _target: PhantomData<fn() -> T>,
}

impl<T> Default for SearchItemReaderBuilder<T> {
    fn default() -> Self {
        Self {
            name: DEFAULT_READER_NAME.to_string(),
            client: None,
            query: None,
            target_type: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_item_count: None,
            save_state: true,
            _target: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> SearchItemReaderBuilder<T> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn client(mut self, client: Arc<dyn SearchOperations>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn target_type(mut self, target_type: impl Into<DocumentType>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn max_item_count(mut self, max_item_count: Option<usize>) -> Self {
        self.max_item_count = max_item_count;
        self
    }

    pub fn save_state(mut self, save_state: bool) -> Self {
        self.save_state = save_state;
        self
    }

    pub fn build(self) -> BatchResult<PagingItemReader<T, SearchItemReader<T>>> {
        let source = SearchItemReader::new(self.client, self.query, self.target_type)?;
        Ok(PagingItemReader::new(self.name, source, self.page_size)?
            .with_max_item_count(self.max_item_count)
            .with_save_state(self.save_state))
    }
}
