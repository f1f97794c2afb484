//! Search criteria with an embedded page cursor.
//!
//! A [`Query`] is built by the caller and handed to a reader. The reader only
//! ever touches the page cursor; criteria and index filter stay as built.

use crate::types::IndexName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of hits per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Position of a page inside a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number
    pub page: usize,
    /// Hits per page, always at least one
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn first(size: usize) -> Self {
        Self::new(0, size)
    }

    /// Number of hits that precede this page
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// What a query matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Criteria {
    /// Every document of the target type
    MatchAll,
    /// Free text, interpreted by the client's query parser
    QueryString { text: String },
    /// Exact match of one top-level field of the document source
    Term { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    criteria: Criteria,
    index: Option<IndexName>,
    page: PageRequest,
}

impl Query {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            index: None,
            page: PageRequest::default(),
        }
    }

    pub fn match_all() -> Self {
        Self::new(Criteria::MatchAll)
    }

    pub fn query_string(text: impl Into<String>) -> Self {
        Self::new(Criteria::QueryString { text: text.into() })
    }

    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Criteria::Term {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Restrict the query to a single index
    pub fn with_index(mut self, index: impl Into<IndexName>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn index(&self) -> Option<&IndexName> {
        self.index.as_ref()
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    /// Move the page cursor. This is the only mutation readers perform.
    pub fn set_page(&mut self, page: PageRequest) {
        self.page = page;
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.criteria {
            Criteria::MatchAll => write!(f, "match_all")?,
            Criteria::QueryString { text } => write!(f, "query_string({text:?})")?,
            Criteria::Term { field, value } => write!(f, "term({field}={value:?})")?,
        }
        if let Some(index) = &self.index {
            write!(f, " index={index}")?;
        }
        write!(f, " page={} size={}", self.page.page, self.page.size)
    }
}
