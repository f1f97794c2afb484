//! Page-at-a-time item reading
//!
//! [`PagingItemReader`] turns any [`PageSource`] into an item-at-a-time reader.
//! It asks for page 0, drains it, asks for page 1, and so on until a page comes
//! back empty. It also keeps the read count so a restarted job can resume.

use super::{ExecutionContext, ItemReader, ItemStream};
use crate::error::{BatchError, BatchResult, ConfigError};
use crate::query::PageRequest;
use tracing::debug;

/// Something that can produce one page of items at a time.
pub trait PageSource<T> {
    /// Fetch the items of `page`. An empty result means there is no more data.
    fn read_page(&mut self, page: PageRequest) -> BatchResult<Vec<T>>;
}

/// Drives a [`PageSource`] and hands out its items one at a time.
///
/// Not meant to be shared between concurrent consumers; every call takes
/// `&mut self`.
pub struct PagingItemReader<T, S> {
    source: S,
    name: String,
    page_size: usize,
    page: usize,
    buffer: std::vec::IntoIter<T>,
    current_item_count: usize,
    max_item_count: Option<usize>,
    save_state: bool,
    exhausted: bool,
}

impl<T, S: PageSource<T>> PagingItemReader<T, S> {
    pub fn new(name: impl Into<String>, source: S, page_size: usize) -> BatchResult<Self> {
        if page_size == 0 {
            return Err(ConfigError::InvalidPageSize.into());
        }
        Ok(Self {
            source,
            name: name.into(),
            page_size,
            page: 0,
            buffer: Vec::new().into_iter(),
            current_item_count: 0,
            max_item_count: None,
            save_state: true,
            exhausted: false,
        })
    }

    /// Stop after `max` items, or never when `None`
    pub fn with_max_item_count(mut self, max: Option<usize>) -> Self {
        self.max_item_count = max;
        self
    }

    /// Whether the read count is saved to and restored from the execution context
    pub fn with_save_state(mut self, save_state: bool) -> Self {
        self.save_state = save_state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Next page to be fetched
    pub fn page(&self) -> usize {
        self.page
    }

    /// Items handed out since open (or since the restart point)
    pub fn current_item_count(&self) -> usize {
        self.current_item_count
    }

    fn count_key(&self) -> String {
        format!("{}.read.count", self.name)
    }

    /// Fetch the next page into the buffer. Returns whether it had any items.
    fn fetch_page(&mut self) -> BatchResult<bool> {
        let request = PageRequest::new(self.page, self.page_size);
        let items = self.source.read_page(request)?;
        self.page += 1;

        let fetched = !items.is_empty();
        debug!(
            "Reader '{}' fetched {} item(s) from page {}",
            self.name,
            items.len(),
            request.page
        );
        self.buffer = items.into_iter();
        Ok(fetched)
    }

    /// Position the reader so that the next item read is the one at `item_index`.
    fn jump_to_item(&mut self, item_index: usize) -> BatchResult<()> {
        self.page = item_index / self.page_size;
        let skip = item_index % self.page_size;

        if !self.fetch_page()? {
            self.exhausted = true;
        }
        for _ in 0..skip {
            if self.buffer.next().is_none() {
                break;
            }
        }
        self.current_item_count = item_index;
        Ok(())
    }

    fn reset(&mut self) {
        self.page = 0;
        self.buffer = Vec::new().into_iter();
        self.current_item_count = 0;
        self.exhausted = false;
    }
}

impl<T, S: PageSource<T>> ItemReader<T> for PagingItemReader<T, S> {
    fn read(&mut self) -> BatchResult<Option<T>> {
        if self
            .max_item_count
            .is_some_and(|max| self.current_item_count >= max)
        {
            return Ok(None);
        }

        loop {
            if let Some(item) = self.buffer.next() {
                self.current_item_count += 1;
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }
            if !self.fetch_page()? {
                self.exhausted = true;
                debug!(
                    "Reader '{}' exhausted after {} item(s)",
                    self.name, self.current_item_count
                );
                return Ok(None);
            }
        }
    }
}

impl<T, S: PageSource<T>> ItemStream for PagingItemReader<T, S> {
    fn open(&mut self, context: &ExecutionContext) -> BatchResult<()> {
        self.reset();
        if !self.save_state {
            return Ok(());
        }

        let key = self.count_key();
        if !context.contains_key(&key) {
            return Ok(());
        }
        let count = context.get_usize(&key).ok_or_else(|| BatchError::ItemStream {
            reason: format!("'{key}' in the execution context is not an item count"),
        })?;

        if let Some(max) = self.max_item_count
            && count > max
        {
            return Err(BatchError::ItemStream {
                reason: format!("restart count {count} exceeds the max item count {max}"),
            });
        }

        debug!("Reader '{}' restarting at item {count}", self.name);
        if count > 0 {
            self.jump_to_item(count)?;
        }
        Ok(())
    }

    fn update(&mut self, context: &mut ExecutionContext) -> BatchResult<()> {
        if self.save_state {
            context.put_usize(self.count_key(), self.current_item_count);
        }
        Ok(())
    }

    fn close(&mut self) -> BatchResult<()> {
        self.reset();
        Ok(())
    }
}
