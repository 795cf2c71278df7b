//! Lazy, forward-only iteration over paginated list RPCs.
//!
//! An [`ItemIterator`] owns one page of buffered items at a time. It asks its
//! [`PageFetcher`] for the next page only after every visible item of the
//! current page has been handed out, and becomes permanently exhausted once
//! a page arrives with an empty continuation token and the buffer drains.
//!
//! Tokens are opaque: the iterator only distinguishes empty from non-empty
//! and never parses or orders them.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::CallOptions;

/// Page-size hint used when the caller asks for zero or fewer items per page.
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// One batch of list results plus the token of the following batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when there are no further pages.
    pub next_page_token: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.into(),
        }
    }

    /// A final page: no token follows it.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, String::new())
    }

    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

/// Fetches a single raw page from a listing endpoint.
///
/// `page_token` is `None` for the first page. Implementations may clamp
/// `page_size` to their own limits; callers trust only the returned items
/// and token.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch(&self, page_size: i32, page_token: Option<&str>) -> Result<Page<T>>;
}

/// Adapts a closure into a [`PageFetcher`].
pub struct PageFn<F> {
    fetch: F,
}

/// Wrap `f(page_size, page_token)` as a [`PageFetcher`].
pub fn page_fn<T, F, Fut>(f: F) -> PageFn<F>
where
    F: Fn(i32, Option<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    PageFn { fetch: f }
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for PageFn<F>
where
    T: Send + 'static,
    F: Fn(i32, Option<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    async fn fetch(&self, page_size: i32, page_token: Option<&str>) -> Result<Page<T>> {
        (self.fetch)(page_size, page_token.map(str::to_owned)).await
    }
}

/// Visibility predicate: items for which it returns false are consumed
/// from the page but never surfaced.
pub type ItemFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Pagination position of an [`ItemIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// `None` before the first fetch; empty after the final page.
    pub token: Option<String>,
    /// Page-size hint sent with every fetch.
    pub page_size: i32,
}

impl PageInfo {
    /// True once the final page has been fetched.
    pub fn is_last_page(&self) -> bool {
        matches!(&self.token, Some(token) if token.is_empty())
    }
}

/// Single-pass iterator over the items of a paginated list.
///
/// Not safe for concurrent use; `next` takes `&mut self`.
pub struct ItemIterator<T> {
    fetcher: Box<dyn PageFetcher<T>>,
    filter: Option<ItemFilter<T>>,
    options: CallOptions,
    buffer: VecDeque<T>,
    info: PageInfo,
}

impl<T> fmt::Debug for ItemIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemIterator")
            .field("info", &self.info)
            .field("buffered", &self.buffer.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<T: Send + 'static> ItemIterator<T> {
    /// Iterate over the pages served by `fetcher`.
    pub fn new(fetcher: impl PageFetcher<T> + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            filter: None,
            options: CallOptions::default(),
            buffer: VecDeque::new(),
            info: PageInfo {
                token: None,
                page_size: DEFAULT_PAGE_SIZE,
            },
        }
    }

    /// Page-size hint for every fetch; zero or negative selects
    /// [`DEFAULT_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.info.page_size = if page_size > 0 {
            page_size
        } else {
            DEFAULT_PAGE_SIZE
        };
        self
    }

    /// Hide items for which `visible` returns false.
    pub fn with_filter<F>(mut self, visible: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(visible));
        self
    }

    /// Caller deadline and cancellation applied to every page fetch.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.info
    }

    /// Number of visible items buffered from the current page.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// True once end-of-sequence has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_empty() && self.info.is_last_page()
    }

    /// Produce the next visible item.
    ///
    /// Returns `Ok(None)` at end of sequence, and keeps returning it without
    /// contacting the fetcher. A fetch error is returned unchanged and leaves
    /// the iterator where it was, so calling `next` again retries the same
    /// page.
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.info.is_last_page() {
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    /// Produce the visible items of one page.
    ///
    /// Yields whatever is still buffered from the current page, otherwise
    /// fetches exactly one page. A page whose items were all hidden yields
    /// an empty vector. Returns `Ok(None)` at end of sequence.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        if self.buffer.is_empty() {
            if self.info.is_last_page() {
                return Ok(None);
            }
            self.fill().await?;
        }
        Ok(Some(self.buffer.drain(..).collect()))
    }

    /// Convert into a stream of items. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures::stream::try_unfold(self, |mut it| async move {
            Ok::<_, Error>(it.next().await?.map(|item| (item, it)))
        })
    }

    /// Fetch the page after the current token into the (empty) buffer.
    async fn fill(&mut self) -> Result<()> {
        let requested = self.info.token.clone();
        let page_size = self.info.page_size;

        debug!(
            page_size,
            token = requested.as_deref().unwrap_or(""),
            "Fetching page"
        );
        let page = self
            .options
            .run(self.fetcher.fetch(page_size, requested.as_deref()))
            .await?;

        let raw = page.items.len();
        self.buffer = match &self.filter {
            Some(visible) => page.items.into_iter().filter(|item| visible(item)).collect(),
            None => page.items.into_iter().collect(),
        };
        debug!(
            raw,
            visible = self.buffer.len(),
            last = page.next_page_token.is_empty(),
            "Fetched page"
        );
        self.info.token = Some(page.next_page_token);
        Ok(())
    }
}
