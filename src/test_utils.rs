//! Test utilities and stub implementations.
//!
//! In-memory stand-ins for a listing endpoint and an operations service, so
//! iterators and operation handles can be exercised without a server.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::{Code, Status};

use crate::error::{Error, Result};
use crate::lro::{OperationStatus, OperationsService};
use crate::pagination::{Page, PageFetcher};

/// Largest page the stub fetcher serves, whatever size is requested.
pub const STUB_MAX_PAGE_SIZE: i32 = 2;

/// Serves a fixed list in pages, using decimal item offsets as tokens.
///
/// Non-positive or oversized page-size hints are clamped to the stub's
/// maximum, like a real server would.
pub struct StubPageFetcher<T> {
    items: Vec<T>,
    max_page_size: i32,
    requests: RwLock<Vec<(i32, Option<String>)>>,
    failures: RwLock<VecDeque<Code>>,
}

impl<T: Clone + Send + Sync> StubPageFetcher<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            max_page_size: STUB_MAX_PAGE_SIZE,
            requests: RwLock::new(Vec::new()),
            failures: RwLock::new(VecDeque::new()),
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: i32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Fail the next fetch with `code` before serving anything.
    pub async fn fail_next(&self, code: Code) {
        self.failures.write().await.push_back(code);
    }

    /// Every `(page_size, page_token)` the stub has been called with.
    pub async fn requests(&self) -> Vec<(i32, Option<String>)> {
        self.requests.read().await.clone()
    }

    pub async fn fetch_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

impl<T> fmt::Debug for StubPageFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubPageFetcher")
            .field("items", &self.items.len())
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> PageFetcher<T> for StubPageFetcher<T> {
    async fn fetch(&self, page_size: i32, page_token: Option<&str>) -> Result<Page<T>> {
        self.requests
            .write()
            .await
            .push((page_size, page_token.map(str::to_owned)));

        if let Some(code) = self.failures.write().await.pop_front() {
            return Err(Status::new(code, "injected failure").into());
        }

        let size = if page_size <= 0 || page_size > self.max_page_size {
            self.max_page_size as usize
        } else {
            page_size as usize
        };

        let start = match page_token {
            None | Some("") => 0,
            Some(token) => token
                .parse::<usize>()
                .ok()
                .filter(|start| *start <= self.items.len())
                .ok_or_else(|| Error::InvalidArgument(format!("bad page token: {token:?}")))?,
        };
        let end = (start + size).min(self.items.len());
        let next = if end < self.items.len() {
            end.to_string()
        } else {
            String::new()
        };

        Ok(Page::new(self.items[start..end].to_vec(), next))
    }
}

enum Step {
    Status(OperationStatus),
    Fail(Code, String),
}

/// Operations service that replays scripted responses per operation name.
///
/// Each `get_operation` consumes the next scripted step. When the script
/// runs dry the last status served is repeated; an operation that was never
/// scripted is `NOT_FOUND`.
#[derive(Default)]
pub struct StubOperations {
    scripts: RwLock<HashMap<String, VecDeque<Step>>>,
    last: RwLock<HashMap<String, OperationStatus>>,
    cancelled: RwLock<Vec<String>>,
    get_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl StubOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `status` as the next response for `status.name`.
    pub async fn push_status(&self, status: OperationStatus) {
        self.scripts
            .write()
            .await
            .entry(status.name.clone())
            .or_default()
            .push_back(Step::Status(status));
    }

    /// Queue a transport failure for `name`.
    pub async fn push_failure(&self, name: &str, code: Code, message: &str) {
        self.scripts
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .push_back(Step::Fail(code, message.to_string()));
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Names passed to `cancel_operation`, in call order.
    pub async fn cancelled(&self) -> Vec<String> {
        self.cancelled.read().await.clone()
    }
}

impl fmt::Debug for StubOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubOperations")
            .field("get_calls", &self.get_calls())
            .field("cancel_calls", &self.cancel_calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OperationsService for StubOperations {
    async fn get_operation(&self, name: &str) -> Result<OperationStatus> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let step = self
            .scripts
            .write()
            .await
            .get_mut(name)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Status(status)) => {
                self.last
                    .write()
                    .await
                    .insert(name.to_string(), status.clone());
                Ok(status)
            }
            Some(Step::Fail(code, message)) => Err(Status::new(code, message).into()),
            None => self
                .last
                .read()
                .await
                .get(name)
                .cloned()
                .ok_or_else(|| Status::not_found(format!("operation {name} not found")).into()),
        }
    }

    async fn cancel_operation(&self, name: &str) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let known = self.scripts.read().await.contains_key(name)
            || self.last.read().await.contains_key(name);
        if !known {
            return Err(Status::not_found(format!("operation {name} not found")).into());
        }
        self.cancelled.write().await.push(name.to_string());
        Ok(())
    }
}
