//! Paginated listing step definitions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cucumber::{given, then, when, World};
use gapic_runtime::retry::parse_code;
use gapic_runtime::test_utils::StubPageFetcher;
use gapic_runtime::{Error, ItemIterator, Page, PageFetcher, Result};

/// Lets the world keep a handle on the stub after the iterator owns it.
struct SharedFetcher(Arc<StubPageFetcher<String>>);

#[async_trait]
impl PageFetcher<String> for SharedFetcher {
    async fn fetch(&self, page_size: i32, page_token: Option<&str>) -> Result<Page<String>> {
        self.0.fetch(page_size, page_token).await
    }
}

/// Test context for pagination scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct PaginationWorld {
    items: Vec<String>,
    max_page_size: i32,
    hide_every: Option<usize>,
    stub: Option<Arc<StubPageFetcher<String>>>,
    iterator: Option<ItemIterator<String>>,
    received: Vec<String>,
    extra: Vec<Option<String>>,
    error: Option<Error>,
}

impl fmt::Debug for PaginationWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationWorld")
            .field("items", &self.items.len())
            .field("received", &self.received)
            .field("error", &self.error)
            .finish()
    }
}

impl PaginationWorld {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            max_page_size: 2,
            hide_every: None,
            stub: None,
            iterator: None,
            received: Vec::new(),
            extra: Vec::new(),
            error: None,
        }
    }

    fn stub(&mut self) -> Arc<StubPageFetcher<String>> {
        if self.stub.is_none() {
            let stub = StubPageFetcher::new(self.items.clone()).with_max_page_size(self.max_page_size);
            self.stub = Some(Arc::new(stub));
        }
        self.stub.clone().expect("stub initialised above")
    }

    fn iterator(&mut self) -> &mut ItemIterator<String> {
        if self.iterator.is_none() {
            let mut it = ItemIterator::new(SharedFetcher(self.stub()));
            if let Some(n) = self.hide_every {
                let items = self.items.clone();
                it = it.with_filter(move |item: &String| {
                    let position = items.iter().position(|i| i == item).unwrap_or(0) + 1;
                    position % n != 0
                });
            }
            self.iterator = Some(it);
        }
        self.iterator.as_mut().expect("iterator initialised above")
    }

    fn expected_visible(&self) -> Vec<String> {
        self.items
            .iter()
            .enumerate()
            .filter(|(i, _)| self.hide_every.map_or(true, |n| (i + 1) % n != 0))
            .map(|(_, item)| item.clone())
            .collect()
    }
}

// --- Given steps ---

#[given(expr = "a listing of {int} items served at most {int} per page")]
async fn given_listing(world: &mut PaginationWorld, count: usize, max_page_size: i32) {
    world.items = (1..=count).map(|i| format!("item-{i}")).collect();
    world.max_page_size = max_page_size;
}

#[given(expr = "every {int}nd item is hidden")]
async fn given_hidden(world: &mut PaginationWorld, n: usize) {
    world.hide_every = Some(n);
}

// --- When steps ---

#[when("I iterate the listing to the end")]
async fn when_iterate_to_end(world: &mut PaginationWorld) {
    loop {
        let next = world.iterator().next().await;
        match next {
            Ok(Some(item)) => world.received.push(item),
            Ok(None) => break,
            Err(err) => {
                world.error = Some(err);
                break;
            }
        }
    }
}

#[when(expr = "I take {int} items")]
async fn when_take(world: &mut PaginationWorld, n: usize) {
    for _ in 0..n {
        let item = world.iterator().next().await.expect("fetch should succeed");
        world.received.push(item.expect("listing should not be exhausted"));
    }
}

#[when(expr = "the next fetch fails with {word}")]
async fn when_next_fetch_fails(world: &mut PaginationWorld, code: String) {
    let code = parse_code(&code).expect("known status code");
    world.stub().fail_next(code).await;
}

#[when("I ask for the next item")]
async fn when_ask_next(world: &mut PaginationWorld) {
    let next = world.iterator().next().await;
    match next {
        Ok(Some(item)) => world.received.push(item),
        Ok(None) => world.extra.push(None),
        Err(err) => world.error = Some(err),
    }
}

#[when(expr = "I ask for the next item {int} more times")]
async fn when_ask_more(world: &mut PaginationWorld, n: usize) {
    for _ in 0..n {
        let next = world.iterator().next().await.expect("no error after end");
        world.extra.push(next);
    }
}

// --- Then steps ---

#[then(expr = "I receive {int} items in order")]
async fn then_receive_in_order(world: &mut PaginationWorld, n: usize) {
    assert_eq!(world.received.len(), n);
    assert_eq!(world.received, world.expected_visible());
}

#[then(expr = "I receive {int} items")]
async fn then_receive(world: &mut PaginationWorld, n: usize) {
    assert_eq!(world.received.len(), n);
    assert_eq!(world.received, world.expected_visible());
}

#[then("every extra request reports end of sequence")]
async fn then_extra_end(world: &mut PaginationWorld) {
    assert!(!world.extra.is_empty());
    assert!(world.extra.iter().all(Option::is_none));
}

#[then(expr = "the server was asked for {int} pages")]
async fn then_pages(world: &mut PaginationWorld, n: usize) {
    assert_eq!(world.stub().fetch_count().await, n);
}

#[then(expr = "the request fails with {word}")]
async fn then_request_fails(world: &mut PaginationWorld, code: String) {
    let err = world.error.take().expect("expected an error");
    assert_eq!(err.code(), parse_code(&code));
}

#[then("the server was asked for the second page twice")]
async fn then_second_page_twice(world: &mut PaginationWorld) {
    let requests = world.stub().requests().await;
    let second = requests
        .iter()
        .filter(|(_, token)| token.as_deref() == Some("2"))
        .count();
    assert_eq!(second, 2);
}
