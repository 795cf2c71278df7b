//! Client-side runtime for paginated list RPCs and long-running operations.
//!
//! Generated API clients are thin: they marshal requests and hand the
//! transport a method path. The two pieces that carry real behaviour live
//! here:
//!
//! - [`pagination`]: turns a "fetch one page" capability into a lazy,
//!   forward-only sequence of items that crosses page boundaries on demand
//!   and can hide items without breaking token continuation.
//! - [`lro`]: a handle to a server-side asynchronous job with poll, wait,
//!   metadata and result-decoding semantics.
//!
//! Both sit on [`retry`], a deterministic exponential backoff applied only to
//! errors its classifier accepts, and on [`CallOptions`], which carries the
//! caller's deadline and cancellation token to every suspension point.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gapic_runtime::{page_fn, CallOptions, Client, Page};
//!
//! async fn example(client: Client) -> gapic_runtime::Result<()> {
//!     // Any closure returning a page can act as a fetcher.
//!     let fetcher = page_fn(|page_size, token| async move {
//!         let (items, next) = fetch_from_somewhere(page_size, token).await?;
//!         Ok(Page::new(items, next))
//!     });
//!     let mut it = client.list(fetcher, 0, CallOptions::new());
//!     while let Some(item) = it.next().await? {
//!         println!("{item:?}");
//!     }
//!
//!     // Long-running operations come back as handles.
//!     let mut op = client.operation::<MyResponse, MyMetadata>("operations/123");
//!     let response = op.wait(&CallOptions::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod lro;
pub mod options;
pub mod pagination;
pub mod retry;
pub mod transport;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types at crate root
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use lro::{
    Decoder, Operation, OperationError, OperationResult, OperationState, OperationStatus,
    OperationsService, ProstDecoder,
};
pub use options::CallOptions;
pub use pagination::{page_fn, ItemFilter, ItemIterator, Page, PageFetcher, PageInfo};
pub use retry::{Backoff, RetryPolicy};
