//! Client facade tying configuration, retry and operations together.
//!
//! Generated service clients sit on top of this: each listing method wraps
//! its RPC in a [`PageFetcher`] and calls [`Client::list`], each unary
//! method goes through [`Client::call`], and each method that starts a
//! long-running job goes through [`Client::submit`].

use std::future::Future;
use std::sync::Arc;

use prost::Message;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::lro::{Operation, OperationStatus, OperationsService};
use crate::options::CallOptions;
use crate::pagination::{ItemIterator, PageFetcher};
use crate::retry::RetryPolicy;
use crate::transport::GrpcOperationsClient;

/// Runtime shared by the methods of one service client.
///
/// Cheap to clone; clones share the operations service.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    retry: RetryPolicy,
    operations: Arc<dyn OperationsService>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client over an injected operations service.
    pub fn new(config: ClientConfig, operations: Arc<dyn OperationsService>) -> Result<Self> {
        config.validate()?;
        let retry = config.retry_policy()?;
        Ok(Self {
            config,
            retry,
            operations,
        })
    }

    /// Connect the operations service to `config.endpoint` over gRPC.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let operations = GrpcOperationsClient::connect(&config.endpoint).await?;
        Self::new(config, Arc::new(operations))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn operations(&self) -> &Arc<dyn OperationsService> {
        &self.operations
    }

    /// Iterate a paginated listing, hinting `page_size` items per page.
    ///
    /// Zero or less selects the configured default. Listing calls get no
    /// implicit deadline; the caller's options apply to every page fetch.
    pub fn list<T, F>(&self, fetcher: F, page_size: i32, opts: CallOptions) -> ItemIterator<T>
    where
        T: Send + 'static,
        F: PageFetcher<T> + 'static,
    {
        let page_size = if page_size > 0 {
            page_size
        } else {
            self.config.page_size
        };
        ItemIterator::new(fetcher)
            .with_page_size(page_size)
            .with_options(opts)
    }

    /// Run a plain unary call with retry and the default call deadline.
    pub async fn call<T, F, Fut>(&self, opts: &CallOptions, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let opts = self.with_default_deadline(opts, self.config.call_timeout());
        self.retry.invoke(&opts, call).await
    }

    /// Run an operation-starting call and wrap its response in a handle.
    ///
    /// `submit` returns the initial status; a status that is already done
    /// yields a terminal handle that never polls.
    #[tracing::instrument(name = "client.submit", skip_all)]
    pub async fn submit<R, M, F, Fut>(&self, opts: &CallOptions, submit: F) -> Result<Operation<R, M>>
    where
        R: Message + Default + Clone + 'static,
        M: Message + Default + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<OperationStatus>>,
    {
        let submit_opts = self.with_default_deadline(opts, self.config.submit_timeout());
        let status = self.retry.invoke(&submit_opts, submit).await?;
        debug!(operation = %status.name, done = status.done, "Submitted operation");
        Ok(self.attach(Operation::from_status(status, self.operations.clone())))
    }

    /// Rebuild a handle for an operation started elsewhere.
    pub fn operation<R, M>(&self, name: impl Into<String>) -> Operation<R, M>
    where
        R: Message + Default + Clone + 'static,
        M: Message + Default + 'static,
    {
        self.attach(Operation::from_name(name, self.operations.clone()))
    }

    fn attach<R: Clone, M>(&self, op: Operation<R, M>) -> Operation<R, M> {
        op.with_retry(self.retry.clone())
            .with_poll_interval(self.config.poll_interval())
    }

    fn with_default_deadline(
        &self,
        opts: &CallOptions,
        timeout: Option<std::time::Duration>,
    ) -> CallOptions {
        match timeout {
            Some(timeout) => opts.or_timeout(timeout),
            None => opts.clone(),
        }
    }
}
