//! Long-running operations.
//!
//! An [`Operation`] is a client-side handle to a server-side job. It never
//! talks to the server on its own: the caller drives it with [`poll`] or
//! [`wait`], and reads cached state with [`done`], [`metadata`] and
//! [`state`].
//!
//! Once a status with `done = true` is observed the handle is terminal. The
//! decoded outcome is cached and every later poll returns it again without a
//! network fetch.
//!
//! [`poll`]: Operation::poll
//! [`wait`]: Operation::wait
//! [`done`]: Operation::done
//! [`metadata`]: Operation::metadata
//! [`state`]: Operation::state

mod decode;
mod status;

pub use decode::{Decoder, ProstDecoder};
pub use status::{OperationError, OperationResult, OperationStatus, OperationsService};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use prost_types::Any;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::options::CallOptions;
use crate::retry::RetryPolicy;

/// Interval between polls used by [`Operation::wait`] unless overridden.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Observable lifecycle of an operation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Not yet observed done.
    Pending,
    /// Done with a decoded response.
    Succeeded,
    /// Done with a server-reported failure, or with a response that could
    /// not be decoded.
    Failed,
}

enum Outcome<R> {
    Succeeded(R),
    Failed(OperationError),
    Undecodable(String),
}

/// Handle to a server-side long-running job.
///
/// `R` is the response type, `M` the in-flight metadata type.
pub struct Operation<R, M = ()> {
    name: String,
    service: Arc<dyn OperationsService>,
    decoder: Box<dyn Decoder<R>>,
    metadata_decoder: Box<dyn Decoder<M>>,
    retry: RetryPolicy,
    poll_interval: Duration,
    metadata: Option<Any>,
    outcome: Option<Outcome<R>>,
}

impl<R, M> fmt::Debug for Operation<R, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("has_metadata", &self.metadata.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl<R, M> Operation<R, M>
where
    R: Message + Default + Clone + 'static,
    M: Message + Default + 'static,
{
    /// Handle for the job described by a submit response.
    ///
    /// A status that is already done is absorbed immediately, so the handle
    /// starts out terminal and never polls.
    pub fn from_status(status: OperationStatus, service: Arc<dyn OperationsService>) -> Self {
        Self::with_decoders(status, service, ProstDecoder::new(), ProstDecoder::new())
    }

    /// Rebuild a handle from a bare operation name, e.g. one persisted by
    /// another process.
    pub fn from_name(name: impl Into<String>, service: Arc<dyn OperationsService>) -> Self {
        Self::from_status(OperationStatus::pending(name), service)
    }
}

impl<R, M> Operation<R, M> {
    /// Server-assigned name; enough to rebuild the handle elsewhere.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once a done status has been observed. Never touches the network.
    pub fn done(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn state(&self) -> OperationState {
        match &self.outcome {
            None => OperationState::Pending,
            Some(Outcome::Succeeded(_)) => OperationState::Succeeded,
            Some(Outcome::Failed(_) | Outcome::Undecodable(_)) => OperationState::Failed,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl<R: Clone, M> Operation<R, M> {
    /// Handle using custom payload decoders.
    pub fn with_decoders(
        status: OperationStatus,
        service: Arc<dyn OperationsService>,
        decoder: impl Decoder<R> + 'static,
        metadata_decoder: impl Decoder<M> + 'static,
    ) -> Self {
        let mut op = Self {
            name: status.name.clone(),
            service,
            decoder: Box::new(decoder),
            metadata_decoder: Box::new(metadata_decoder),
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            metadata: None,
            outcome: None,
        };
        op.absorb(status);
        op
    }

    /// Retry policy applied to each status fetch.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Interval used by [`wait`](Self::wait).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Most recently received progress metadata, without contacting the
    /// server. `Ok(None)` if no status so far carried any.
    pub fn metadata(&self) -> Result<Option<M>> {
        self.metadata
            .as_ref()
            .map(|any| self.metadata_decoder.decode(any))
            .transpose()
    }

    /// Fetch the status once.
    ///
    /// Returns `Ok(None)` while the job is still running. Once done, returns
    /// the response or the job's failure as [`Error::Operation`], and keeps
    /// returning that same outcome without further fetches. A failed fetch
    /// leaves the handle unchanged.
    #[tracing::instrument(name = "operation.poll", skip_all, fields(operation = %self.name))]
    pub async fn poll(&mut self, opts: &CallOptions) -> Result<Option<R>> {
        if let Some(outcome) = self.cached() {
            return outcome.map(Some);
        }
        if self.name.is_empty() {
            return Err(Error::InvalidArgument(
                "operation has no name to poll".to_string(),
            ));
        }

        let service = &self.service;
        let name = self.name.as_str();
        let status = self
            .retry
            .invoke(opts, || service.get_operation(name))
            .await?;
        debug!(done = status.done, "Polled operation");

        self.absorb(status);
        self.cached().transpose()
    }

    /// Poll at the handle's interval until the job is done.
    pub async fn wait(&mut self, opts: &CallOptions) -> Result<R> {
        self.wait_with_interval(opts, self.poll_interval).await
    }

    /// Poll every `interval` until the job is done, the caller cancels, or
    /// the deadline passes.
    ///
    /// Polls first and sleeps only between polls, so a job that is already
    /// done returns without sleeping.
    #[tracing::instrument(name = "operation.wait", skip(self, opts), fields(operation = %self.name))]
    pub async fn wait_with_interval(&mut self, opts: &CallOptions, interval: Duration) -> Result<R> {
        if interval.is_zero() && !self.done() {
            return Err(Error::InvalidArgument(
                "poll interval must be positive".to_string(),
            ));
        }
        loop {
            if !self.done() {
                opts.check()?;
            }
            if let Some(response) = self.poll(opts).await? {
                return Ok(response);
            }
            debug!(interval = ?interval, "Operation pending, sleeping");
            opts.sleep(interval).await?;
        }
    }

    /// Ask the server to cancel the job.
    ///
    /// Local state is not touched; a later poll observes the outcome the
    /// server settles on.
    pub async fn cancel(&self, opts: &CallOptions) -> Result<()> {
        let service = &self.service;
        let name = self.name.as_str();
        self.retry
            .invoke(opts, || service.cancel_operation(name))
            .await
    }

    fn cached(&self) -> Option<Result<R>> {
        self.outcome.as_ref().map(|outcome| match outcome {
            Outcome::Succeeded(response) => Ok(response.clone()),
            Outcome::Failed(cause) => Err(Error::Operation(cause.clone())),
            Outcome::Undecodable(msg) => Err(Error::Decode(msg.clone())),
        })
    }

    fn absorb(&mut self, status: OperationStatus) {
        if self.outcome.is_some() {
            return;
        }
        if let Some(metadata) = status.metadata {
            self.metadata = Some(metadata);
        }
        if !status.done {
            return;
        }

        let outcome = match status.result {
            Some(OperationResult::Error(cause)) => Outcome::Failed(cause),
            Some(OperationResult::Response(payload)) => self.decode(&payload),
            None => self.decode(&Any::default()),
        };
        match &outcome {
            Outcome::Succeeded(_) => info!(operation = %self.name, "Operation succeeded"),
            Outcome::Failed(cause) => {
                info!(operation = %self.name, error = %cause, "Operation failed")
            }
            Outcome::Undecodable(msg) => {
                info!(operation = %self.name, error = %msg, "Operation response undecodable")
            }
        }
        self.outcome = Some(outcome);
    }

    fn decode(&self, payload: &Any) -> Outcome<R> {
        match self.decoder.decode(payload) {
            Ok(response) => Outcome::Succeeded(response),
            Err(err) => Outcome::Undecodable(err.message()),
        }
    }
}
