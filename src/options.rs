//! Per-call options: deadline, cancellation and retry override.
//!
//! Every suspension point in the runtime (a remote call, a retry sleep, a
//! wait-interval sleep) runs through [`CallOptions::run`], so a caller's
//! token or deadline interrupts it wherever it is parked.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Caller-supplied controls for one top-level call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    retry: Option<RetryPolicy>,
}

impl CallOptions {
    /// Options with no deadline, no cancellation and the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an absolute deadline for the call.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Override the retry policy the callee would otherwise use.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// The absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation token, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// The retry override, if any.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Returns a copy carrying `timeout` as deadline unless one is already set.
    ///
    /// Used for per-method default deadlines; never shortens or replaces a
    /// deadline the caller chose.
    pub fn or_timeout(&self, timeout: Duration) -> Self {
        let mut opts = self.clone();
        if opts.deadline.is_none() {
            opts.deadline = Some(Instant::now() + timeout);
        }
        opts
    }

    /// True if the token has fired or the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with the matching error if the call is already cancelled or past
    /// its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the token fires or the deadline passes.
    ///
    /// The token is checked first, so an already-cancelled call never polls
    /// `fut` at all.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Error::DeadlineExceeded)?,
                None => fut.await,
            }
        };

        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }

    /// Sleep for `duration`, returning early with an error on cancellation
    /// or deadline.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
