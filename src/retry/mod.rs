//! Retry utilities: deterministic exponential backoff and error classification.
//!
//! [`Backoff`] plugs into `backon` as a [`BackoffBuilder`]; each top-level call
//! builds a fresh iterator, so interval growth never leaks from one call into
//! the next. Retries stop on success, on an error the classifier rejects, or
//! when the caller's deadline or cancellation token fires. There is no
//! attempt cap.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use tonic::Code;
use tracing::warn;

use crate::error::{Error, Result};
use crate::options::CallOptions;

/// Default first retry interval.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// Default ceiling for the retry interval.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10000);
/// Default growth factor applied after every retried attempt.
pub const DEFAULT_MULTIPLIER: f64 = 1.3;

/// Exponential backoff parameters.
///
/// Interval `n` (0-indexed) is `min(initial * multiplier^n, max)`. No jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl Backoff {
    /// Create a backoff. Multipliers below 1.0 are treated as 1.0 and a
    /// ceiling below `initial` is raised to `initial`.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
        }
    }

    /// Constant interval, as used between polls of a long-running operation.
    pub fn constant(interval: Duration) -> Self {
        Self::new(interval, interval, 1.0)
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// A fresh interval sequence starting at `initial`.
    pub fn iter(&self) -> BackoffIter {
        BackoffIter {
            current: self.initial,
            max: self.max,
            multiplier: self.multiplier,
        }
    }
}

impl BackoffBuilder for Backoff {
    type Backoff = BackoffIter;

    fn build(self) -> Self::Backoff {
        self.iter()
    }
}

/// Unbounded sequence of retry intervals produced by a [`Backoff`].
#[derive(Debug, Clone)]
pub struct BackoffIter {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Iterator for BackoffIter {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        let grown = (self.current.as_nanos() as f64 * self.multiplier).round();
        let max = self.max.as_nanos() as f64;
        self.current = if grown >= max {
            self.max
        } else {
            Duration::from_nanos(grown as u64)
        };
        Some(delay)
    }
}

type ClassifierFn = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

#[derive(Clone)]
enum Classifier {
    Never,
    Codes(Vec<Code>),
    Custom(ClassifierFn),
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::Never => f.write_str("Never"),
            Classifier::Codes(codes) => f.debug_tuple("Codes").field(codes).finish(),
            Classifier::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which failures to retry and how long to wait between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    classifier: Classifier,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Retry `UNAVAILABLE` with the default backoff.
    fn default() -> Self {
        Self::on_codes(&[Code::Unavailable], Backoff::default())
    }
}

impl RetryPolicy {
    /// Retry gRPC errors whose status code is in `codes`.
    ///
    /// Connection and transport failures count as `UNAVAILABLE`.
    pub fn on_codes(codes: &[Code], backoff: Backoff) -> Self {
        Self {
            classifier: Classifier::Codes(codes.to_vec()),
            backoff,
        }
    }

    /// Retry whenever `classify` returns true.
    pub fn with_classifier<F>(classify: F, backoff: Backoff) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        Self {
            classifier: Classifier::Custom(Arc::new(classify)),
            backoff,
        }
    }

    /// Never retry; every failure surfaces on first occurrence.
    pub fn none() -> Self {
        Self {
            classifier: Classifier::Never,
            backoff: Backoff::default(),
        }
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Whether `err` should be retried under this policy.
    ///
    /// Terminal operation failures and caller aborts are never retried.
    pub fn is_retryable(&self, err: &Error) -> bool {
        if err.is_operation_failure() || err.is_cancelled() {
            return false;
        }
        match &self.classifier {
            Classifier::Never => false,
            Classifier::Codes(codes) => match err {
                Error::Grpc(status) => codes.contains(&status.code()),
                Error::Connection(_) | Error::Transport(_) => codes.contains(&Code::Unavailable),
                _ => false,
            },
            Classifier::Custom(classify) => classify(err),
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the caller's deadline or cancellation fires.
    ///
    /// A retry policy set on `opts` replaces this one for the call.
    pub async fn invoke<T, F, Fut>(&self, opts: &CallOptions, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = opts.retry().unwrap_or(self);
        let attempts = call
            .retry(policy.backoff)
            .when(|err: &Error| policy.is_retryable(err))
            .notify(|err: &Error, delay: Duration| {
                warn!(error = %err, delay = ?delay, "Transient failure, retrying");
            });
        opts.run(attempts).await
    }
}

/// Map a canonical gRPC code name (`"UNAVAILABLE"`, `"deadline_exceeded"`)
/// to a [`Code`].
pub fn parse_code(name: &str) -> Option<Code> {
    let code = match name.trim().to_ascii_uppercase().as_str() {
        "OK" => Code::Ok,
        "CANCELLED" => Code::Cancelled,
        "UNKNOWN" => Code::Unknown,
        "INVALID_ARGUMENT" => Code::InvalidArgument,
        "DEADLINE_EXCEEDED" => Code::DeadlineExceeded,
        "NOT_FOUND" => Code::NotFound,
        "ALREADY_EXISTS" => Code::AlreadyExists,
        "PERMISSION_DENIED" => Code::PermissionDenied,
        "RESOURCE_EXHAUSTED" => Code::ResourceExhausted,
        "FAILED_PRECONDITION" => Code::FailedPrecondition,
        "ABORTED" => Code::Aborted,
        "OUT_OF_RANGE" => Code::OutOfRange,
        "UNIMPLEMENTED" => Code::Unimplemented,
        "INTERNAL" => Code::Internal,
        "UNAVAILABLE" => Code::Unavailable,
        "DATA_LOSS" => Code::DataLoss,
        "UNAUTHENTICATED" => Code::Unauthenticated,
        _ => return None,
    };
    Some(code)
}
