//! Status snapshots returned by an operations service.

use std::fmt;

use async_trait::async_trait;
use prost_types::Any;
use tonic::Code;

use crate::error::Result;

/// Structured cause of a failed operation, as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationError {
    /// Canonical gRPC code, kept as the raw wire value.
    pub code: i32,
    pub message: String,
    pub details: Vec<Any>,
}

impl OperationError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: Any) -> Self {
        self.details.push(detail);
        self
    }

    /// The code as a [`Code`]; unknown wire values map to `Code::Unknown`.
    pub fn code(&self) -> Code {
        Code::from(self.code)
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code(), self.message)
    }
}

/// Terminal payload of a finished operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Response(Any),
    Error(OperationError),
}

/// One fetched snapshot of a server-side job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationStatus {
    pub name: String,
    pub done: bool,
    pub metadata: Option<Any>,
    /// Only meaningful when `done` is true. A done status without a result
    /// carries an empty response.
    pub result: Option<OperationResult>,
}

impl OperationStatus {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(name: impl Into<String>, response: Any) -> Self {
        Self {
            name: name.into(),
            done: true,
            metadata: None,
            result: Some(OperationResult::Response(response)),
        }
    }

    pub fn failed(name: impl Into<String>, error: OperationError) -> Self {
        Self {
            name: name.into(),
            done: true,
            metadata: None,
            result: Some(OperationResult::Error(error)),
        }
    }

    pub fn with_metadata(mut self, metadata: Any) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Remote capability used to observe and cancel operations.
///
/// Implemented over gRPC by
/// [`GrpcOperationsClient`](crate::transport::GrpcOperationsClient); tests
/// substitute an in-memory stub.
#[async_trait]
pub trait OperationsService: Send + Sync {
    /// Fetch the current status of the named operation.
    async fn get_operation(&self, name: &str) -> Result<OperationStatus>;

    /// Ask the server to cancel the named operation. Best effort: the
    /// operation may still complete normally.
    async fn cancel_operation(&self, name: &str) -> Result<()>;
}
