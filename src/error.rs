//! Error types for the runtime.
//!
//! End-of-sequence, still-pending and no-metadata are not errors: they come
//! back as `Ok(None)` from [`ItemIterator::next`](crate::ItemIterator::next),
//! [`Operation::poll`](crate::Operation::poll) and
//! [`Operation::metadata`](crate::Operation::metadata).

use tonic::{Code, Status};

use crate::lro::OperationError;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while listing or driving an operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to establish connection to the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transport-level error from tonic.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC error from the server.
    #[error("grpc error: {0}")]
    Grpc(Box<Status>),

    /// The remote job finished and reported failure.
    #[error("operation failed: {0}")]
    Operation(OperationError),

    /// The caller's cancellation token fired.
    #[error("call cancelled")]
    Cancelled,

    /// The caller's deadline passed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A payload could not be decoded into the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid argument provided by caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Grpc(Box::new(status))
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Returns the error message.
    pub fn message(&self) -> String {
        match self {
            Error::Connection(msg) => msg.clone(),
            Error::Transport(e) => e.to_string(),
            Error::Grpc(s) => s.message().to_string(),
            Error::Operation(e) => e.message.clone(),
            Error::Cancelled | Error::DeadlineExceeded => self.to_string(),
            Error::Decode(msg)
            | Error::InvalidArgument(msg)
            | Error::Config(msg) => msg.clone(),
        }
    }

    /// Returns the gRPC status code, if the error carries one.
    ///
    /// Terminal operation failures report the code the server attached to
    /// the job's failure.
    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Grpc(s) => Some(s.code()),
            Error::Operation(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Returns the underlying gRPC Status if this is a gRPC error.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Grpc(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the structured cause if the remote job itself failed.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            Error::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Grpc(s) if s.code() == Code::NotFound)
    }

    /// Returns true if the server reported itself unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Grpc(s) if s.code() == Code::Unavailable)
    }

    /// Returns true if this is a connection or transport error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Transport(_))
    }

    /// Returns true if the caller aborted the call (cancellation or deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// Returns true if the remote job completed with a failure.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, Error::Operation(_))
    }
}
