//! Channel construction and the gRPC operations adapter.
//!
//! Supports:
//! - TCP: `host:port`, `http://host:port` or `https://host:port`
//! - UDS: `unix:///path`, or a bare path starting with `/` or `./`

mod grpc;

pub use grpc::GrpcOperationsClient;

use std::path::PathBuf;

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::info;

use crate::error::{Error, Result};

/// Where a channel connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// URI for a TCP connection.
    Tcp(String),
    /// Path of a Unix domain socket.
    Uds(PathBuf),
}

impl Target {
    /// Classify an endpoint string.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::InvalidArgument("empty endpoint".to_string()));
        }
        if let Some(path) = endpoint.strip_prefix("unix://") {
            return Ok(Target::Uds(PathBuf::from(path)));
        }
        if endpoint.starts_with('/') || endpoint.starts_with("./") {
            return Ok(Target::Uds(PathBuf::from(endpoint)));
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Ok(Target::Tcp(endpoint.to_string()))
        } else {
            Ok(Target::Tcp(format!("http://{}", endpoint)))
        }
    }
}

/// Connect a gRPC channel to `endpoint`.
pub async fn connect_channel(endpoint: &str) -> Result<Channel> {
    match Target::parse(endpoint)? {
        Target::Uds(path) => {
            info!(path = %path.display(), transport = "uds", "Connecting to service");

            // tonic requires a valid URI even though the connector ignores it
            let channel = Endpoint::try_from("http://[::]:50051")
                .map_err(|e| Error::Connection(e.to_string()))?
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        let stream = UnixStream::connect(path).await?;
                        Ok::<_, std::io::Error>(TokioIo::new(stream))
                    }
                }))
                .await?;
            Ok(channel)
        }
        Target::Tcp(uri) => {
            info!(address = %uri, transport = "tcp", "Connecting to service");

            let channel = Channel::from_shared(uri)
                .map_err(|e| Error::Connection(e.to_string()))?
                .connect()
                .await?;
            Ok(channel)
        }
    }
}
