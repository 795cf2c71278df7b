//! `google.longrunning.Operations` over tonic.
//!
//! Only `GetOperation` and `CancelOperation` are needed, so the messages are
//! declared here with prost derives and sent through tonic's generic unary
//! client instead of a generated stub.

use async_trait::async_trait;
use prost::Message;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::debug;

use super::connect_channel;
use crate::error::{Error, Result};
use crate::lro::{OperationError, OperationResult, OperationStatus, OperationsService};

const GET_OPERATION: &str = "/google.longrunning.Operations/GetOperation";
const CANCEL_OPERATION: &str = "/google.longrunning.Operations/CancelOperation";

/// Wire messages of `google/longrunning/operations.proto` and
/// `google/rpc/status.proto`.
pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetOperationRequest {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CancelOperationRequest {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Operation {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub metadata: ::core::option::Option<::prost_types::Any>,
        #[prost(bool, tag = "3")]
        pub done: bool,
        #[prost(oneof = "operation::Result", tags = "4, 5")]
        pub result: ::core::option::Option<operation::Result>,
    }

    pub mod operation {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(message, tag = "4")]
            Error(super::RpcStatus),
            #[prost(message, tag = "5")]
            Response(::prost_types::Any),
        }
    }

    /// `google.rpc.Status`.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RpcStatus {
        #[prost(int32, tag = "1")]
        pub code: i32,
        #[prost(string, tag = "2")]
        pub message: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "3")]
        pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
    }
}

impl From<proto::RpcStatus> for OperationError {
    fn from(status: proto::RpcStatus) -> Self {
        Self {
            code: status.code,
            message: status.message,
            details: status.details,
        }
    }
}

impl From<proto::Operation> for OperationStatus {
    fn from(op: proto::Operation) -> Self {
        let result = op.result.map(|result| match result {
            proto::operation::Result::Error(status) => OperationResult::Error(status.into()),
            proto::operation::Result::Response(any) => OperationResult::Response(any),
        });
        Self {
            name: op.name,
            done: op.done,
            metadata: op.metadata,
            result,
        }
    }
}

/// Operations service client over a tonic channel.
#[derive(Debug, Clone)]
pub struct GrpcOperationsClient {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcOperationsClient {
    /// Connect to an operations service at the given endpoint.
    ///
    /// Supports both TCP (host:port) and Unix Domain Sockets (file paths).
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let channel = connect_channel(endpoint).await?;
        Ok(Self::from_channel(channel))
    }

    /// Create a client from an existing channel.
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Error::Connection(format!("service was not ready: {}", e)))?;

        let codec = ProstCodec::<Req, Resp>::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl OperationsService for GrpcOperationsClient {
    async fn get_operation(&self, name: &str) -> Result<OperationStatus> {
        let request = proto::GetOperationRequest {
            name: name.to_string(),
        };
        let op: proto::Operation = self.unary(GET_OPERATION, request).await?;
        debug!(operation = %op.name, done = op.done, "GetOperation");
        Ok(op.into())
    }

    async fn cancel_operation(&self, name: &str) -> Result<()> {
        let request = proto::CancelOperationRequest {
            name: name.to_string(),
        };
        self.unary::<_, ()>(CANCEL_OPERATION, request).await
    }
}
