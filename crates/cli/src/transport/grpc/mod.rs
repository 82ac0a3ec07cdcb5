// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gRPC transport implementing the `Shell` service defined in `shellcast.v1`.

pub mod convert;
mod service;

use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::transport::ServerTlsConfig;
use tonic::Status;

use crate::dispatch::Dispatcher;

/// Generated protobuf types for the `shellcast.v1` package.
pub mod proto {
    tonic::include_proto!("shellcast.v1");
}

/// gRPC implementation of the `shellcast.v1.Shell` service.
pub struct ShellGrpc {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl ShellGrpc {
    /// Create a service backed by `dispatcher`.
    ///
    /// Once `shutdown` fires, new calls are refused and open Follow streams
    /// are closed so the server can drain.
    pub fn new(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Self {
        Self { dispatcher, shutdown }
    }

    pub fn into_service(self) -> proto::shell_server::ShellServer<Self> {
        proto::shell_server::ShellServer::new(self)
    }

    /// Build a [`tonic`] router for this service, serving TLS when configured.
    pub fn into_router(
        self,
        tls: Option<ServerTlsConfig>,
    ) -> anyhow::Result<tonic::transport::server::Router> {
        let mut server = tonic::transport::Server::builder();
        if let Some(tls) = tls {
            server = server.tls_config(tls)?;
        }
        Ok(server.add_service(self.into_service()))
    }
}

type GrpcStream<T> = Pin<Box<dyn tokio_stream::Stream<Item = Result<T, Status>> + Send + 'static>>;
