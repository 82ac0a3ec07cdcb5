// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher bootstrap for `shellcast serve`.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServeConfig;
use crate::dispatch::Dispatcher;
use crate::transport::grpc::ShellGrpc;

/// Serve the dispatcher until `shutdown` fires.
pub async fn run(config: ServeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let tls = config.tls()?;
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("could not bind {addr}"))?;
    let local = listener.local_addr()?;
    info!(addr = %local, tls = tls.is_some(), "serving");

    let dispatcher = Arc::new(Dispatcher::new());
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    ShellGrpc::new(Arc::clone(&dispatcher), shutdown.clone())
        .into_router(tls)?
        .serve_with_incoming_shutdown(incoming, shutdown.cancelled_owned())
        .await?;

    info!(shells = dispatcher.len(), "stopped");
    Ok(())
}
