// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent side: hold a Follow stream open to the dispatcher and run every
//! command it pushes.
//!
//! Each command runs in its own task with no limit on how many run at
//! once. When the stream drops, commands still running are killed (the
//! dispatcher has already failed them), and the agent waits a fixed
//! interval and reconnects, forever.

pub mod exec;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::transport::grpc::convert::{command_from_proto, event_to_follow_request};
use crate::transport::grpc::proto::shell_client::ShellClient;

/// A shell agent bound to one dispatcher endpoint.
pub struct Agent {
    endpoint: Endpoint,
    reconnect_interval: Duration,
}

impl Agent {
    pub fn new(endpoint: Endpoint, reconnect_interval: Duration) -> Self {
        Self { endpoint, reconnect_interval }
    }

    /// Connect once and execute commands until the stream ends.
    ///
    /// Returns `Ok` only when `shutdown` fires; a dispatcher hang-up is an error.
    pub async fn follow(&self, shutdown: &CancellationToken) -> anyhow::Result<()> {
        let channel = crate::transport::connect(&self.endpoint).await?;
        let mut client = ShellClient::new(channel);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let outbound = UnboundedReceiverStream::new(events_rx).map(|e| event_to_follow_request(&e));
        let mut inbound = client.follow(outbound).await?.into_inner();
        info!(endpoint = %self.endpoint.uri(), "connected");

        // Dropping the set on return aborts every running command.
        let mut running = JoinSet::new();
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                Some(_) = running.join_next(), if !running.is_empty() => continue,
                next = inbound.message() => next?,
            };
            let Some(response) = next else {
                anyhow::bail!("dispatcher disconnected");
            };
            let Some(command) = response.command else {
                debug!("ignoring empty follow response");
                continue;
            };
            let spec = command_from_proto(command);
            info!(command_id = %spec.id, name = %spec.name, args = ?spec.args, "executing command");
            running.spawn(exec::execute(spec, events_tx.clone()));
        }
    }

    /// Follow the dispatcher until `shutdown`, reconnecting after a fixed
    /// delay whenever the stream is lost.
    pub async fn follow_forever(&self, shutdown: CancellationToken) {
        loop {
            if let Err(e) = self.follow(&shutdown).await {
                warn!("follow ended: {e:#}");
            }
            if shutdown.is_cancelled() {
                break;
            }
            info!(secs = self.reconnect_interval.as_secs_f64(), "reconnecting");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }
    }
}

/// Entry point for `shellcast agent`.
pub async fn run(config: AgentConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let endpoint = config.connect.endpoint()?;
    let agent = Agent::new(endpoint, config.reconnect_interval());
    agent.follow_forever(shutdown).await;
    info!("agent stopped");
    Ok(())
}
