// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: in-memory shells, servers, and assertion helpers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{AgentSession, Dispatcher, Submission};
use crate::event::{CommandEvent, CommandSpec, ExitEvent, OutputEvent, OutputSource};
use crate::transport::grpc::{proto, ShellGrpc};

/// Upper bound for any single await in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A shell connected to a [`Dispatcher`] through in-memory channels.
///
/// Stands in for the gRPC Follow stream: commands sent to the session show
/// up on [`FakeShell::next_command`], and events pushed with
/// [`FakeShell::output`]/[`FakeShell::exit`] are routed by the session's
/// inbound loop. Dropping the event sender ends the loop the same way a
/// closed stream does, and the shell is deregistered afterwards.
pub struct FakeShell {
    pub session: Arc<AgentSession>,
    commands_rx: mpsc::UnboundedReceiver<CommandSpec>,
    events_tx: Option<mpsc::UnboundedSender<Result<CommandEvent, String>>>,
    handle: JoinHandle<Result<(), String>>,
}

impl FakeShell {
    /// Register a new shell and start its inbound loop.
    pub fn connect(dispatcher: &Arc<Dispatcher>) -> Self {
        Self::connect_with_shutdown(dispatcher, CancellationToken::new())
    }

    pub fn connect_with_shutdown(dispatcher: &Arc<Dispatcher>, shutdown: CancellationToken) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Arc::new(AgentSession::new(commands_tx));
        dispatcher.register(Arc::clone(&session));

        let loop_session = Arc::clone(&session);
        let dispatcher = Arc::clone(dispatcher);
        let handle = tokio::spawn(async move {
            let inbound = UnboundedReceiverStream::new(events_rx);
            let result = loop_session.handle_inbound_events(inbound, shutdown).await;
            dispatcher.deregister(loop_session.id());
            result
        });

        Self { session, commands_rx, events_tx: Some(events_tx), handle }
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    /// Wait for the next execute-request sent to this shell.
    pub async fn next_command(&mut self) -> anyhow::Result<CommandSpec> {
        tokio::time::timeout(TEST_TIMEOUT, self.commands_rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("command channel closed"))
    }

    /// True if no execute-request is waiting.
    pub fn no_pending_command(&mut self) -> bool {
        self.commands_rx.try_recv().is_err()
    }

    pub fn output(&self, command_id: &str, source: OutputSource, line: &str) {
        self.send(Ok(CommandEvent::Output(OutputEvent::new(command_id, source, line))));
    }

    pub fn exit(&self, command_id: &str, code: i64) {
        self.send(Ok(CommandEvent::Exit(ExitEvent::new(command_id, code))));
    }

    /// Make the inbound stream yield a transport error.
    pub fn fail(&self, message: &str) {
        self.send(Err(message.to_owned()));
    }

    /// Close the inbound stream, as if the agent hung up.
    pub fn disconnect(&mut self) {
        self.events_tx = None;
    }

    /// Wait for the inbound loop to finish and return its result.
    pub async fn closed(mut self) -> anyhow::Result<Result<(), String>> {
        self.events_tx = None;
        Ok(tokio::time::timeout(TEST_TIMEOUT, self.handle).await??)
    }

    fn send(&self, event: Result<CommandEvent, String>) {
        if let Some(ref tx) = self.events_tx {
            let _ = tx.send(event);
        }
    }
}

/// Pull the next event from a submission, failing after [`TEST_TIMEOUT`].
pub async fn next_event(submission: &mut Submission) -> anyhow::Result<Option<CommandEvent>> {
    Ok(tokio::time::timeout(TEST_TIMEOUT, submission.next()).await?)
}

/// Drain a submission to completion.
pub async fn collect_events(submission: Submission) -> anyhow::Result<Vec<CommandEvent>> {
    Ok(tokio::time::timeout(TEST_TIMEOUT, submission.collect::<Vec<_>>()).await?)
}

/// Returns true if the submission produced nothing and did not end within `wait`.
pub async fn stays_open(submission: &mut Submission, wait: Duration) -> bool {
    tokio::time::timeout(wait, submission.next()).await.is_err()
}

/// Wait until the dispatcher has exactly `n` shells registered.
pub async fn wait_for_shells(dispatcher: &Dispatcher, n: usize) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while dispatcher.len() != n {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("expected {n} shells, have {}", dispatcher.len());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Spawn an in-process gRPC dispatcher on an ephemeral port.
pub async fn spawn_grpc_server(
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> anyhow::Result<(std::net::SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let grpc = ShellGrpc::new(dispatcher, shutdown.clone());
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(grpc.into_service())
            .serve_with_incoming_shutdown(incoming, shutdown.cancelled_owned())
            .await;
    });
    Ok((addr, handle))
}

/// Connect a plaintext gRPC client to `addr`.
pub async fn grpc_client(
    addr: std::net::SocketAddr,
) -> anyhow::Result<proto::shell_client::ShellClient<tonic::transport::Channel>> {
    let channel = tonic::transport::Channel::from_shared(format!("http://{addr}"))
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("grpc connect: {e}"))?;
    Ok(proto::shell_client::ShellClient::new(channel))
}

#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
