// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell registry and broadcast aggregation.
//!
//! Shells register when their Follow stream opens and deregister when it
//! closes. [`Dispatcher::submit`] snapshots the registered shells, sends
//! the command to each, and returns a [`Submission`] stream that merges
//! their output and ends once every snapshotted shell has exited.

pub mod command;
pub mod session;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{info, warn};

pub use self::command::{CommandInstance, CommandObserver};
pub use self::session::AgentSession;
use crate::event::{CommandEvent, CommandRequest, CommandSpec, ExitEvent, OutputEvent};

/// Registry of connected shells.
#[derive(Default)]
pub struct Dispatcher {
    sessions: Mutex<HashMap<String, Arc<AgentSession>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly connected shell.
    pub fn register(&self, session: Arc<AgentSession>) {
        let id = session.id().to_owned();
        self.sessions.lock().insert(id, session);
    }

    /// Fail the shell's outstanding commands, then remove it.
    pub fn deregister(&self, session_id: &str) -> Option<Arc<AgentSession>> {
        let session = self.sessions.lock().get(session_id).cloned()?;
        session.force_complete();
        self.sessions.lock().remove(session_id)
    }

    /// Number of connected shells.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Broadcast `request` to every shell connected right now.
    ///
    /// Shells that connect afterwards do not receive the command. A shell
    /// that disconnects before exiting counts as a failed exit. A shell that
    /// stays connected but never reports an exit keeps the submission open
    /// indefinitely; the agent's own timeout is the only bound.
    pub fn submit(&self, request: CommandRequest) -> Submission {
        let spec = CommandSpec::from_request(request);
        let snapshot: Vec<Arc<AgentSession>> = self.sessions.lock().values().cloned().collect();

        let command_id = spec.id.clone();
        let shells = snapshot.len();
        info!(%command_id, name = %spec.name, shells, "dispatching command");

        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Arc::new(Broadcast::new(command_id.clone(), shells, tx));
        let command = Arc::new(CommandInstance::new(spec).with_observer(observer));
        for session in &snapshot {
            session.exec(Arc::clone(&command));
        }

        Submission { command_id, shells, events: UnboundedReceiverStream::new(rx) }
    }
}

/// Merged event stream for one broadcast.
///
/// Yields every output line and exit from the shells the command was sent
/// to, and ends after the last exit.
pub struct Submission {
    command_id: String,
    shells: usize,
    events: UnboundedReceiverStream<CommandEvent>,
}

impl Submission {
    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    /// Number of shells the command was sent to.
    pub fn shells(&self) -> usize {
        self.shells
    }
}

impl Stream for Submission {
    type Item = CommandEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

/// Completion counter feeding a [`Submission`].
struct Broadcast {
    command_id: String,
    state: Mutex<BroadcastState>,
}

struct BroadcastState {
    remaining: usize,
    tx: Option<mpsc::UnboundedSender<CommandEvent>>,
}

impl Broadcast {
    fn new(command_id: String, shells: usize, tx: mpsc::UnboundedSender<CommandEvent>) -> Self {
        // Nothing will ever exit, so close the stream right away.
        let tx = if shells == 0 { None } else { Some(tx) };
        Self { command_id, state: Mutex::new(BroadcastState { remaining: shells, tx }) }
    }
}

impl CommandObserver for Broadcast {
    fn handle_output(&self, output: OutputEvent) {
        let state = self.state.lock();
        if let Some(ref tx) = state.tx {
            // The operator may have gone away; the broadcast still runs to completion.
            let _ = tx.send(CommandEvent::Output(output));
        }
    }

    fn handle_exit(&self, exit: ExitEvent) {
        let mut state = self.state.lock();
        if state.remaining == 0 {
            warn!(command_id = %self.command_id, shell_id = %exit.shell_id, "exit after completion");
            return;
        }
        state.remaining -= 1;
        if let Some(ref tx) = state.tx {
            let _ = tx.send(CommandEvent::Exit(exit));
        }
        if state.remaining == 0 {
            state.tx = None;
            info!(command_id = %self.command_id, "command completed");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
