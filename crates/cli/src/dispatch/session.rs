// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher-side handle to one connected shell.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::command::CommandInstance;
use crate::event::{CommandEvent, CommandSpec, ExitEvent, OutputEvent};

#[derive(Default)]
struct Outstanding {
    commands: HashMap<String, Arc<CommandInstance>>,
    /// Set once the channel is gone. Later execs complete immediately.
    closed: bool,
}

/// One connected shell and the commands it has not finished yet.
///
/// Every command registered through [`AgentSession::exec`] is completed
/// exactly once: by the shell's own exit event, or by a synthesized
/// failure when the session shuts down. Both paths remove the command from
/// the outstanding map before notifying it, so whichever runs second finds
/// nothing to do.
pub struct AgentSession {
    id: String,
    commands_tx: mpsc::UnboundedSender<CommandSpec>,
    outstanding: Mutex<Outstanding>,
}

impl AgentSession {
    /// Create a session that forwards execute-requests into `commands_tx`.
    pub fn new(commands_tx: mpsc::UnboundedSender<CommandSpec>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            commands_tx,
            outstanding: Mutex::new(Outstanding::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of commands sent to this shell that have not exited.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.lock().commands.len()
    }

    pub fn is_closed(&self) -> bool {
        self.outstanding.lock().closed
    }

    /// Register `command` and send it to the shell.
    pub fn exec(&self, command: Arc<CommandInstance>) {
        let id = command.id().to_owned();
        {
            let mut outstanding = self.outstanding.lock();
            if !outstanding.closed {
                outstanding.commands.insert(id.clone(), Arc::clone(&command));
            } else {
                drop(outstanding);
                debug!(shell_id = %self.id, command_id = %id, "exec on closed shell");
                command.handle_exit(ExitEvent::synthesized(id, &self.id));
                return;
            }
        }

        if self.commands_tx.send(command.spec().clone()).is_err() {
            debug!(shell_id = %self.id, command_id = %id, "shell channel gone, failing command");
            if let Some(command) = self.take(&id) {
                command.handle_exit(ExitEvent::synthesized(id, &self.id));
            }
        }
    }

    /// Route events from the shell until the stream ends, fails, or
    /// `shutdown` fires. Outstanding commands are force-completed before
    /// returning.
    pub async fn handle_inbound_events<S, E>(
        &self,
        mut inbound: S,
        shutdown: CancellationToken,
    ) -> Result<(), E>
    where
        S: Stream<Item = Result<CommandEvent, E>> + Unpin,
    {
        let result = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                next = inbound.next() => next,
            };
            match next {
                Some(Ok(CommandEvent::Output(output))) => self.route_output(output),
                Some(Ok(CommandEvent::Exit(exit))) => self.route_exit(exit),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };
        self.force_complete();
        result
    }

    /// Fail every outstanding command and refuse new ones. Idempotent.
    pub fn force_complete(&self) {
        let drained: Vec<_> = {
            let mut outstanding = self.outstanding.lock();
            outstanding.closed = true;
            outstanding.commands.drain().collect()
        };
        for (command_id, command) in drained {
            debug!(shell_id = %self.id, %command_id, "force-completing command");
            command.handle_exit(ExitEvent::synthesized(command_id, &self.id));
        }
    }

    fn route_output(&self, mut output: OutputEvent) {
        let command = self.outstanding.lock().commands.get(&output.command_id).cloned();
        match command {
            Some(command) => {
                output.shell_id.clone_from(&self.id);
                command.handle_output(output);
            }
            None => {
                trace!(shell_id = %self.id, command_id = %output.command_id, "dropping stale output");
            }
        }
    }

    fn route_exit(&self, mut exit: ExitEvent) {
        match self.take(&exit.command_id) {
            Some(command) => {
                exit.shell_id.clone_from(&self.id);
                command.handle_exit(exit);
            }
            None => {
                trace!(shell_id = %self.id, command_id = %exit.command_id, "dropping stale exit");
            }
        }
    }

    fn take(&self, command_id: &str) -> Option<Arc<CommandInstance>> {
        self.outstanding.lock().commands.remove(command_id)
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
