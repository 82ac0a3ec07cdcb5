// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::event::{CommandSpec, ExitEvent, OutputEvent};

/// Receives the events routed to one broadcast command.
///
/// Called concurrently from every session the command was sent to, and
/// never while a session or registry lock is held. `handle_exit` fires at
/// most once per session.
pub trait CommandObserver: Send + Sync {
    fn handle_output(&self, output: OutputEvent);
    fn handle_exit(&self, exit: ExitEvent);
}

/// One broadcast command, shared by every session it was sent to.
pub struct CommandInstance {
    spec: CommandSpec,
    observer: Option<Arc<dyn CommandObserver>>,
}

impl CommandInstance {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, observer: None }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn handle_output(&self, output: OutputEvent) {
        if let Some(ref observer) = self.observer {
            observer.handle_output(output);
        }
    }

    pub fn handle_exit(&self, exit: ExitEvent) {
        if let Some(ref observer) = self.observer {
            observer.handle_exit(exit);
        }
    }
}

impl std::fmt::Debug for CommandInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInstance")
            .field("spec", &self.spec)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
