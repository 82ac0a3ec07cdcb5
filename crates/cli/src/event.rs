// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code reported for any failure: non-zero exit, signal, timeout,
/// spawn failure, or a shell that disconnected mid-command.
pub const EXIT_FAILURE: i64 = 1;

/// Which stream an output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    Stdout,
    Stderr,
    /// Diagnostics produced by the agent or dispatcher rather than the process.
    Daemon,
}

impl OutputSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Daemon => "daemon",
        }
    }
}

impl std::fmt::Display for OutputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operator asks to run. The dispatcher assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
    pub timeout_secs: i64,
}

/// A command as sent to agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub id: String,
    pub name: String,
    pub args: Vec<String>,
    pub timeout_secs: i64,
}

impl CommandSpec {
    /// Assign a fresh id to an operator request.
    pub fn from_request(request: CommandRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            args: request.args,
            timeout_secs: request.timeout_secs,
        }
    }

    /// Time budget for the process, or `None` when the timeout is not positive.
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_secs).ok().filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// One line of output from a command running on a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub command_id: String,
    /// Filled in by the dispatcher session that received the event.
    pub shell_id: String,
    pub time: u64,
    pub source: OutputSource,
    pub line: String,
}

impl OutputEvent {
    pub fn new(command_id: impl Into<String>, source: OutputSource, line: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            shell_id: String::new(),
            time: epoch_ms(),
            source,
            line: line.into(),
        }
    }

    pub fn daemon(command_id: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(command_id, OutputSource::Daemon, line)
    }
}

/// Terminal status of a command on one shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub command_id: String,
    pub shell_id: String,
    pub time: u64,
    pub code: i64,
}

impl ExitEvent {
    pub fn new(command_id: impl Into<String>, code: i64) -> Self {
        Self { command_id: command_id.into(), shell_id: String::new(), time: epoch_ms(), code }
    }

    /// Exit fabricated on behalf of a shell that went away.
    pub fn synthesized(command_id: impl Into<String>, shell_id: impl Into<String>) -> Self {
        Self { shell_id: shell_id.into(), ..Self::new(command_id, EXIT_FAILURE) }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Events flowing from an agent back to the dispatcher, and from the
/// dispatcher to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommandEvent {
    Output(OutputEvent),
    Exit(ExitEvent),
}

impl CommandEvent {
    pub fn command_id(&self) -> &str {
        match self {
            Self::Output(o) => &o.command_id,
            Self::Exit(e) => &e.command_id,
        }
    }

    pub fn shell_id(&self) -> &str {
        match self {
            Self::Output(o) => &o.shell_id,
            Self::Exit(e) => &e.shell_id,
        }
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
