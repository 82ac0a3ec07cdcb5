// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs one command and streams its output back as events.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::event::{CommandEvent, CommandSpec, ExitEvent, OutputEvent, OutputSource, EXIT_FAILURE};

/// Where the executor sends the events it produces.
pub type EventSink = mpsc::UnboundedSender<CommandEvent>;

/// Run `spec` to completion, sending one output event per line followed by
/// exactly one exit event.
///
/// Failures never escape: a command that cannot be started produces a
/// daemon line and a failed exit instead.
pub async fn execute(spec: CommandSpec, sink: EventSink) {
    let code = match run(&spec, &sink).await {
        Ok(code) => code,
        Err(e) => {
            warn!(command_id = %spec.id, name = %spec.name, "command failed to start: {e:#}");
            send(&sink, CommandEvent::Output(OutputEvent::daemon(&spec.id, format!("{e:#}"))));
            EXIT_FAILURE
        }
    };
    debug!(command_id = %spec.id, code, "command exited");
    send(&sink, CommandEvent::Exit(ExitEvent::new(&spec.id, code)));
}

/// Returns the exit code to report, or an error if the process never started.
async fn run(spec: &CommandSpec, sink: &EventSink) -> anyhow::Result<i64> {
    let timeout = spec
        .timeout()
        .with_context(|| format!("timeout must be positive, got {}s", spec.timeout_secs))?;
    let deadline = Instant::now() + timeout;

    let mut child = Command::new(&spec.name)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("could not start {}", spec.name))?;
    let stdout = child.stdout.take().context("stdout pipe unavailable")?;
    let stderr = child.stderr.take().context("stderr pipe unavailable")?;

    let work = async {
        tokio::join!(
            pump(&spec.id, OutputSource::Stdout, stdout, sink),
            pump(&spec.id, OutputSource::Stderr, stderr, sink),
        );
        child.wait().await
    };
    let outcome = tokio::time::timeout_at(deadline, work).await;

    let code = match outcome {
        Ok(Ok(status)) if status.success() => 0,
        Ok(Ok(status)) => {
            debug!(command_id = %spec.id, %status, "command failed");
            EXIT_FAILURE
        }
        Ok(Err(e)) => {
            send(sink, CommandEvent::Output(OutputEvent::daemon(&spec.id, e.to_string())));
            EXIT_FAILURE
        }
        Err(_) => {
            debug!(command_id = %spec.id, timeout_secs = spec.timeout_secs, "command timed out");
            let _ = child.kill().await;
            EXIT_FAILURE
        }
    };
    Ok(code)
}

/// Forward `pipe` to `sink` one line at a time.
async fn pump<R>(command_id: &str, source: OutputSource, pipe: R, sink: &EventSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = trim_line(&buf);
                send(sink, CommandEvent::Output(OutputEvent::new(command_id, source, line)));
            }
            Err(e) => {
                send(sink, CommandEvent::Output(OutputEvent::daemon(command_id, e.to_string())));
                break;
            }
        }
    }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily.
pub fn trim_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

fn send(sink: &EventSink, event: CommandEvent) {
    // A closed sink means the dispatcher went away; the process still runs out.
    let _ = sink.send(event);
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
