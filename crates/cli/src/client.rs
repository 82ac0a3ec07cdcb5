// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator side of `shellcast exec`: submit one broadcast and print the
//! merged output until every shell has exited.

use tracing::info;

use crate::config::ExecConfig;
use crate::event::CommandEvent;
use crate::transport::grpc::convert::exec_response_to_event;
use crate::transport::grpc::proto;
use crate::transport::grpc::proto::shell_client::ShellClient;

/// Per-shell outcome counts for one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecSummary {
    pub lines: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExecSummary {
    fn record(&mut self, event: &CommandEvent) {
        match event {
            CommandEvent::Output(_) => self.lines += 1,
            CommandEvent::Exit(e) if e.success() => self.succeeded += 1,
            CommandEvent::Exit(_) => self.failed += 1,
        }
    }
}

/// Run `shellcast exec`. Returns the process exit code.
///
/// Per-shell failures are reported as data and still exit 0; only
/// transport errors are returned as `Err`.
pub async fn run(config: ExecConfig) -> anyhow::Result<i32> {
    let endpoint = config.connect.endpoint()?;
    let channel = crate::transport::connect(&endpoint).await?;
    let mut client = ShellClient::new(channel);

    let mut argv = config.command.into_iter();
    let name = argv.next().ok_or_else(|| anyhow::anyhow!("missing command"))?;
    let command = proto::Command {
        id: String::new(),
        name,
        args: argv.collect(),
        timeout: config.timeout,
    };

    let summary = exec(&mut client, command, |event| {
        if let Some(line) = format_event(event, config.json)? {
            println!("{line}");
        }
        Ok(())
    })
    .await?;
    info!(
        lines = summary.lines,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "done"
    );
    Ok(0)
}

/// Submit `command` and feed every event to `on_event` until the stream closes.
pub async fn exec<F>(
    client: &mut ShellClient<tonic::transport::Channel>,
    command: proto::Command,
    mut on_event: F,
) -> anyhow::Result<ExecSummary>
where
    F: FnMut(&CommandEvent) -> anyhow::Result<()>,
{
    let mut stream = client.exec(proto::ExecRequest { command: Some(command) }).await?.into_inner();
    let mut summary = ExecSummary::default();
    while let Some(response) = stream.message().await? {
        let Some(event) = exec_response_to_event(response) else {
            continue;
        };
        if let CommandEvent::Exit(ref exit) = event {
            info!(shell_id = %exit.shell_id, code = exit.code, "shell exited");
        }
        summary.record(&event);
        on_event(&event)?;
    }
    Ok(summary)
}

/// Render an event for the terminal. Exits are only printed in JSON mode.
pub fn format_event(event: &CommandEvent, json: bool) -> anyhow::Result<Option<String>> {
    if json {
        return Ok(Some(serde_json::to_string(event)?));
    }
    Ok(match event {
        CommandEvent::Output(o) => Some(format!("{}: {}", o.shell_id, o.line)),
        CommandEvent::Exit(_) => None,
    })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
