// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversions between domain events and `shellcast.v1` messages.

use super::proto;
use super::proto::command_output::Source;
use crate::error::ErrorCode;
use crate::event::{CommandEvent, CommandRequest, CommandSpec, ExitEvent, OutputEvent, OutputSource};

pub fn source_to_proto(source: OutputSource) -> Source {
    match source {
        OutputSource::Stdout => Source::Stdout,
        OutputSource::Stderr => Source::Stderr,
        OutputSource::Daemon => Source::Daemon,
    }
}

/// Unknown wire values are treated as daemon diagnostics.
pub fn source_from_proto(value: i32) -> OutputSource {
    match Source::try_from(value) {
        Ok(Source::Stdout) => OutputSource::Stdout,
        Ok(Source::Stderr) => OutputSource::Stderr,
        Ok(Source::Daemon) | Err(_) => OutputSource::Daemon,
    }
}

pub fn command_to_proto(spec: &CommandSpec) -> proto::Command {
    proto::Command {
        id: spec.id.clone(),
        name: spec.name.clone(),
        args: spec.args.clone(),
        timeout: spec.timeout_secs,
    }
}

pub fn command_from_proto(command: proto::Command) -> CommandSpec {
    CommandSpec {
        id: command.id,
        name: command.name,
        args: command.args,
        timeout_secs: command.timeout,
    }
}

/// Validate an operator's `Exec` request. Any client-supplied id is ignored.
pub fn request_from_proto(request: proto::ExecRequest) -> Result<CommandRequest, tonic::Status> {
    let command = request
        .command
        .ok_or_else(|| ErrorCode::BadRequest.to_grpc_status("missing command"))?;
    if command.name.is_empty() {
        return Err(ErrorCode::BadRequest.to_grpc_status("command name must not be empty"));
    }
    Ok(CommandRequest { name: command.name, args: command.args, timeout_secs: command.timeout })
}

pub fn output_to_proto(output: &OutputEvent) -> proto::CommandOutput {
    proto::CommandOutput {
        command_id: output.command_id.clone(),
        shell_id: output.shell_id.clone(),
        time: output.time as i64,
        source: source_to_proto(output.source).into(),
        line: output.line.clone(),
    }
}

pub fn output_from_proto(output: proto::CommandOutput) -> OutputEvent {
    OutputEvent {
        source: source_from_proto(output.source),
        command_id: output.command_id,
        shell_id: output.shell_id,
        time: u64::try_from(output.time).unwrap_or_default(),
        line: output.line,
    }
}

pub fn exit_to_proto(exit: &ExitEvent) -> proto::CommandExit {
    proto::CommandExit {
        command_id: exit.command_id.clone(),
        shell_id: exit.shell_id.clone(),
        time: exit.time as i64,
        code: exit.code,
    }
}

pub fn exit_from_proto(exit: proto::CommandExit) -> ExitEvent {
    ExitEvent {
        command_id: exit.command_id,
        shell_id: exit.shell_id,
        time: u64::try_from(exit.time).unwrap_or_default(),
        code: exit.code,
    }
}

pub fn event_to_exec_response(event: &CommandEvent) -> proto::ExecResponse {
    use proto::exec_response::Event;
    let event = match event {
        CommandEvent::Output(o) => Event::Output(output_to_proto(o)),
        CommandEvent::Exit(e) => Event::Exit(exit_to_proto(e)),
    };
    proto::ExecResponse { event: Some(event) }
}

pub fn exec_response_to_event(response: proto::ExecResponse) -> Option<CommandEvent> {
    use proto::exec_response::Event;
    match response.event? {
        Event::Output(o) => Some(CommandEvent::Output(output_from_proto(o))),
        Event::Exit(e) => Some(CommandEvent::Exit(exit_from_proto(e))),
    }
}

pub fn event_to_follow_request(event: &CommandEvent) -> proto::FollowRequest {
    use proto::follow_request::Data;
    let data = match event {
        CommandEvent::Output(o) => Data::Output(output_to_proto(o)),
        CommandEvent::Exit(e) => Data::Exit(exit_to_proto(e)),
    };
    proto::FollowRequest { data: Some(data) }
}

/// Returns `None` for a message with no payload.
pub fn follow_request_to_event(request: proto::FollowRequest) -> Option<CommandEvent> {
    use proto::follow_request::Data;
    match request.data? {
        Data::Output(o) => Some(CommandEvent::Output(output_from_proto(o))),
        Data::Exit(e) => Some(CommandEvent::Exit(exit_from_proto(e))),
    }
}
