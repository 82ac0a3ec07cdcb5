// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Shell` service handlers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};
use tracing::info;

use super::convert::{
    command_to_proto, event_to_exec_response, follow_request_to_event, request_from_proto,
};
use super::{proto, GrpcStream, ShellGrpc};
use crate::dispatch::AgentSession;
use crate::error::ErrorCode;
use crate::event::epoch_ms;

impl ShellGrpc {
    fn ensure_running(&self) -> Result<(), Status> {
        if self.shutdown.is_cancelled() {
            return Err(ErrorCode::Unavailable.to_grpc_status("dispatcher is shutting down"));
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl proto::shell_server::Shell for ShellGrpc {
    // -- Diagnostics ----------------------------------------------------------

    async fn time(
        &self,
        _request: Request<proto::TimeRequest>,
    ) -> Result<Response<proto::TimeResponse>, Status> {
        Ok(Response::new(proto::TimeResponse { time: epoch_ms() as i64 }))
    }

    async fn ping(
        &self,
        request: Request<proto::PingRequest>,
    ) -> Result<Response<proto::PingResponse>, Status> {
        Ok(Response::new(proto::PingResponse { data: request.into_inner().data }))
    }

    // -- Broadcast ------------------------------------------------------------

    type ExecStream = GrpcStream<proto::ExecResponse>;

    async fn exec(
        &self,
        request: Request<proto::ExecRequest>,
    ) -> Result<Response<Self::ExecStream>, Status> {
        self.ensure_running()?;
        let command = request_from_proto(request.into_inner())?;
        let submission = self.dispatcher.submit(command);
        let stream = submission.map(|event| Ok(event_to_exec_response(&event)));
        Ok(Response::new(Box::pin(stream)))
    }

    // -- Agents ---------------------------------------------------------------

    type FollowStream = GrpcStream<proto::FollowResponse>;

    async fn follow(
        &self,
        request: Request<Streaming<proto::FollowRequest>>,
    ) -> Result<Response<Self::FollowStream>, Status> {
        self.ensure_running()?;
        let remote = request.remote_addr();
        let inbound = request.into_inner().filter_map(|item| match item {
            Ok(req) => follow_request_to_event(req).map(Ok),
            Err(status) => Some(Err(status)),
        });

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let session = Arc::new(AgentSession::new(commands_tx));
        self.dispatcher.register(Arc::clone(&session));
        info!(shell_id = %session.id(), ?remote, shells = self.dispatcher.len(), "shell connected");

        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match session.handle_inbound_events(Box::pin(inbound), shutdown).await {
                Ok(()) => info!(shell_id = %session.id(), "shell disconnected"),
                Err(status) => {
                    info!(shell_id = %session.id(), err = %status.message(), "shell disconnected")
                }
            }
            dispatcher.deregister(session.id());
        });

        let outbound = UnboundedReceiverStream::new(commands_rx)
            .map(|spec| Ok(proto::FollowResponse { command: Some(command_to_proto(&spec)) }));
        Ok(Response::new(Box::pin(outbound)))
    }
}
