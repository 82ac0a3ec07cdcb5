// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `shellcast` binary as dispatcher, agents, and operator,
//! all on loopback.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

use shellcast::transport::grpc::proto;

/// Resolve the path to the compiled `shellcast` binary.
pub fn shellcast_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("shellcast")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn command(subcommand: &str, port: u16) -> anyhow::Result<Command> {
    let binary = shellcast_binary();
    anyhow::ensure!(binary.exists(), "shellcast binary not found at {}", binary.display());
    let mut cmd = Command::new(binary);
    cmd.arg(subcommand)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--log-format", "text", "--log-level", "warn"]);
    Ok(cmd)
}

/// A running `shellcast` process that is killed on drop.
pub struct ShellcastProcess {
    child: Child,
}

impl ShellcastProcess {
    fn spawn(mut cmd: Command) -> anyhow::Result<Self> {
        let child = cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
        Ok(Self { child })
    }

    /// Kill the process and reap it.
    pub fn stop(mut self) -> anyhow::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ShellcastProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A dispatcher plus any number of agents on one port.
pub struct Cluster {
    port: u16,
    _dispatcher: ShellcastProcess,
    agents: Vec<ShellcastProcess>,
}

impl Cluster {
    /// Start a dispatcher and wait until it answers `Ping`.
    pub async fn start(timeout: Duration) -> anyhow::Result<Self> {
        let port = free_port()?;
        let dispatcher = ShellcastProcess::spawn(command("serve", port)?)?;
        let cluster = Self { port, _dispatcher: dispatcher, agents: Vec::new() };
        cluster.wait_ready(timeout).await?;
        Ok(cluster)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// gRPC endpoint URL.
    pub fn grpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Start one more agent. It may take a moment to register.
    pub fn add_agent(&mut self) -> anyhow::Result<()> {
        let mut cmd = command("agent", self.port)?;
        cmd.args(["--reconnect-ivl", "1"]);
        self.agents.push(ShellcastProcess::spawn(cmd)?);
        Ok(())
    }

    /// Stop the most recently started agent.
    pub fn stop_agent(&mut self) -> anyhow::Result<()> {
        match self.agents.pop() {
            Some(agent) => agent.stop(),
            None => anyhow::bail!("no agents running"),
        }
    }

    /// Run `shellcast exec` to completion and capture its output.
    pub fn exec(&self, extra: &[&str], argv: &[&str]) -> anyhow::Result<Output> {
        let mut cmd = command("exec", self.port)?;
        cmd.args(extra).arg("--").args(argv);
        Ok(cmd.stdin(Stdio::null()).output()?)
    }

    async fn client(&self) -> anyhow::Result<proto::shell_client::ShellClient<tonic::transport::Channel>> {
        Ok(proto::shell_client::ShellClient::connect(self.grpc_url()).await?)
    }

    async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("dispatcher did not come up within {timeout:?}");
            }
            if let Ok(mut client) = self.client().await {
                if client.ping(proto::PingRequest { data: vec![] }).await.is_ok() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Poll with a no-op broadcast until exactly `n` agents answer.
    pub async fn wait_for_agents(&self, n: usize, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("expected {n} agents within {timeout:?}");
            }
            if self.count_agents().await? == n {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn count_agents(&self) -> anyhow::Result<usize> {
        let mut client = self.client().await?;
        let request = proto::ExecRequest {
            command: Some(proto::Command {
                id: String::new(),
                name: "true".to_owned(),
                args: vec![],
                timeout: 5,
            }),
        };
        let mut stream = client.exec(request).await?.into_inner();
        let mut exits = 0;
        while let Some(response) = stream.message().await? {
            if matches!(response.event, Some(proto::exec_response::Event::Exit(_))) {
                exits += 1;
            }
        }
        Ok(exits)
    }
}
