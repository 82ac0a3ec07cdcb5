// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tonic::transport::{Endpoint, ServerTlsConfig};

use crate::transport;

/// Default dispatcher port.
pub const DEFAULT_PORT: u16 = 30013;

/// Broadcast shell commands to a fleet of connected agents.
#[derive(Debug, Parser)]
#[command(name = "shellcast", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log format (json or text).
    #[arg(long, global = true, env = "SHELLCAST_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "SHELLCAST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the dispatcher.
    Serve(ServeConfig),
    /// Run a shell agent that executes broadcast commands.
    Agent(AgentConfig),
    /// Broadcast a command to every connected agent and print the output.
    Exec(ExecConfig),
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        match self.command {
            Command::Serve(ref c) => c.validate(),
            Command::Agent(ref c) => c.validate(),
            Command::Exec(ref c) => c.validate(),
        }
    }
}

/// Dispatcher listen options.
#[derive(Debug, Clone, clap::Args)]
pub struct ServeConfig {
    /// Host address to bind to.
    #[arg(long, env = "SHELLCAST_HOST", default_value = "localhost")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "SHELLCAST_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// TLS certificate (PEM). Requires --key-path.
    #[arg(long, env = "SHELLCAST_CERT_PATH")]
    pub cert_path: Option<PathBuf>,

    /// TLS private key (PEM). Requires --cert-path.
    #[arg(long, env = "SHELLCAST_KEY_PATH")]
    pub key_path: Option<PathBuf>,
}

impl ServeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.cert_path, &self.key_path) {
            (Some(_), None) => anyhow::bail!("--cert-path requires --key-path"),
            (None, Some(_)) => anyhow::bail!("--key-path requires --cert-path"),
            _ => Ok(()),
        }
    }

    pub fn addr(&self) -> String {
        transport::join_host_port(&self.host, self.port)
    }

    /// Server TLS settings, or `None` to serve plaintext.
    pub fn tls(&self) -> anyhow::Result<Option<ServerTlsConfig>> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Ok(Some(transport::server_tls(cert, key)?)),
            _ => Ok(None),
        }
    }
}

/// How agents and operators reach the dispatcher.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectArgs {
    /// Dispatcher host.
    #[arg(long, env = "SHELLCAST_HOST", default_value = "localhost")]
    pub host: String,

    /// Dispatcher port.
    #[arg(long, env = "SHELLCAST_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Dispatcher certificate (PEM) to trust. Enables TLS.
    #[arg(long, env = "SHELLCAST_CERT_PATH")]
    pub cert_path: Option<PathBuf>,

    /// Server name to verify against the certificate (defaults to --host).
    #[arg(long, env = "SHELLCAST_TLS_DOMAIN")]
    pub tls_domain: Option<String>,
}

impl ConnectArgs {
    pub fn endpoint(&self) -> anyhow::Result<Endpoint> {
        let tls = match self.cert_path {
            Some(ref ca) => Some(transport::client_tls(ca, self.tls_domain.as_deref())?),
            None => None,
        };
        transport::endpoint(&self.host, self.port, tls)
    }
}

/// Agent options.
#[derive(Debug, Clone, clap::Args)]
pub struct AgentConfig {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Seconds to wait before reconnecting after the stream drops.
    #[arg(long, env = "SHELLCAST_RECONNECT_IVL", default_value_t = 10)]
    pub reconnect_ivl: u64,
}

impl AgentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reconnect_ivl == 0 {
            anyhow::bail!("--reconnect-ivl must be at least 1 second");
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_ivl)
    }
}

/// Operator options.
#[derive(Debug, Clone, clap::Args)]
pub struct ExecConfig {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Seconds each agent lets the command run before killing it.
    #[arg(long, env = "SHELLCAST_TIMEOUT", default_value_t = 60)]
    pub timeout: i64,

    /// Print one JSON object per event instead of `<shell>: <line>`.
    #[arg(long)]
    pub json: bool,

    /// Command to run (after --).
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl ExecConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("missing command (pass it after --)");
        }
        if self.timeout <= 0 {
            anyhow::bail!("--timeout must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
