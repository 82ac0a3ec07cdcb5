// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network plumbing: the gRPC service and channel setup shared by the
//! dispatcher, agents, and operators.

pub mod grpc;

use std::path::Path;

use anyhow::Context;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity, ServerTlsConfig};

/// Join a host and port into an authority, bracketing bare IPv6 addresses.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Load a PEM certificate and key for serving TLS.
pub fn server_tls(cert_path: &Path, key_path: &Path) -> anyhow::Result<ServerTlsConfig> {
    let cert = std::fs::read(cert_path)
        .with_context(|| format!("could not load TLS certificate {}", cert_path.display()))?;
    let key = std::fs::read(key_path)
        .with_context(|| format!("could not load TLS key {}", key_path.display()))?;
    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

/// Trust the PEM certificate at `ca_path` when connecting to the dispatcher.
pub fn client_tls(ca_path: &Path, domain: Option<&str>) -> anyhow::Result<ClientTlsConfig> {
    let ca = std::fs::read(ca_path)
        .with_context(|| format!("could not load TLS certificate {}", ca_path.display()))?;
    let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));
    if let Some(domain) = domain {
        tls = tls.domain_name(domain);
    }
    Ok(tls)
}

/// Build a lazily-validated endpoint for the dispatcher at `host:port`.
pub fn endpoint(host: &str, port: u16, tls: Option<ClientTlsConfig>) -> anyhow::Result<Endpoint> {
    let scheme = if tls.is_some() { "https" } else { "http" };
    let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", join_host_port(host, port)))
        .context("invalid dispatcher address")?;
    if let Some(tls) = tls {
        endpoint = endpoint.tls_config(tls)?;
    }
    Ok(endpoint)
}

/// Connect to the dispatcher.
pub async fn connect(endpoint: &Endpoint) -> anyhow::Result<Channel> {
    endpoint
        .connect()
        .await
        .with_context(|| format!("could not connect to {}", endpoint.uri()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
