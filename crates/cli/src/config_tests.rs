// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::{Cli, Command, DEFAULT_PORT};

fn parse(args: &[&str]) -> anyhow::Result<Cli> {
    Ok(Cli::try_parse_from(args)?)
}

#[test]
fn serve_defaults() -> anyhow::Result<()> {
    let cli = parse(&["shellcast", "serve"])?;
    cli.validate()?;
    let Command::Serve(config) = cli.command else {
        anyhow::bail!("expected serve");
    };
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.addr(), "localhost:30013");
    assert!(config.tls()?.is_none());
    Ok(())
}

#[test]
fn exec_takes_command_after_separator() -> anyhow::Result<()> {
    let cli = parse(&["shellcast", "exec", "--timeout", "5", "--", "ls", "-la", "/tmp"])?;
    cli.validate()?;
    let Command::Exec(config) = cli.command else {
        anyhow::bail!("expected exec");
    };
    assert_eq!(config.timeout, 5);
    assert_eq!(config.command, vec!["ls", "-la", "/tmp"]);
    assert!(!config.json);
    Ok(())
}

#[test]
fn exec_default_timeout() -> anyhow::Result<()> {
    let cli = parse(&["shellcast", "exec", "--", "uptime"])?;
    let Command::Exec(config) = cli.command else {
        anyhow::bail!("expected exec");
    };
    assert_eq!(config.timeout, 60);
    Ok(())
}

#[test]
fn agent_reconnect_interval() -> anyhow::Result<()> {
    let cli = parse(&["shellcast", "agent", "--host", "dispatch.local", "--reconnect-ivl", "3"])?;
    cli.validate()?;
    let Command::Agent(config) = cli.command else {
        anyhow::bail!("expected agent");
    };
    assert_eq!(config.connect.host, "dispatch.local");
    assert_eq!(config.reconnect_interval(), Duration::from_secs(3));
    Ok(())
}

#[test]
fn global_log_flags_after_subcommand() -> anyhow::Result<()> {
    let cli = parse(&["shellcast", "serve", "--log-format", "json", "--log-level", "debug"])?;
    cli.validate()?;
    assert_eq!(cli.log_format, "json");
    assert_eq!(cli.log_level, "debug");
    Ok(())
}

#[yare::parameterized(
    missing_command = { &["shellcast", "exec"], "missing command" },
    zero_timeout = { &["shellcast", "exec", "--timeout", "0", "--", "ls"], "--timeout" },
    cert_without_key = { &["shellcast", "serve", "--cert-path", "server.pem"], "--key-path" },
    key_without_cert = { &["shellcast", "serve", "--key-path", "key.pem"], "--cert-path" },
    zero_reconnect = { &["shellcast", "agent", "--reconnect-ivl", "0"], "--reconnect-ivl" },
    bad_log_format = { &["shellcast", "serve", "--log-format", "xml"], "log format" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let cli = Cli::parse_from(args);
    crate::assert_err_contains!(cli.validate(), expected_substr);
}

#[test]
fn exec_without_separator_is_rejected() {
    assert!(parse(&["shellcast", "exec", "ls"]).is_err());
}
