// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `shellcast` binary as
//! dispatcher, agents, and operator.

use std::time::Duration;

use shellcast_specs::Cluster;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn exec_without_agents_succeeds_quietly() -> anyhow::Result<()> {
    let cluster = Cluster::start(TIMEOUT).await?;
    let out = cluster.exec(&[], &["echo", "hi"])?;

    assert!(out.status.success(), "{out:?}");
    assert!(out.stdout.is_empty());
    Ok(())
}

#[tokio::test]
async fn exec_prints_tagged_lines() -> anyhow::Result<()> {
    let mut cluster = Cluster::start(TIMEOUT).await?;
    cluster.add_agent()?;
    cluster.add_agent()?;
    cluster.wait_for_agents(2, TIMEOUT).await?;

    let out = cluster.exec(&[], &["echo", "hi"])?;
    assert!(out.status.success(), "{out:?}");

    let stdout = String::from_utf8(out.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines.iter().all(|l| l.ends_with(": hi")), "{stdout}");
    Ok(())
}

#[tokio::test]
async fn exec_json_reports_exits() -> anyhow::Result<()> {
    let mut cluster = Cluster::start(TIMEOUT).await?;
    cluster.add_agent()?;
    cluster.wait_for_agents(1, TIMEOUT).await?;

    let out = cluster.exec(&["--json"], &["sh", "-c", "echo out; exit 4"])?;
    assert!(out.status.success(), "{out:?}");

    let events: Vec<serde_json::Value> = String::from_utf8(out.stdout)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(events[0]["type"], "output");
    assert_eq!(events[0]["source"], "stdout");
    assert_eq!(events[0]["line"], "out");
    assert_eq!(events[1]["type"], "exit");
    assert_eq!(events[1]["code"], 1);
    Ok(())
}

#[tokio::test]
async fn stopped_agent_leaves_the_fleet() -> anyhow::Result<()> {
    let mut cluster = Cluster::start(TIMEOUT).await?;
    cluster.add_agent()?;
    cluster.add_agent()?;
    cluster.wait_for_agents(2, TIMEOUT).await?;

    cluster.stop_agent()?;
    cluster.wait_for_agents(1, TIMEOUT).await?;
    Ok(())
}

#[test]
fn exec_rejects_missing_command() -> anyhow::Result<()> {
    let port = shellcast_specs::free_port()?;
    let out = std::process::Command::new(shellcast_specs::shellcast_binary())
        .args(["exec", "--port", &port.to_string()])
        .output()?;
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing command"));
    Ok(())
}
