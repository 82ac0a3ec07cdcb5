// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shellcast: broadcast shell commands to connected agents and merge
//! their output into one stream.

pub mod agent;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod server;
pub mod test_support;
pub mod transport;
