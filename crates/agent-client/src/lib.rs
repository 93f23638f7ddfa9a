// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sendense-agent-client: the hub <-> capture agent control-plane wire
//! contract, and the client the orchestrator uses to speak it.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AgentClient, HttpAgentClient, DISPATCH_TIMEOUT, POLL_TIMEOUT};
pub use error::AgentClientError;
pub use types::{StartAcceptance, StartBackupRequest, StartBackupResponse};

#[cfg(any(test, feature = "test-support"))]
pub use client::fake::FakeAgentClient;
