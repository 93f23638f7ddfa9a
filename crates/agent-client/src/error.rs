// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by [`crate::client::AgentClient`] implementations.
#[derive(Debug, Error)]
pub enum AgentClientError {
    #[error("capture agent unreachable: {0}")]
    Unreachable(String),
    #[error("capture agent rejected the call: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("capture agent response could not be decoded: {0}")]
    Decode(String),
}
