// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client the orchestrator uses to dispatch and poll a capture agent.
//! Deadlines are enforced with `tokio::time::timeout` and mapped to a domain
//! error at this boundary rather than leaking `Elapsed` upward.

use std::time::Duration;

use async_trait::async_trait;
use sendense_core::{BackupId, ProgressRecord};

use crate::error::AgentClientError;
use crate::types::{StartBackupRequest, StartBackupResponse};

/// Bound on the agent dispatch call.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on a single progress poll.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Dispatches `POST /replicate`. Returns `Ok` only for `200`/`202`.
    async fn start_backup(&self, req: &StartBackupRequest) -> Result<StartBackupResponse, AgentClientError>;

    /// Polls `GET /progress/{backup_id}`. A `404` is not an error — it
    /// surfaces as `Ok(None)` so the caller can apply its own warm-up
    /// grace-window policy.
    async fn poll_progress(&self, backup_id: BackupId) -> Result<Option<ProgressRecord>, AgentClientError>;
}

pub struct HttpAgentClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpAgentClient {
    pub fn new(base_url: reqwest::Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn start_backup(&self, req: &StartBackupRequest) -> Result<StartBackupResponse, AgentClientError> {
        let url = self
            .base_url
            .join("/replicate")
            .map_err(|e| AgentClientError::Unreachable(e.to_string()))?;

        let call = self.http.post(url).json(req).send();
        let response = tokio::time::timeout(DISPATCH_TIMEOUT, call)
            .await
            .map_err(|_| AgentClientError::Unreachable("dispatch timed out".to_string()))?
            .map_err(|e| AgentClientError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentClientError::Rejected { status, body });
        }

        response.json().await.map_err(|e| AgentClientError::Decode(e.to_string()))
    }

    async fn poll_progress(&self, backup_id: BackupId) -> Result<Option<ProgressRecord>, AgentClientError> {
        let url = self
            .base_url
            .join(&format!("/progress/{backup_id}"))
            .map_err(|e| AgentClientError::Unreachable(e.to_string()))?;

        let call = self.http.get(url).send();
        let response = tokio::time::timeout(POLL_TIMEOUT, call)
            .await
            .map_err(|_| AgentClientError::Unreachable("poll timed out".to_string()))?
            .map_err(|e| AgentClientError::Unreachable(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentClientError::Rejected { status, body });
        }

        let record = response.json().await.map_err(|e| AgentClientError::Decode(e.to_string()))?;
        Ok(Some(record))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
