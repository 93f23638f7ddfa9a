// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`AgentClient`] for orchestrator and progress-pipeline tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sendense_core::{BackupId, ProgressRecord};

use super::{AgentClient, StartBackupRequest, StartBackupResponse};
use crate::error::AgentClientError;

#[derive(Default)]
struct Inner {
    start_result: Option<Result<StartBackupResponse, AgentClientErrorClone>>,
    progress: HashMap<BackupId, ProgressRecord>,
    dispatched: Vec<StartBackupRequest>,
}

/// `AgentClientError` is not `Clone` (its variants hold owned `String`s but
/// derive only `Error`/`Debug`), so the fake stores a small clonable mirror
/// instead of the real error type.
#[derive(Clone)]
enum AgentClientErrorClone {
    Unreachable(String),
    Rejected { status: u16, body: String },
}

impl From<AgentClientErrorClone> for AgentClientError {
    fn from(e: AgentClientErrorClone) -> Self {
        match e {
            AgentClientErrorClone::Unreachable(msg) => AgentClientError::Unreachable(msg),
            AgentClientErrorClone::Rejected { status, body } => AgentClientError::Rejected { status, body },
        }
    }
}

#[derive(Default)]
pub struct FakeAgentClient {
    inner: Mutex<Inner>,
}

impl FakeAgentClient {
    pub fn set_start_succeeds(&self, response: StartBackupResponse) {
        self.inner.lock().start_result = Some(Ok(response));
    }

    pub fn set_start_unreachable(&self, message: impl Into<String>) {
        self.inner.lock().start_result = Some(Err(AgentClientErrorClone::Unreachable(message.into())));
    }

    pub fn set_start_rejected(&self, status: u16, body: impl Into<String>) {
        self.inner.lock().start_result = Some(Err(AgentClientErrorClone::Rejected {
            status,
            body: body.into(),
        }));
    }

    pub fn set_progress(&self, backup_id: BackupId, record: ProgressRecord) {
        self.inner.lock().progress.insert(backup_id, record);
    }

    pub fn clear_progress(&self, backup_id: BackupId) {
        self.inner.lock().progress.remove(&backup_id);
    }

    pub fn dispatched(&self) -> Vec<StartBackupRequest> {
        self.inner.lock().dispatched.clone()
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn start_backup(&self, req: &StartBackupRequest) -> Result<StartBackupResponse, AgentClientError> {
        let mut inner = self.inner.lock();
        inner.dispatched.push(req.clone());
        match inner.start_result.clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(e.into()),
            None => Ok(StartBackupResponse {
                backup_id: req.backup_id,
                status: crate::types::StartAcceptance::Started,
            }),
        }
    }

    async fn poll_progress(&self, backup_id: BackupId) -> Result<Option<ProgressRecord>, AgentClientError> {
        Ok(self.inner.lock().progress.get(&backup_id).cloned())
    }
}
