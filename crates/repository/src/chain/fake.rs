// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`ChainManagerApi`] for orchestrator-level tests. No WAL, no
//! disk IO, no image driver — just enough bookkeeping to exercise the same
//! conflict/chain-cap/finalize/fail/delete rules the real manager enforces.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sendense_core::{BackupId, BackupStatus, BackupType, DiskIndex, RepositoryId, VmContextId};
use sendense_storage::state::{BackupChain, BackupJob};

use super::{ChainManagerApi, CreateBackupRequest};
use crate::error::RepositoryError;

#[derive(Default)]
struct Inner {
    backup_jobs: HashMap<BackupId, BackupJob>,
    chains: HashMap<(VmContextId, DiskIndex, RepositoryId), BackupChain>,
    max_chain_depth: u32,
}

/// Test double for [`super::ChainManager`]. `max_chain_depth` defaults to 64;
/// override with [`FakeChainManager::with_max_chain_depth`].
pub struct FakeChainManager {
    inner: Mutex<Inner>,
}

impl Default for FakeChainManager {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_chain_depth: 64,
                ..Inner::default()
            }),
        }
    }
}

impl FakeChainManager {
    pub fn with_max_chain_depth(max_chain_depth: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_chain_depth,
                ..Inner::default()
            }),
        }
    }
}

#[async_trait]
impl ChainManagerApi for FakeChainManager {
    async fn get_chain(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
    ) -> Option<BackupChain> {
        self.inner.lock().chains.get(&(vm_context_id, disk_index, repository_id)).cloned()
    }

    async fn get_backup(&self, backup_id: BackupId) -> Option<BackupJob> {
        self.inner.lock().backup_jobs.get(&backup_id).cloned()
    }

    async fn create_backup(&self, req: CreateBackupRequest) -> Result<BackupJob, RepositoryError> {
        if req.total_bytes == 0 {
            return Err(RepositoryError::InvalidInput("total_bytes must be > 0".into()));
        }

        let mut inner = self.inner.lock();

        let in_flight = inner.backup_jobs.values().any(|job| {
            job.vm_context_id == req.vm_context_id && job.disk_index == req.disk_index && job.status.is_in_flight()
        });
        if in_flight {
            return Err(RepositoryError::Conflict);
        }

        let key = (req.vm_context_id, req.disk_index, req.repository_id);
        let (parent_backup_id, prev_change_id) = match req.backup_type {
            BackupType::Full => (None, None),
            BackupType::Incremental => {
                let Some(chain) = inner.chains.get(&key).cloned() else {
                    return Err(RepositoryError::NoParent);
                };
                if chain.length >= inner.max_chain_depth {
                    return Err(RepositoryError::ChainFull);
                }
                let parent = inner
                    .backup_jobs
                    .get(&chain.latest_backup_id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::ChainInconsistent("missing chain tail row".into()))?;
                if parent.status != BackupStatus::Succeeded {
                    return Err(RepositoryError::ChainInconsistent("chain tail not succeeded".into()));
                }
                let Some(parent_change_id) = parent.new_change_id.clone() else {
                    return Err(RepositoryError::ChainInconsistent("chain tail has no change id".into()));
                };
                (Some(parent.id), Some(parent_change_id))
            }
        };

        let backup_id = BackupId::new();
        let now = Utc::now();
        let job = BackupJob {
            id: backup_id,
            vm_context_id: req.vm_context_id,
            disk_index: req.disk_index,
            repository_id: req.repository_id,
            policy_id: req.policy_id,
            backup_type: req.backup_type,
            status: BackupStatus::Pending,
            parent_backup_id,
            file_path: format!("fake://{backup_id}"),
            export_name: None,
            prev_change_id,
            new_change_id: None,
            total_bytes: req.total_bytes,
            bytes_transferred: 0,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        inner.backup_jobs.insert(backup_id, job.clone());
        Ok(job)
    }

    async fn mark_backup_started(&self, backup_id: BackupId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get_mut(&backup_id).ok_or(RepositoryError::NotFound)?;
        if !job.status.is_terminal() {
            job.status = BackupStatus::Running;
            job.started_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn assign_export_name(&self, backup_id: BackupId, export_name: String) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get_mut(&backup_id).ok_or(RepositoryError::NotFound)?;
        job.export_name = Some(export_name);
        Ok(())
    }

    async fn update_progress(&self, backup_id: BackupId, bytes_transferred: u64) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get_mut(&backup_id).ok_or(RepositoryError::NotFound)?;
        if !job.status.is_terminal() {
            job.bytes_transferred = bytes_transferred;
        }
        Ok(())
    }

    async fn finalize_backup(
        &self,
        backup_id: BackupId,
        new_change_id: String,
        bytes_transferred: u64,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Ok(());
        }

        let key = job.chain_key();
        let updated = BackupJob {
            status: BackupStatus::Succeeded,
            new_change_id: Some(new_change_id),
            bytes_transferred,
            completed_at: Some(Utc::now()),
            ..job
        };
        inner.backup_jobs.insert(backup_id, updated.clone());

        inner
            .chains
            .entry(key)
            .and_modify(|chain| {
                chain.latest_backup_id = backup_id;
                chain.length += 1;
            })
            .or_insert(BackupChain {
                vm_context_id: key.0,
                disk_index: key.1,
                repository_id: key.2,
                root_backup_id: backup_id,
                latest_backup_id: backup_id,
                length: 1,
            });

        Ok(())
    }

    async fn fail_backup(&self, backup_id: BackupId, error_message: String) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get_mut(&backup_id).ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.status = BackupStatus::Failed;
        job.error_message = Some(error_message);
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_backup(&self, backup_id: BackupId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock();
        let job = inner.backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;

        let is_tail = inner
            .chains
            .get(&job.chain_key())
            .map(|chain| chain.latest_backup_id == backup_id)
            .unwrap_or(false);
        if !is_tail && job.status != BackupStatus::Failed {
            return Err(RepositoryError::NotTail);
        }

        inner.backup_jobs.remove(&backup_id);
        Ok(())
    }
}
