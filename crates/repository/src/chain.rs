// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository & Chain Manager: allocates image files,
//! maintains parent/child linkage, and exposes chain queries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use sendense_core::{BackupId, BackupStatus, BackupType, DiskIndex, RepositoryId, VmContextId};
use sendense_storage::event::Event;
use sendense_storage::state::{BackupChain, BackupJob};
use sendense_storage::{MaterializedState, Wal};
use tokio::sync::Mutex as AsyncMutex;

use crate::capability::Repository;
use crate::error::RepositoryError;
use crate::paths;

/// Inputs to [`ChainManagerApi::create_backup`].
#[derive(Debug, Clone)]
pub struct CreateBackupRequest {
    pub vm_context_id: VmContextId,
    pub disk_index: DiskIndex,
    pub repository_id: RepositoryId,
    pub backup_type: BackupType,
    pub policy_id: Option<String>,
    pub previous_change_id: Option<String>,
    pub total_bytes: u64,
}

/// Chain manager's view of a registered repository: the capability driver
/// plus the root used to compute the deterministic image path layout. Only
/// local-filesystem repositories carry a meaningful root today; object and
/// network-share kinds have no driver in this workspace.
pub struct RepositoryHandle {
    pub driver: Arc<dyn Repository>,
    pub root: PathBuf,
}

/// Async API the orchestrator depends on (trait object, never the concrete
/// [`ChainManager`]) so its tests can substitute an in-memory fake.
#[async_trait]
pub trait ChainManagerApi: Send + Sync {
    async fn get_chain(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
    ) -> Option<BackupChain>;

    async fn get_backup(&self, backup_id: BackupId) -> Option<BackupJob>;

    async fn create_backup(&self, req: CreateBackupRequest) -> Result<BackupJob, RepositoryError>;

    /// Marks a `pending` job `running` once the agent dispatch has
    /// succeeded.
    async fn mark_backup_started(&self, backup_id: BackupId) -> Result<(), RepositoryError>;

    /// Records the export name assigned to `backup_id`'s published export
    /// onto the persisted job row, so finalization and restart-time
    /// reconciliation can retire it by stored name rather than recomputing
    /// it.
    async fn assign_export_name(&self, backup_id: BackupId, export_name: String) -> Result<(), RepositoryError>;

    /// Persists an in-flight byte count (throttled progress writes land
    /// here). A no-op if the job is already terminal.
    async fn update_progress(&self, backup_id: BackupId, bytes_transferred: u64) -> Result<(), RepositoryError>;

    async fn finalize_backup(
        &self,
        backup_id: BackupId,
        new_change_id: String,
        bytes_transferred: u64,
    ) -> Result<(), RepositoryError>;

    async fn fail_backup(&self, backup_id: BackupId, error_message: String) -> Result<(), RepositoryError>;

    async fn delete_backup(&self, backup_id: BackupId) -> Result<(), RepositoryError>;
}

/// Production chain manager: a shared [`MaterializedState`] + [`Wal`] pair
/// (same shape `sendense_tracker::WalBackedStore` uses), a registry of
/// repository drivers, and a per-`(vm, disk, repo)` async-mutex map enforcing
/// serialized chain mutations.
pub struct ChainManager {
    state: Arc<SyncMutex<MaterializedState>>,
    wal: Arc<SyncMutex<Wal>>,
    repos: HashMap<RepositoryId, RepositoryHandle>,
    chain_locks: SyncMutex<HashMap<(VmContextId, DiskIndex, RepositoryId), Arc<AsyncMutex<()>>>>,
    max_chain_depth: u32,
    orphan_images: SyncMutex<Vec<String>>,
    min_free_bytes_hard: u64,
}

impl ChainManager {
    pub fn new(
        state: Arc<SyncMutex<MaterializedState>>,
        wal: Arc<SyncMutex<Wal>>,
        repos: HashMap<RepositoryId, RepositoryHandle>,
        max_chain_depth: u32,
    ) -> Self {
        Self {
            state,
            wal,
            repos,
            chain_locks: SyncMutex::new(HashMap::new()),
            max_chain_depth,
            orphan_images: SyncMutex::new(Vec::new()),
            min_free_bytes_hard: 0,
        }
    }

    /// Rejects `create_backup` with `RepositoryUnavailable` once a repository's
    /// free space drops below `bytes` (the hard floor). `0` (the
    /// default) disables the check.
    pub fn with_min_free_bytes_hard(mut self, bytes: u64) -> Self {
        self.min_free_bytes_hard = bytes;
        self
    }

    /// Image paths whose deletion failed after a `fail_backup`/`delete_backup`
    /// call — surfaced to an operator reconciliation task.
    pub fn orphan_images(&self) -> Vec<String> {
        self.orphan_images.lock().clone()
    }

    async fn lock_for(&self, key: (VmContextId, DiskIndex, RepositoryId)) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.chain_locks.lock();
            locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        mutex.lock_owned().await
    }

    fn record(&self, event: Event) {
        let mut state = self.state.lock();
        state.apply_event(&event);
        drop(state);
        let mut wal = self.wal.lock();
        if let Err(error) = wal.append(&event) {
            tracing::error!(%error, kind = event.kind(), "chain manager WAL append failed");
            return;
        }
        if wal.needs_flush() {
            if let Err(error) = wal.flush() {
                tracing::error!(%error, "chain manager WAL flush failed");
            }
        }
    }

    fn handle(&self, repository_id: RepositoryId) -> Result<&RepositoryHandle, RepositoryError> {
        self.repos
            .get(&repository_id)
            .ok_or_else(|| RepositoryError::RepositoryUnavailable(format!("unknown repository {repository_id}")))
    }
}

#[async_trait]
impl ChainManagerApi for ChainManager {
    async fn get_chain(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
    ) -> Option<BackupChain> {
        self.state.lock().get_chain(vm_context_id, disk_index, repository_id).cloned()
    }

    async fn get_backup(&self, backup_id: BackupId) -> Option<BackupJob> {
        self.state.lock().backup_jobs.get(&backup_id).cloned()
    }

    async fn create_backup(&self, req: CreateBackupRequest) -> Result<BackupJob, RepositoryError> {
        if req.total_bytes == 0 {
            return Err(RepositoryError::InvalidInput("total_bytes must be > 0".into()));
        }

        let key = (req.vm_context_id, req.disk_index, req.repository_id);
        let _guard = self.lock_for(key).await;

        if self.state.lock().has_in_flight_job(req.vm_context_id, req.disk_index) {
            return Err(RepositoryError::Conflict);
        }

        let handle = self.handle(req.repository_id)?;
        handle.driver.test_writable().await.map_err(|e| RepositoryError::RepositoryUnavailable(e.to_string()))?;

        if self.min_free_bytes_hard > 0 {
            let free = handle.driver.free_bytes().await.map_err(|e| RepositoryError::RepositoryUnavailable(e.to_string()))?;
            if free < self.min_free_bytes_hard {
                return Err(RepositoryError::RepositoryUnavailable(format!(
                    "only {free} bytes free, below the configured {} byte floor",
                    self.min_free_bytes_hard
                )));
            }
        }

        let (parent_backup_id, prev_change_id, backing_path) = match req.backup_type {
            BackupType::Full => (None, None, None),
            BackupType::Incremental => {
                let chain = self.state.lock().get_chain(req.vm_context_id, req.disk_index, req.repository_id).cloned();
                let Some(chain) = chain else {
                    return Err(RepositoryError::NoParent);
                };
                if chain.length >= self.max_chain_depth {
                    return Err(RepositoryError::ChainFull);
                }
                let parent = self
                    .state
                    .lock()
                    .backup_jobs
                    .get(&chain.latest_backup_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::ChainInconsistent(format!("latest_backup_id {} has no row", chain.latest_backup_id))
                    })?;
                if parent.status != BackupStatus::Succeeded {
                    return Err(RepositoryError::ChainInconsistent(format!(
                        "chain tail {} is not succeeded",
                        parent.id
                    )));
                }
                let Some(parent_change_id) = parent.new_change_id.clone() else {
                    return Err(RepositoryError::ChainInconsistent(format!(
                        "chain tail {} has no change id",
                        parent.id
                    )));
                };
                (Some(parent.id), Some(parent_change_id), Some(parent.file_path.clone()))
            }
        };

        let backup_id = BackupId::new();
        let file_path = paths::image_path(&handle.root, req.vm_context_id, req.disk_index, backup_id);
        let file_path_str = file_path.to_string_lossy().into_owned();

        handle
            .driver
            .create_image(&file_path_str, backing_path.as_deref(), req.total_bytes)
            .await
            .map_err(RepositoryError::Driver)?;

        self.record(Event::BackupJobCreated {
            backup_id,
            vm_context_id: req.vm_context_id,
            disk_index: req.disk_index,
            repository_id: req.repository_id,
            policy_id: req.policy_id,
            backup_type: req.backup_type,
            parent_backup_id,
            prev_change_id,
            total_bytes: req.total_bytes,
            file_path: file_path_str,
            export_name: None,
            created_at: Utc::now(),
        });

        self.state
            .lock()
            .backup_jobs
            .get(&backup_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn mark_backup_started(&self, backup_id: BackupId) -> Result<(), RepositoryError> {
        if self.state.lock().backup_jobs.get(&backup_id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.record(Event::BackupJobStarted {
            backup_id,
            started_at: Utc::now(),
        });
        Ok(())
    }

    async fn assign_export_name(&self, backup_id: BackupId, export_name: String) -> Result<(), RepositoryError> {
        if self.state.lock().backup_jobs.get(&backup_id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.record(Event::BackupJobExportAssigned { backup_id, export_name });
        Ok(())
    }

    async fn update_progress(&self, backup_id: BackupId, bytes_transferred: u64) -> Result<(), RepositoryError> {
        let job = self.state.lock().backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.record(Event::BackupJobProgressUpdated {
            backup_id,
            bytes_transferred,
        });
        Ok(())
    }

    async fn finalize_backup(
        &self,
        backup_id: BackupId,
        new_change_id: String,
        bytes_transferred: u64,
    ) -> Result<(), RepositoryError> {
        let job = self.state.lock().backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.record(Event::BackupJobFinalized {
            backup_id,
            new_change_id: new_change_id.clone(),
            bytes_transferred,
            completed_at: Utc::now(),
        });
        self.record(Event::DiskChangeIdUpdated {
            vm_context_id: job.vm_context_id,
            disk_index: job.disk_index,
            repository_id: job.repository_id,
            change_id: new_change_id,
        });
        Ok(())
    }

    async fn fail_backup(&self, backup_id: BackupId, error_message: String) -> Result<(), RepositoryError> {
        let job = self.state.lock().backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.record(Event::BackupJobFailed {
            backup_id,
            error_message,
            completed_at: Utc::now(),
        });
        if let Ok(handle) = self.handle(job.repository_id) {
            if let Err(error) = handle.driver.delete_image(&job.file_path).await {
                tracing::error!(%error, path = %job.file_path, "failed to delete image for failed backup, flagging orphan");
                self.orphan_images.lock().push(job.file_path.clone());
            }
        }
        Ok(())
    }

    async fn delete_backup(&self, backup_id: BackupId) -> Result<(), RepositoryError> {
        let job = self.state.lock().backup_jobs.get(&backup_id).cloned().ok_or(RepositoryError::NotFound)?;

        let is_tail = self
            .state
            .lock()
            .get_chain(job.vm_context_id, job.disk_index, job.repository_id)
            .map(|chain| chain.latest_backup_id == backup_id)
            .unwrap_or(false);
        if !is_tail && job.status != BackupStatus::Failed {
            return Err(RepositoryError::NotTail);
        }

        if let Ok(handle) = self.handle(job.repository_id) {
            if let Err(error) = handle.driver.delete_image(&job.file_path).await {
                tracing::error!(%error, path = %job.file_path, "failed to delete image on backup deletion, flagging orphan");
                self.orphan_images.lock().push(job.file_path.clone());
            }
        }

        self.record(Event::BackupJobDeleted { backup_id });
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "chain_proptests.rs"]
mod proptests;
