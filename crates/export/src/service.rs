// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Export Service: publishes and retracts file-backed block
//! exports, serialized behind a process-wide mutex so two concurrent
//! `create_file_export` calls never leave the on-disk export table
//! half-written.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use sendense_core::{BackupId, BackupType, DiskIndex, ExportId, VmContextId};
use sendense_storage::event::Event;
use sendense_storage::state::ExportRow;
use sendense_storage::{MaterializedState, Wal};
use tokio::sync::Mutex as AsyncMutex;

use crate::capability::{ExportDaemon, ExportFragment};
use crate::error::ExportError;

/// Bound on the backoff before a single reload retry.
const RELOAD_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Default shared listen port for published exports — NBD's IANA-assigned
/// port.
pub const DEFAULT_EXPORT_PORT: u16 = 10809;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    pub name: String,
    pub port: u16,
}

/// Async API the orchestrator depends on as a trait object (mirrors
/// `sendense_repository::ChainManagerApi`).
#[async_trait]
pub trait ExportServiceApi: Send + Sync {
    async fn create_file_export(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        backup_id: BackupId,
        backup_type: BackupType,
        absolute_file_path: &str,
        writable: bool,
    ) -> Result<ExportInfo, ExportError>;

    async fn remove_file_export(&self, export_name: &str) -> Result<(), ExportError>;

    async fn sync_exports_with_images(&self);
}

/// `export_name = "backup-" + vm_context_id + "-disk" + disk_index + "-" + short(backup_id)`.
/// `backup_type` does not affect the name — kept as a parameter because
/// fulls and incrementals both publish writable exports through the same
/// call path.
fn export_name(vm_context_id: VmContextId, disk_index: DiskIndex, backup_id: BackupId) -> String {
    format!("backup-{vm_context_id}-disk{disk_index}-{}", backup_id.short(8))
}

pub struct ExportService<D> {
    daemon: Arc<D>,
    state: Arc<SyncMutex<MaterializedState>>,
    wal: Arc<SyncMutex<Wal>>,
    reload_lock: AsyncMutex<()>,
    port: u16,
}

impl<D: ExportDaemon> ExportService<D> {
    pub fn new(daemon: Arc<D>, state: Arc<SyncMutex<MaterializedState>>, wal: Arc<SyncMutex<Wal>>, port: u16) -> Self {
        Self {
            daemon,
            state,
            wal,
            reload_lock: AsyncMutex::new(()),
            port,
        }
    }

    fn record(&self, event: Event) {
        let mut state = self.state.lock();
        state.apply_event(&event);
        drop(state);
        let mut wal = self.wal.lock();
        if let Err(error) = wal.append(&event) {
            tracing::error!(%error, kind = event.kind(), "export service WAL append failed");
            return;
        }
        if wal.needs_flush() {
            if let Err(error) = wal.flush() {
                tracing::error!(%error, "export service WAL flush failed");
            }
        }
    }

    async fn reload_with_retry(&self) -> Result<(), ExportError> {
        if self.daemon.reload().await.is_ok() {
            return Ok(());
        }
        tracing::warn!("export daemon reload failed, retrying once");
        tokio::time::sleep(RELOAD_RETRY_BACKOFF).await;
        self.daemon.reload().await.map_err(|_| ExportError::ReloadFailed)
    }
}

#[async_trait]
impl<D: ExportDaemon> ExportServiceApi for ExportService<D> {
    async fn create_file_export(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        backup_id: BackupId,
        _backup_type: BackupType,
        absolute_file_path: &str,
        writable: bool,
    ) -> Result<ExportInfo, ExportError> {
        if !Path::new(absolute_file_path).is_absolute() {
            return Err(ExportError::PathNotAbsolute(absolute_file_path.to_string()));
        }

        let _guard = self.reload_lock.lock().await;

        tokio::fs::metadata(absolute_file_path)
            .await
            .map_err(|_| ExportError::PathNotReadable(absolute_file_path.to_string()))?;

        let name = export_name(vm_context_id, disk_index, backup_id);
        let export_id = ExportId::new();
        let now = Utc::now();

        self.record(Event::ExportCreated {
            export_id,
            export_name: name.clone(),
            backup_id,
            file_path: absolute_file_path.to_string(),
            port: self.port,
            writable,
            created_at: now,
        });

        let fragment = ExportFragment {
            export_name: name.clone(),
            file_path: absolute_file_path.to_string(),
            writable,
            port: self.port,
        };
        self.daemon.write_fragment(&fragment).await.map_err(ExportError::Daemon)?;

        match self.reload_with_retry().await {
            Ok(()) => {
                self.record(Event::ExportActivated {
                    export_name: name.clone(),
                });
                Ok(ExportInfo { name, port: self.port })
            }
            Err(error) => {
                self.record(Event::ExportFailed {
                    export_name: name,
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn remove_file_export(&self, export_name: &str) -> Result<(), ExportError> {
        let already_retired = self
            .state
            .lock()
            .exports
            .get(export_name)
            .map(|row| row.state.is_retired())
            .unwrap_or(true);
        if already_retired {
            return Ok(());
        }

        let _guard = self.reload_lock.lock().await;

        self.daemon.remove_fragment(export_name).await.map_err(ExportError::Daemon)?;
        let _ = self.reload_with_retry().await;

        self.record(Event::ExportRetired {
            export_name: export_name.to_string(),
        });
        Ok(())
    }

    async fn sync_exports_with_images(&self) {
        let rows: Vec<ExportRow> = self.state.lock().exports.values().cloned().collect();
        for row in rows {
            if row.state.is_retired() {
                continue;
            }
            let backup_still_live = self.state.lock().backup_jobs.contains_key(&row.backup_id);
            if !backup_still_live {
                self.record(Event::ExportRetired {
                    export_name: row.name.clone(),
                });
                continue;
            }
            let image_path = self.state.lock().backup_jobs.get(&row.backup_id).map(|job| job.file_path.clone());
            if image_path.as_deref() != Some(row.file_path.as_str()) {
                self.record(Event::ExportFailed {
                    export_name: row.name.clone(),
                    reason: "export file path diverged from backing image path".to_string(),
                });
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
