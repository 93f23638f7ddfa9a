// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`ExportServiceApi`] for orchestrator-level tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sendense_core::{BackupId, BackupType, DiskIndex, ExportState, VmContextId};

use super::{export_name, ExportInfo, ExportServiceApi};
use crate::error::ExportError;

#[derive(Debug, Clone)]
struct FakeRow {
    backup_id: BackupId,
    file_path: String,
    state: ExportState,
}

#[derive(Default)]
pub struct FakeExportService {
    rows: Mutex<HashMap<String, FakeRow>>,
    fail_next_creates: Mutex<u32>,
    port: u16,
}

impl FakeExportService {
    pub fn new(port: u16) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail_next_creates: Mutex::new(0),
            port,
        }
    }

    pub fn fail_next_creates(&self, count: u32) {
        *self.fail_next_creates.lock() = count;
    }

    pub fn is_active(&self, export_name: &str) -> bool {
        self.rows.lock().get(export_name).map(|row| row.state == ExportState::Active).unwrap_or(false)
    }

    pub fn is_retired(&self, export_name: &str) -> bool {
        self.rows.lock().get(export_name).map(|row| row.state == ExportState::Retired).unwrap_or(true)
    }
}

#[async_trait]
impl ExportServiceApi for FakeExportService {
    async fn create_file_export(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        backup_id: BackupId,
        _backup_type: BackupType,
        absolute_file_path: &str,
        _writable: bool,
    ) -> Result<ExportInfo, ExportError> {
        {
            let mut fail = self.fail_next_creates.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(ExportError::ReloadFailed);
            }
        }

        let name = export_name(vm_context_id, disk_index, backup_id);
        self.rows.lock().insert(
            name.clone(),
            FakeRow {
                backup_id,
                file_path: absolute_file_path.to_string(),
                state: ExportState::Active,
            },
        );
        Ok(ExportInfo { name, port: self.port })
    }

    async fn remove_file_export(&self, export_name: &str) -> Result<(), ExportError> {
        if let Some(row) = self.rows.lock().get_mut(export_name) {
            row.state = ExportState::Retired;
        }
        Ok(())
    }

    async fn sync_exports_with_images(&self) {}
}
