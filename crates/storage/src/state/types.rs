// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity rows held in [`super::MaterializedState`].

use chrono::{DateTime, Utc};
use sendense_core::{
    BackupId, BackupStatus, BackupType, DiskIndex, ExportId, ExportState, JobId, LogLevel,
    RepositoryId, StepId, TrackerStatus, VmContextId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmContext {
    pub id: VmContextId,
    pub display_name: String,
    pub source_platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub vm_context_id: VmContextId,
    pub disk_index: DiskIndex,
    pub size_bytes: u64,
    /// Last successful change-tracking identifier, per target repository.
    #[serde(default)]
    pub last_change_id_per_repo: HashMap<RepositoryId, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: BackupId,
    pub vm_context_id: VmContextId,
    pub disk_index: DiskIndex,
    pub repository_id: RepositoryId,
    pub policy_id: Option<String>,
    pub backup_type: BackupType,
    pub status: BackupStatus,
    pub parent_backup_id: Option<BackupId>,
    pub file_path: String,
    pub export_name: Option<String>,
    pub prev_change_id: Option<String>,
    pub new_change_id: Option<String>,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BackupJob {
    pub fn chain_key(&self) -> (VmContextId, DiskIndex, RepositoryId) {
        (self.vm_context_id, self.disk_index, self.repository_id)
    }
}

/// Derived from backup jobs, materialized for fast reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupChain {
    pub vm_context_id: VmContextId,
    pub disk_index: DiskIndex,
    pub repository_id: RepositoryId,
    pub root_backup_id: BackupId,
    pub latest_backup_id: BackupId,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: ExportId,
    pub name: String,
    pub backup_id: BackupId,
    pub file_path: String,
    pub port: u16,
    pub writable: bool,
    pub state: ExportState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerJob {
    pub id: JobId,
    pub parent_id: Option<JobId>,
    pub job_type: String,
    pub operation: String,
    pub owner: Option<String>,
    pub status: TrackerStatus,
    /// Manual coarse progress set via `mark_job_progress`, if any.
    pub percent: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerStep {
    pub id: StepId,
    pub job_id: JobId,
    pub seq: u32,
    pub name: String,
    pub status: TrackerStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub job_id: Option<JobId>,
    pub step_id: Option<StepId>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    pub emitted_at: DateTime<Utc>,
}
