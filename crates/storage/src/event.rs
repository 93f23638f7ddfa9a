// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted events. Everything in [`MaterializedState`](crate::state::MaterializedState)
//! is derived by replaying these against an empty state in sequence order.
//!
//! Handlers in `state::*` that apply these must be idempotent: the daemon may
//! apply an event once for immediate visibility and again during WAL replay.

use chrono::{DateTime, Utc};
use sendense_core::{BackupId, BackupType, DiskIndex, ExportId, JobId, LogLevel, RepositoryId, StepId, TrackerStatus, VmContextId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "vm_context:created")]
    VmContextCreated {
        vm_context_id: VmContextId,
        display_name: String,
        source_platform: String,
    },
    #[serde(rename = "vm_context:deleted")]
    VmContextDeleted { vm_context_id: VmContextId },

    #[serde(rename = "disk:registered")]
    DiskRegistered {
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        size_bytes: u64,
    },
    #[serde(rename = "disk:change_id_updated")]
    DiskChangeIdUpdated {
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
        change_id: String,
    },

    #[serde(rename = "backup_job:created")]
    BackupJobCreated {
        backup_id: BackupId,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
        policy_id: Option<String>,
        backup_type: BackupType,
        parent_backup_id: Option<BackupId>,
        prev_change_id: Option<String>,
        total_bytes: u64,
        file_path: String,
        export_name: Option<String>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "backup_job:started")]
    BackupJobStarted {
        backup_id: BackupId,
        started_at: DateTime<Utc>,
    },
    #[serde(rename = "backup_job:export_assigned")]
    BackupJobExportAssigned {
        backup_id: BackupId,
        export_name: String,
    },
    #[serde(rename = "backup_job:progress_updated")]
    BackupJobProgressUpdated {
        backup_id: BackupId,
        bytes_transferred: u64,
    },
    #[serde(rename = "backup_job:finalized")]
    BackupJobFinalized {
        backup_id: BackupId,
        new_change_id: String,
        bytes_transferred: u64,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename = "backup_job:failed")]
    BackupJobFailed {
        backup_id: BackupId,
        error_message: String,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename = "backup_job:cancelled")]
    BackupJobCancelled {
        backup_id: BackupId,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename = "backup_job:deleted")]
    BackupJobDeleted { backup_id: BackupId },

    #[serde(rename = "export:created")]
    ExportCreated {
        export_id: ExportId,
        export_name: String,
        backup_id: BackupId,
        file_path: String,
        port: u16,
        writable: bool,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "export:activated")]
    ExportActivated { export_name: String },
    #[serde(rename = "export:retired")]
    ExportRetired { export_name: String },
    #[serde(rename = "export:failed")]
    ExportFailed { export_name: String, reason: String },

    #[serde(rename = "job_tracking:created")]
    JobTrackingCreated {
        job_id: JobId,
        parent_id: Option<JobId>,
        job_type: String,
        operation: String,
        owner: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, String>,
        started_at: DateTime<Utc>,
    },
    #[serde(rename = "job_tracking:progress")]
    JobTrackingProgress { job_id: JobId, percent: f64 },
    #[serde(rename = "job_tracking:completed")]
    JobTrackingCompleted {
        job_id: JobId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    },

    #[serde(rename = "job_step:started")]
    JobStepStarted {
        step_id: StepId,
        job_id: JobId,
        seq: u32,
        name: String,
        started_at: DateTime<Utc>,
    },
    #[serde(rename = "job_step:completed")]
    JobStepCompleted {
        step_id: StepId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    },

    #[serde(rename = "log_event:recorded")]
    LogEventRecorded {
        job_id: Option<JobId>,
        step_id: Option<StepId>,
        level: LogLevel,
        message: String,
        #[serde(default)]
        attrs: HashMap<String, String>,
        emitted_at: DateTime<Utc>,
    },
}

impl Event {
    /// A short, stable label for logging — matches the `#[serde(rename)]` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VmContextCreated { .. } => "vm_context:created",
            Self::VmContextDeleted { .. } => "vm_context:deleted",
            Self::DiskRegistered { .. } => "disk:registered",
            Self::DiskChangeIdUpdated { .. } => "disk:change_id_updated",
            Self::BackupJobCreated { .. } => "backup_job:created",
            Self::BackupJobStarted { .. } => "backup_job:started",
            Self::BackupJobExportAssigned { .. } => "backup_job:export_assigned",
            Self::BackupJobProgressUpdated { .. } => "backup_job:progress_updated",
            Self::BackupJobFinalized { .. } => "backup_job:finalized",
            Self::BackupJobFailed { .. } => "backup_job:failed",
            Self::BackupJobCancelled { .. } => "backup_job:cancelled",
            Self::BackupJobDeleted { .. } => "backup_job:deleted",
            Self::ExportCreated { .. } => "export:created",
            Self::ExportActivated { .. } => "export:activated",
            Self::ExportRetired { .. } => "export:retired",
            Self::ExportFailed { .. } => "export:failed",
            Self::JobTrackingCreated { .. } => "job_tracking:created",
            Self::JobTrackingProgress { .. } => "job_tracking:progress",
            Self::JobTrackingCompleted { .. } => "job_tracking:completed",
            Self::JobStepStarted { .. } => "job_step:started",
            Self::JobStepCompleted { .. } => "job_step:completed",
            Self::LogEventRecorded { .. } => "log_event:recorded",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
