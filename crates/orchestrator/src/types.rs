// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/result contracts for [`crate::orchestrator::Orchestrator::start_backup`].

use chrono::{DateTime, Utc};
use sendense_core::{BackupId, BackupStatus, BackupType, DiskIndex, RepositoryId, VmContextId};

/// Inputs to `start_backup`. `policy_id` and `tags` are opaque passthroughs
/// the orchestrator never inspects.
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub vm_context_id: VmContextId,
    pub vm_display_name: String,
    pub disk_index: DiskIndex,
    pub repository_id: RepositoryId,
    pub backup_type: BackupType,
    pub total_bytes: u64,
    pub previous_change_id: Option<String>,
    pub policy_id: Option<String>,
    #[allow(dead_code)]
    pub tags: Vec<String>,
}

/// Result row returned to the caller once dispatch succeeds. `status` is
/// `Running` at return time; finalization (to `Succeeded`/`Failed`) happens
/// asynchronously and is observed by re-reading the backup job.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupResult {
    pub backup_id: BackupId,
    pub status: BackupStatus,
    pub file_path: String,
    pub export_name: String,
    pub total_bytes: u64,
    pub change_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
