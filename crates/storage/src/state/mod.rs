// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.

mod backup_job;
mod disk;
mod export;
mod helpers;
mod tracking;
mod types;
mod vm_context;

pub use types::{BackupChain, BackupJob, Disk, ExportRow, LogEvent, TrackerJob, TrackerStep, VmContext};

use crate::event::Event;
use sendense_core::{BackupId, DiskIndex, JobId, RepositoryId, StepId, VmContextId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State derived by replaying [`Event`]s in sequence order.
///
/// # Idempotency requirement
///
/// All event handlers (`vm_context::apply`, `disk::apply`, etc.) MUST be
/// idempotent: applying the same event twice must produce the same state as
/// applying it once. This matters because an event may be applied once for
/// immediate in-process visibility and again during WAL replay after a
/// restart. Guidelines:
/// - Use assignment (`=`), not mutation (`+=`), for anything derived.
/// - Guard inserts with `entry(..).or_insert_with(..)`.
/// - Guard terminal-status transitions with an `is_terminal()` check.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub vm_contexts: HashMap<VmContextId, VmContext>,
    pub disks: HashMap<(VmContextId, DiskIndex), Disk>,
    pub backup_jobs: HashMap<BackupId, BackupJob>,
    pub backup_chains: HashMap<(VmContextId, DiskIndex, RepositoryId), BackupChain>,
    pub exports: HashMap<String, ExportRow>,
    pub job_tracking: HashMap<JobId, TrackerJob>,
    pub job_steps: HashMap<StepId, TrackerStep>,
    /// Recent-activity log cache, not the durable source of truth (see
    /// `sendense_tracker`'s bounded channel + writer workers for that).
    #[serde(default)]
    pub recent_logs: HashMap<JobId, Vec<LogEvent>>,
}

impl MaterializedState {
    /// Looks up a backup job by exact ID or unique ID prefix.
    pub fn get_backup_job(&self, id: &str) -> Option<&BackupJob> {
        helpers::find_by_prefix(&self.backup_jobs, id)
    }

    /// Looks up a tracker job by exact ID or unique ID prefix.
    pub fn get_job_tracking(&self, id: &str) -> Option<&TrackerJob> {
        helpers::find_by_prefix(&self.job_tracking, id)
    }

    pub fn get_chain(
        &self,
        vm_context_id: VmContextId,
        disk_index: DiskIndex,
        repository_id: RepositoryId,
    ) -> Option<&BackupChain> {
        self.backup_chains.get(&(vm_context_id, disk_index, repository_id))
    }

    /// True if any job for `(vm_context_id, disk_index)` is pending or running
    /// — the conflict check behind the `Conflict` error.
    pub fn has_in_flight_job(&self, vm_context_id: VmContextId, disk_index: DiskIndex) -> bool {
        self.backup_jobs.values().any(|job| {
            job.vm_context_id == vm_context_id
                && job.disk_index == disk_index
                && job.status.is_in_flight()
        })
    }

    /// Applies `event`, deriving the resulting state change. See the
    /// idempotency requirement on [`MaterializedState`] itself.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::VmContextCreated { .. } | Event::VmContextDeleted { .. } => {
                vm_context::apply(self, event)
            }
            Event::DiskRegistered { .. } | Event::DiskChangeIdUpdated { .. } => {
                disk::apply(self, event)
            }
            Event::BackupJobCreated { .. }
            | Event::BackupJobStarted { .. }
            | Event::BackupJobProgressUpdated { .. }
            | Event::BackupJobFinalized { .. }
            | Event::BackupJobFailed { .. }
            | Event::BackupJobCancelled { .. }
            | Event::BackupJobDeleted { .. } => backup_job::apply(self, event),
            Event::ExportCreated { .. }
            | Event::ExportActivated { .. }
            | Event::ExportRetired { .. }
            | Event::ExportFailed { .. } => export::apply(self, event),
            Event::JobTrackingCreated { .. }
            | Event::JobTrackingProgress { .. }
            | Event::JobTrackingCompleted { .. }
            | Event::JobStepStarted { .. }
            | Event::JobStepCompleted { .. }
            | Event::LogEventRecorded { .. } => tracking::apply(self, event),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
