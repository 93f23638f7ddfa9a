// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::{BackupChain, BackupJob};
use super::MaterializedState;
use crate::event::Event;
use sendense_core::BackupStatus;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::BackupJobCreated {
            backup_id,
            vm_context_id,
            disk_index,
            repository_id,
            policy_id,
            backup_type,
            parent_backup_id,
            prev_change_id,
            total_bytes,
            file_path,
            export_name,
            created_at,
        } => {
            state.backup_jobs.entry(*backup_id).or_insert_with(|| BackupJob {
                id: *backup_id,
                vm_context_id: *vm_context_id,
                disk_index: *disk_index,
                repository_id: *repository_id,
                policy_id: policy_id.clone(),
                backup_type: *backup_type,
                status: BackupStatus::Pending,
                parent_backup_id: *parent_backup_id,
                file_path: file_path.clone(),
                export_name: export_name.clone(),
                prev_change_id: prev_change_id.clone(),
                new_change_id: None,
                total_bytes: *total_bytes,
                bytes_transferred: 0,
                error_message: None,
                created_at: *created_at,
                started_at: None,
                completed_at: None,
            });
        }

        Event::BackupJobStarted { backup_id, started_at } => {
            if let Some(job) = state.backup_jobs.get_mut(backup_id) {
                if job.status == BackupStatus::Pending {
                    job.status = BackupStatus::Running;
                    job.started_at = Some(*started_at);
                }
            }
        }

        Event::BackupJobExportAssigned { backup_id, export_name } => {
            if let Some(job) = state.backup_jobs.get_mut(backup_id) {
                job.export_name = Some(export_name.clone());
            }
        }

        Event::BackupJobProgressUpdated {
            backup_id,
            bytes_transferred,
        } => {
            if let Some(job) = state.backup_jobs.get_mut(backup_id) {
                job.bytes_transferred = *bytes_transferred;
            }
        }

        Event::BackupJobFinalized {
            backup_id,
            new_change_id,
            bytes_transferred,
            completed_at,
        } => {
            let Some(job) = state.backup_jobs.get_mut(backup_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }
            job.status = BackupStatus::Succeeded;
            job.new_change_id = Some(new_change_id.clone());
            job.bytes_transferred = *bytes_transferred;
            job.completed_at = Some(*completed_at);

            let chain_key = job.chain_key();
            let parent = job.parent_backup_id;
            let backup_id = job.id;
            extend_chain(state, chain_key, parent, backup_id);
        }

        Event::BackupJobFailed {
            backup_id,
            error_message,
            completed_at,
        } => {
            if let Some(job) = state.backup_jobs.get_mut(backup_id) {
                if !job.status.is_terminal() {
                    job.status = BackupStatus::Failed;
                    job.error_message = Some(error_message.clone());
                    job.completed_at = Some(*completed_at);
                }
            }
        }

        Event::BackupJobCancelled {
            backup_id,
            completed_at,
        } => {
            if let Some(job) = state.backup_jobs.get_mut(backup_id) {
                if !job.status.is_terminal() {
                    job.status = BackupStatus::Cancelled;
                    job.completed_at = Some(*completed_at);
                }
            }
        }

        Event::BackupJobDeleted { backup_id } => {
            let Some(job) = state.backup_jobs.remove(backup_id) else {
                return;
            };
            if job.status == BackupStatus::Succeeded {
                shrink_chain(state, job.chain_key(), job.id, job.parent_backup_id);
            }
        }

        _ => {}
    }
}

/// Extends the materialized chain view after a job succeeds: starts a new
/// root chain for a full backup, or appends to the existing chain for an
/// incremental.
fn extend_chain(
    state: &mut MaterializedState,
    chain_key: (sendense_core::VmContextId, sendense_core::DiskIndex, sendense_core::RepositoryId),
    parent_backup_id: Option<sendense_core::BackupId>,
    backup_id: sendense_core::BackupId,
) {
    match parent_backup_id {
        None => {
            state.backup_chains.entry(chain_key).or_insert(BackupChain {
                vm_context_id: chain_key.0,
                disk_index: chain_key.1,
                repository_id: chain_key.2,
                root_backup_id: backup_id,
                latest_backup_id: backup_id,
                length: 1,
            });
        }
        Some(_) => {
            if let Some(chain) = state.backup_chains.get_mut(&chain_key) {
                if chain.latest_backup_id != backup_id {
                    chain.latest_backup_id = backup_id;
                    chain.length += 1;
                }
            }
        }
    }
}

/// Reverses `extend_chain` when the tail job is deleted: only the tail (or
/// a failed job, which never reached the chain) can be deleted, so this
/// always pops exactly one link.
fn shrink_chain(
    state: &mut MaterializedState,
    chain_key: (sendense_core::VmContextId, sendense_core::DiskIndex, sendense_core::RepositoryId),
    deleted_backup_id: sendense_core::BackupId,
    parent_backup_id: Option<sendense_core::BackupId>,
) {
    let Some(chain) = state.backup_chains.get_mut(&chain_key) else {
        return;
    };
    if chain.latest_backup_id != deleted_backup_id {
        return;
    }
    match parent_backup_id {
        Some(parent) => {
            chain.latest_backup_id = parent;
            chain.length = chain.length.saturating_sub(1);
        }
        None => {
            state.backup_chains.remove(&chain_key);
        }
    }
}

#[cfg(test)]
#[path = "backup_job_tests.rs"]
mod tests;
