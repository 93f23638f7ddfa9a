// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::MaterializedState;
use chrono::Utc;
use sendense_core::{BackupId, BackupType, DiskIndex, RepositoryId, VmContextId};

fn created(
    backup_id: BackupId,
    vm_context_id: VmContextId,
    disk_index: DiskIndex,
    repository_id: RepositoryId,
    backup_type: BackupType,
    parent_backup_id: Option<BackupId>,
) -> Event {
    Event::BackupJobCreated {
        backup_id,
        vm_context_id,
        disk_index,
        repository_id,
        policy_id: None,
        backup_type,
        parent_backup_id,
        prev_change_id: None,
        total_bytes: 1024,
        file_path: "/repo/vm/0/b.img".to_string(),
        export_name: None,
        created_at: Utc::now(),
    }
}

#[test]
fn full_backup_finalization_creates_root_chain() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let backup_id = BackupId::new();

    apply(
        &mut state,
        &created(backup_id, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    apply(
        &mut state,
        &Event::BackupJobFinalized {
            backup_id,
            new_change_id: "cid-1".to_string(),
            bytes_transferred: 1024,
            completed_at: Utc::now(),
        },
    );

    let chain = &state.backup_chains[&(vm_context_id, disk_index, repository_id)];
    assert_eq!(chain.root_backup_id, backup_id);
    assert_eq!(chain.latest_backup_id, backup_id);
    assert_eq!(chain.length, 1);
    assert_eq!(
        state.backup_jobs[&backup_id].status,
        sendense_core::BackupStatus::Succeeded
    );
}

#[test]
fn incremental_finalization_extends_chain() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let root = BackupId::new();
    let child = BackupId::new();

    apply(
        &mut state,
        &created(root, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    apply(
        &mut state,
        &Event::BackupJobFinalized {
            backup_id: root,
            new_change_id: "cid-1".to_string(),
            bytes_transferred: 1024,
            completed_at: Utc::now(),
        },
    );
    apply(
        &mut state,
        &created(
            child,
            vm_context_id,
            disk_index,
            repository_id,
            BackupType::Incremental,
            Some(root),
        ),
    );
    apply(
        &mut state,
        &Event::BackupJobFinalized {
            backup_id: child,
            new_change_id: "cid-2".to_string(),
            bytes_transferred: 512,
            completed_at: Utc::now(),
        },
    );

    let chain = &state.backup_chains[&(vm_context_id, disk_index, repository_id)];
    assert_eq!(chain.root_backup_id, root);
    assert_eq!(chain.latest_backup_id, child);
    assert_eq!(chain.length, 2);
}

#[test]
fn finalization_is_idempotent_for_chain_mutation() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let backup_id = BackupId::new();

    apply(
        &mut state,
        &created(backup_id, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    let finalize = Event::BackupJobFinalized {
        backup_id,
        new_change_id: "cid-1".to_string(),
        bytes_transferred: 1024,
        completed_at: Utc::now(),
    };
    apply(&mut state, &finalize);
    apply(&mut state, &finalize);

    let chain = &state.backup_chains[&(vm_context_id, disk_index, repository_id)];
    assert_eq!(chain.length, 1);
}

#[test]
fn failed_job_does_not_touch_chain() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let backup_id = BackupId::new();

    apply(
        &mut state,
        &created(backup_id, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    apply(
        &mut state,
        &Event::BackupJobFailed {
            backup_id,
            error_message: "agent unreachable".to_string(),
            completed_at: Utc::now(),
        },
    );

    assert!(!state.backup_chains.contains_key(&(vm_context_id, disk_index, repository_id)));
    assert_eq!(
        state.backup_jobs[&backup_id].status,
        sendense_core::BackupStatus::Failed
    );
}

#[test]
fn deleting_tail_advances_latest_to_parent() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let root = BackupId::new();
    let child = BackupId::new();

    for (id, parent, t) in [
        (root, None, BackupType::Full),
        (child, Some(root), BackupType::Incremental),
    ] {
        apply(&mut state, &created(id, vm_context_id, disk_index, repository_id, t, parent));
        apply(
            &mut state,
            &Event::BackupJobFinalized {
                backup_id: id,
                new_change_id: format!("cid-{id}"),
                bytes_transferred: 10,
                completed_at: Utc::now(),
            },
        );
    }

    apply(&mut state, &Event::BackupJobDeleted { backup_id: child });

    let chain = &state.backup_chains[&(vm_context_id, disk_index, repository_id)];
    assert_eq!(chain.latest_backup_id, root);
    assert_eq!(chain.length, 1);
}

#[test]
fn deleting_only_root_removes_chain_entirely() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let root = BackupId::new();

    apply(
        &mut state,
        &created(root, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    apply(
        &mut state,
        &Event::BackupJobFinalized {
            backup_id: root,
            new_change_id: "cid-1".to_string(),
            bytes_transferred: 10,
            completed_at: Utc::now(),
        },
    );

    apply(&mut state, &Event::BackupJobDeleted { backup_id: root });

    assert!(!state.backup_chains.contains_key(&(vm_context_id, disk_index, repository_id)));
}

#[test]
fn export_assigned_records_name_on_the_job_row() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let disk_index = DiskIndex::new(0);
    let repository_id = RepositoryId::new();
    let backup_id = BackupId::new();

    apply(
        &mut state,
        &created(backup_id, vm_context_id, disk_index, repository_id, BackupType::Full, None),
    );
    assert_eq!(state.backup_jobs[&backup_id].export_name, None);

    apply(
        &mut state,
        &Event::BackupJobExportAssigned {
            backup_id,
            export_name: "backup-vmc-disk0-abcd1234".to_string(),
        },
    );

    assert_eq!(
        state.backup_jobs[&backup_id].export_name,
        Some("backup-vmc-disk0-abcd1234".to_string())
    );
}
