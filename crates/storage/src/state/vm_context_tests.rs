// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::MaterializedState;
use sendense_core::VmContextId;

#[test]
fn create_is_idempotent() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let event = Event::VmContextCreated {
        vm_context_id,
        display_name: "web-01".to_string(),
        source_platform: "vmware".to_string(),
    };
    apply(&mut state, &event);
    apply(&mut state, &event);
    assert_eq!(state.vm_contexts.len(), 1);
}

#[test]
fn delete_cascades_to_disks_and_jobs() {
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    apply(
        &mut state,
        &Event::VmContextCreated {
            vm_context_id,
            display_name: "web-01".to_string(),
            source_platform: "vmware".to_string(),
        },
    );
    state.disks.insert(
        (vm_context_id, sendense_core::DiskIndex::new(0)),
        crate::state::types::Disk {
            vm_context_id,
            disk_index: sendense_core::DiskIndex::new(0),
            size_bytes: 100,
            last_change_id_per_repo: Default::default(),
        },
    );

    apply(&mut state, &Event::VmContextDeleted { vm_context_id });

    assert!(state.vm_contexts.is_empty());
    assert!(state.disks.is_empty());
}
