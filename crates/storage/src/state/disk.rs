// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::Disk;
use super::MaterializedState;
use crate::event::Event;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::DiskRegistered {
            vm_context_id,
            disk_index,
            size_bytes,
        } => {
            state
                .disks
                .entry((*vm_context_id, *disk_index))
                .or_insert_with(|| Disk {
                    vm_context_id: *vm_context_id,
                    disk_index: *disk_index,
                    size_bytes: *size_bytes,
                    last_change_id_per_repo: Default::default(),
                });
        }
        Event::DiskChangeIdUpdated {
            vm_context_id,
            disk_index,
            repository_id,
            change_id,
        } => {
            if let Some(disk) = state.disks.get_mut(&(*vm_context_id, *disk_index)) {
                disk.last_change_id_per_repo
                    .insert(*repository_id, change_id.clone());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
