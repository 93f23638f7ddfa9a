// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::VmContext;
use super::MaterializedState;
use crate::event::Event;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::VmContextCreated {
            vm_context_id,
            display_name,
            source_platform,
        } => {
            state.vm_contexts.entry(*vm_context_id).or_insert_with(|| VmContext {
                id: *vm_context_id,
                display_name: display_name.clone(),
                source_platform: source_platform.clone(),
            });
        }
        Event::VmContextDeleted { vm_context_id } => {
            state.vm_contexts.remove(vm_context_id);
            state.disks.retain(|(vmc, _), _| vmc != vm_context_id);
            state.backup_jobs.retain(|_, job| &job.vm_context_id != vm_context_id);
            state
                .backup_chains
                .retain(|(vmc, _, _), _| vmc != vm_context_id);
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "vm_context_tests.rs"]
mod tests;
