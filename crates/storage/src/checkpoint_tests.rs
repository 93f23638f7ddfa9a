// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::Event;
use sendense_core::VmContextId;
use tempfile::tempdir;

#[test]
fn checkpoint_then_load_restores_state_and_wal_is_truncated() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("wal.log");
    let snapshot_path = dir.path().join("snapshot.zst");

    let mut wal = Wal::open(&wal_path, 0).unwrap();
    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    let event = Event::VmContextCreated {
        vm_context_id,
        display_name: "web-01".to_string(),
        source_platform: "vmware".to_string(),
    };
    let seq = wal.append(&event).unwrap();
    state.apply_event(&event);
    wal.flush().unwrap();

    let checkpointer = Checkpointer::new(&snapshot_path);
    checkpointer.checkpoint(&state, seq, &mut wal).unwrap();

    assert!(wal.entries_after(0).unwrap().is_empty());

    let (restored_state, resume_seq) = checkpointer.load().unwrap();
    assert!(restored_state.vm_contexts.contains_key(&vm_context_id));
    assert_eq!(resume_seq, seq + 1);
}

#[test]
fn load_with_no_snapshot_yet_starts_fresh_at_seq_zero() {
    let dir = tempdir().unwrap();
    let checkpointer = Checkpointer::new(dir.path().join("snapshot.zst"));
    let (state, resume_seq) = checkpointer.load().unwrap();
    assert!(state.vm_contexts.is_empty());
    assert_eq!(resume_seq, 0);
}
