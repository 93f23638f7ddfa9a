// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::MaterializedState;
use sendense_core::VmContextId;
use tempfile::tempdir;

#[test]
fn write_then_load_roundtrips_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let mut state = MaterializedState::default();
    let vm_context_id = VmContextId::new();
    state.apply_event(&crate::event::Event::VmContextCreated {
        vm_context_id,
        display_name: "web-01".to_string(),
        source_platform: "vmware".to_string(),
    });

    let snapshot = Snapshot::new(7, state, Utc::now());
    write_snapshot(&path, &snapshot).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 7);
    assert!(loaded.state.vm_contexts.contains_key(&vm_context_id));
}

#[test]
fn load_missing_path_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.zst");
    assert!(load_snapshot(&path).unwrap().is_none());
}

#[test]
fn rewriting_rotates_previous_into_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let first = Snapshot::new(1, MaterializedState::default(), Utc::now());
    write_snapshot(&path, &first).unwrap();
    let second = Snapshot::new(2, MaterializedState::default(), Utc::now());
    write_snapshot(&path, &second).unwrap();

    assert!(path.with_extension("bak").exists());
    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 2);
}

#[test]
fn future_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    let mut snapshot = Snapshot::new(1, MaterializedState::default(), Utc::now());
    snapshot.version = CURRENT_SNAPSHOT_VERSION + 1;
    let result = write_snapshot(&path, &snapshot);
    assert!(result.is_err());
}
