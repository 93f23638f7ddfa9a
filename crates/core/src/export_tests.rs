// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn only_retired_state_is_retired() {
    assert!(!ExportState::Pending.is_retired());
    assert!(!ExportState::Active.is_retired());
    assert!(ExportState::Retired.is_retired());
}

#[test]
fn export_state_serde_roundtrip() {
    for state in [ExportState::Pending, ExportState::Active, ExportState::Retired] {
        let json = serde_json::to_string(&state).unwrap();
        let back: ExportState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}

#[test]
fn export_state_rejects_unknown_value() {
    let result: Result<ExportState, _> = serde_json::from_str("\"expired\"");
    assert!(result.is_err());
}
