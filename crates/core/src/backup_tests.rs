// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending = { BackupStatus::Pending, false },
    running = { BackupStatus::Running, false },
    succeeded = { BackupStatus::Succeeded, true },
    failed = { BackupStatus::Failed, true },
    cancelled = { BackupStatus::Cancelled, true },
)]
fn terminal_status_classification(status: BackupStatus, expected: bool) {
    assert_eq!(status.is_terminal(), expected);
}

#[parameterized(
    pending = { BackupStatus::Pending, true },
    running = { BackupStatus::Running, true },
    succeeded = { BackupStatus::Succeeded, false },
    failed = { BackupStatus::Failed, false },
    cancelled = { BackupStatus::Cancelled, false },
)]
fn in_flight_status_classification(status: BackupStatus, expected: bool) {
    assert_eq!(status.is_in_flight(), expected);
}

#[test]
fn backup_type_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&BackupType::Full).unwrap(), "\"full\"");
    assert_eq!(
        serde_json::to_string(&BackupType::Incremental).unwrap(),
        "\"incremental\""
    );
}

#[test]
fn backup_status_rejects_unknown_value() {
    let result: Result<BackupStatus, _> = serde_json::from_str("\"in_progress\"");
    assert!(result.is_err());
}

#[test]
fn backup_type_display_matches_wire_value() {
    assert_eq!(BackupType::Full.to_string(), "full");
    assert_eq!(BackupType::Incremental.to_string(), "incremental");
}
