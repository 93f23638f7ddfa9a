// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> ProgressRecord {
    ProgressRecord {
        stage: ProgressStage::Transfer,
        status: ProgressStatus::Streaming,
        total_bytes: 1024,
        bytes_transferred: 512,
        throughput_bytes_per_sec: 64,
        percent: 50.0,
        per_disk: vec![],
        change_id: None,
    }
}

#[test]
fn terminal_progress_statuses() {
    assert!(ProgressStatus::Succeeded.is_terminal());
    assert!(ProgressStatus::Failed.is_terminal());
    assert!(!ProgressStatus::Streaming.is_terminal());
    assert!(!ProgressStatus::Queued.is_terminal());
}

#[test]
fn clamp_percent_bounds_into_0_100() {
    let mut record = sample();
    record.percent = 150.0;
    record.clamp_percent();
    assert_eq!(record.percent, 100.0);

    record.percent = -5.0;
    record.clamp_percent();
    assert_eq!(record.percent, 0.0);
}

#[test]
fn progress_record_serde_roundtrip_with_missing_optional_fields() {
    let json = serde_json::json!({
        "stage": "snapshot",
        "status": "snapshotting",
        "total_bytes": 100,
        "bytes_transferred": 0,
        "throughput_bytes_per_sec": 0,
        "percent": 0.0,
    });
    let record: ProgressRecord = serde_json::from_value(json).unwrap();
    assert!(record.per_disk.is_empty());
    assert_eq!(record.change_id, None);
}

#[test]
fn per_disk_breakdown_preserves_disk_index() {
    let mut record = sample();
    record.per_disk.push(DiskProgress {
        disk_index: DiskIndex::new(0),
        total_bytes: 1024,
        bytes_transferred: 512,
    });
    let json = serde_json::to_string(&record).unwrap();
    let back: ProgressRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.per_disk[0].disk_index, DiskIndex::new(0));
}
