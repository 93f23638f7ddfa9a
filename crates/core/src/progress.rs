// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized progress record shared by the pull poller, the push endpoint,
//! and the progress sink.

use crate::ids::DiskIndex;

/// Phase of the capture pipeline a job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Discover,
    Snapshot,
    Prepare,
    Transfer,
    Finalize,
    Done,
}

crate::simple_display! {
    ProgressStage {
        Discover => "discover",
        Snapshot => "snapshot",
        Prepare => "prepare",
        Transfer => "transfer",
        Finalize => "finalize",
        Done => "done",
    }
}

/// Agent-reported status of an in-flight backup stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Queued,
    Preparing,
    Snapshotting,
    Streaming,
    Finalizing,
    Succeeded,
    Failed,
}

crate::simple_display! {
    ProgressStatus {
        Queued => "queued",
        Preparing => "preparing",
        Snapshotting => "snapshotting",
        Streaming => "streaming",
        Finalizing => "finalizing",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

impl ProgressStatus {
    /// Terminal statuses drive orchestrator finalization exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Per-disk progress breakdown for multi-disk VMs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiskProgress {
    pub disk_index: DiskIndex,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
}

/// Normalized progress record, shared by pull and push flavors of the
/// progress pipeline and by the orchestrator finalization path.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressRecord {
    pub stage: ProgressStage,
    pub status: ProgressStatus,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    pub throughput_bytes_per_sec: u64,
    pub percent: f64,
    #[serde(default)]
    pub per_disk: Vec<DiskProgress>,
    /// Populated once the snapshot stage completes.
    #[serde(default)]
    pub change_id: Option<String>,
}

impl ProgressRecord {
    /// Clamps `percent` into `[0, 100]`, matching `mark_job_progress`'s
    /// validation contract.
    pub fn clamp_percent(&mut self) {
        self.percent = self.percent.clamp(0.0, 100.0);
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
