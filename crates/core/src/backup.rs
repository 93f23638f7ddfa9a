// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup job and chain domain types.

/// Whether a backup job is a full capture or an incremental on top of a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    Full,
    Incremental,
}

crate::simple_display! {
    BackupType {
        Full => "full",
        Incremental => "incremental",
    }
}

/// Status of a backup job, per the state machine in the orchestrator design.
///
/// `Succeeded` and `Failed` are terminal. There is no `Cancelled` transition
/// reachable yet (cancellation is reserved, not implemented), but the variant
/// is kept so the wire and storage representations don't need to change when
/// it is wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

crate::simple_display! {
    BackupStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl BackupStatus {
    /// Terminal statuses are immutable once set (data model invariant).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// True for the statuses that count against the "one in-flight job per
    /// (vm_context_id, disk_index)" invariant.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
