// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub <-> capture agent control-plane wire contract. Shared
//! verbatim between [`crate::client::HttpAgentClient`] (caller) and
//! whatever `axum` handlers the hub mounts to receive telemetry pushes, so
//! the contract cannot drift between the two sides.

use sendense_core::{BackupId, BackupType, DiskIndex, VmContextId};
use serde::{Deserialize, Serialize};

/// `POST /replicate` (or `/backup/start`) request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StartBackupRequest {
    pub backup_id: BackupId,
    pub vm_display_name: String,
    pub vm_context_id: VmContextId,
    pub disk_index: DiskIndex,
    pub export_name: String,
    pub export_port: u16,
    pub backup_type: BackupType,
    #[serde(default)]
    pub previous_change_id: Option<String>,
}

/// Agent's acceptance state for a dispatched [`StartBackupRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartAcceptance {
    Started,
    Accepted,
}

/// `POST /replicate` response body on a `200`/`202`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StartBackupResponse {
    pub backup_id: BackupId,
    pub status: StartAcceptance,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
