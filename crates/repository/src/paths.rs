// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic on-disk image path layout.

use sendense_core::{BackupId, DiskIndex, VmContextId};
use std::path::{Path, PathBuf};

/// `<repo_root>/<vm_context_id>/<disk_index>/<backup_id>.img`
pub fn image_path(repo_root: &Path, vm_context_id: VmContextId, disk_index: DiskIndex, backup_id: BackupId) -> PathBuf {
    repo_root
        .join(vm_context_id.to_string())
        .join(disk_index.to_string())
        .join(format!("{backup_id}.img"))
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
