// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Export state domain type.

/// Lifecycle state of a published block export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Pending,
    Active,
    Retired,
}

crate::simple_display! {
    ExportState {
        Pending => "pending",
        Active => "active",
        Retired => "retired",
    }
}

impl ExportState {
    /// `remove_file_export` on an already-retired export is a no-op, not an error.
    pub fn is_retired(&self) -> bool {
        matches!(self, Self::Retired)
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
