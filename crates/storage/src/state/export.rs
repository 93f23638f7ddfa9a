// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::ExportRow;
use super::MaterializedState;
use crate::event::Event;
use sendense_core::ExportState;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ExportCreated {
            export_id,
            export_name,
            backup_id,
            file_path,
            port,
            writable,
            created_at,
        } => {
            state.exports.entry(export_name.clone()).or_insert_with(|| ExportRow {
                id: *export_id,
                name: export_name.clone(),
                backup_id: *backup_id,
                file_path: file_path.clone(),
                port: *port,
                writable: *writable,
                state: ExportState::Pending,
                created_at: *created_at,
                updated_at: *created_at,
            });
        }
        Event::ExportActivated { export_name } => {
            if let Some(export) = state.exports.get_mut(export_name) {
                if export.state == ExportState::Pending {
                    export.state = ExportState::Active;
                }
            }
        }
        Event::ExportRetired { export_name } => {
            if let Some(export) = state.exports.get_mut(export_name) {
                export.state = ExportState::Retired;
            }
        }
        Event::ExportFailed { export_name, .. } => {
            if let Some(export) = state.exports.get_mut(export_name) {
                export.state = ExportState::Retired;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
