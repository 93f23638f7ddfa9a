// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic snapshot + WAL truncation.
//!
//! [`Checkpointer`] itself is synchronous and has no opinion on scheduling —
//! the hub binary drives it from a `tokio::time::interval` loop. Keeping it
//! synchronous means it can also be called directly from tests and from a
//! graceful-shutdown path without spinning up a runtime.

use crate::snapshot::{self, Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Snapshots `state` at `state_seq` to `snapshot_path` and truncates `wal` up
/// to and including `state_seq`.
///
/// `state_seq` must be the sequence number of the last WAL entry folded into
/// `state` — truncating any earlier would lose durable history that hasn't
/// been captured by the snapshot yet.
pub struct Checkpointer {
    snapshot_path: PathBuf,
}

impl Checkpointer {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn checkpoint(
        &self,
        state: &MaterializedState,
        state_seq: u64,
        wal: &mut Wal,
    ) -> Result<(), CheckpointError> {
        let snapshot = Snapshot::new(state_seq, state.clone(), Utc::now());
        snapshot::write_snapshot(&self.snapshot_path, &snapshot)?;
        wal.truncate_before(state_seq)?;
        wal.mark_processed(state_seq);
        tracing::info!(seq = state_seq, "checkpoint written");
        Ok(())
    }

    /// Loads the most recent snapshot, if any, returning the state and the
    /// sequence number the caller should open the WAL at (`seq + 1`, or `0`
    /// if there is no snapshot yet).
    pub fn load(&self) -> Result<(MaterializedState, u64), CheckpointError> {
        match snapshot::load_snapshot(&self.snapshot_path)? {
            Some(snapshot) => Ok((snapshot.state, snapshot.seq + 1)),
            None => Ok((MaterializedState::default(), 0)),
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
