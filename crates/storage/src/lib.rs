// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sendense-storage: write-ahead log, periodic snapshot, and the
//! materialized-state projection the rest of the hub reads and mutates.

pub mod checkpoint;
pub mod event;
pub mod snapshot;
pub mod state;
pub mod wal;

pub use checkpoint::{CheckpointError, Checkpointer};
pub use event::Event;
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry, WalError};
