// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background maintenance tasks the hub binary drives on a
//! `tokio::time::interval` loop, since neither [`Checkpointer`] nor
//! [`ExportServiceApi`] has its own opinion on scheduling.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use sendense_export::ExportServiceApi;
use sendense_storage::{Checkpointer, MaterializedState, Wal};
use tokio_util::sync::CancellationToken;

/// Snapshots `state` and truncates `wal` every `interval`, stopping cleanly
/// when `shutdown` is cancelled.
pub fn spawn_checkpoint_task(
    checkpointer: Arc<Checkpointer>,
    state: Arc<SyncMutex<MaterializedState>>,
    wal: Arc<SyncMutex<Wal>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            let (snapshot, seq) = {
                let state = state.lock();
                (state.clone(), wal.lock().write_seq())
            };
            let mut wal = wal.lock();
            if let Err(error) = checkpointer.checkpoint(&snapshot, seq, &mut wal) {
                tracing::error!(%error, "periodic checkpoint failed");
            }
        }
    })
}

/// Calls `sync_exports_with_images` every `interval`, stopping cleanly when
/// `shutdown` is cancelled.
pub fn spawn_export_sync_task(
    exports: Arc<dyn ExportServiceApi>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            exports.sync_exports_with_images().await;
        }
    })
}
