// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable log sink: a bounded `tokio::sync::mpsc` channel backed by a small
//! drop-oldest ring buffer, drained by a batching writer task.
//!
//! Entries are queued from synchronous call sites (`Tracker::log`, which may
//! run inside a panic-guarded step closure) via `try_send`. When the channel
//! is full the entry instead lands in the overflow ring buffer, evicting the
//! oldest queued entry if that buffer is itself full — log delivery is
//! best-effort, never a reason to block or fail the business path.

use chrono::Utc;
use parking_lot::Mutex;
use sendense_core::{JobId, LogLevel, StepId, TrackerHealth};
use sendense_storage::event::Event;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::store::TrackerStore;

/// Channel capacity used when the hub's config doesn't override it.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Writer batches are flushed at least this often even if more log entries
/// keep arriving, per the ≤25ms write-visibility window.
const BATCH_WINDOW: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub job_id: Option<JobId>,
    pub step_id: Option<StepId>,
    pub level: LogLevel,
    pub message: String,
    pub attrs: HashMap<String, String>,
}

impl LogEntry {
    fn into_event(self) -> Event {
        Event::LogEventRecorded {
            job_id: self.job_id,
            step_id: self.step_id,
            level: self.level,
            message: self.message,
            attrs: self.attrs,
            emitted_at: Utc::now(),
        }
    }
}

/// Handle used by the tracker to queue log entries. Cheap to clone.
#[derive(Clone)]
pub struct LogSink {
    tx: mpsc::Sender<LogEntry>,
    overflow: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
    dropped_total: Arc<AtomicU64>,
    last_writer_error: Arc<Mutex<Option<String>>>,
}

impl LogSink {
    /// Starts the channel plus its batching writer task, returning the
    /// sink handle and the task's `JoinHandle`. The writer task runs until
    /// every `LogSink` clone and the internal sender are dropped.
    pub fn spawn(store: Arc<dyn TrackerStore>, capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink = Self {
            tx,
            overflow: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
            dropped_total: Arc::new(AtomicU64::new(0)),
            last_writer_error: Arc::new(Mutex::new(None)),
        };
        let handle = tokio::spawn(Self::run_writer(rx, store, sink.clone()));
        (sink, handle)
    }

    /// Queues `entry`. Never blocks: on a full channel the entry (or the
    /// oldest one already waiting) is dropped and counted instead.
    pub fn submit(&self, entry: LogEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => self.push_overflow(entry),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn push_overflow(&self, entry: LogEntry) {
        let mut overflow = self.overflow.lock();
        if overflow.len() >= self.capacity {
            overflow.pop_front();
            self.dropped_total.fetch_add(1, Ordering::Relaxed);
        }
        overflow.push_back(entry);
    }

    /// Moves as many overflowed entries as fit into the channel. Called by
    /// the writer task after each batch so a burst drains once load eases.
    fn drain_overflow_into_channel(&self) {
        loop {
            let next = {
                let mut overflow = self.overflow.lock();
                overflow.pop_front()
            };
            let Some(entry) = next else { return };
            if let Err(mpsc::error::TrySendError::Full(entry)) = self.tx.try_send(entry) {
                self.overflow.lock().push_front(entry);
                return;
            }
        }
    }

    pub fn health(&self, jobs_tracked: usize) -> TrackerHealth {
        TrackerHealth {
            jobs_tracked,
            queue_depth: self.overflow.lock().len(),
            dropped_total: self.dropped_total.load(Ordering::Relaxed),
            last_writer_error: self.last_writer_error.lock().clone(),
        }
    }

    async fn run_writer(mut rx: mpsc::Receiver<LogEntry>, store: Arc<dyn TrackerStore>, sink: LogSink) {
        let mut batch = Vec::new();
        loop {
            batch.clear();
            match rx.recv().await {
                Some(first) => batch.push(first),
                None => return,
            }

            let deadline = tokio::time::sleep(BATCH_WINDOW);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    biased;
                    maybe = rx.recv() => match maybe {
                        Some(entry) => batch.push(entry),
                        None => break,
                    },
                    _ = &mut deadline => break,
                }
            }

            if batch.is_empty() {
                continue;
            }
            let events: Vec<Event> = batch.drain(..).map(LogEntry::into_event).collect();
            store.append_log_batch(&events);
            *sink.last_writer_error.lock() = None;
            sink.drain_overflow_into_channel();
        }
    }
}

#[cfg(test)]
#[path = "log_sink_tests.rs"]
mod tests;
