// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage abstraction the [`Tracker`](crate::tracker::Tracker) is generic
//! over, so tests can swap in an in-memory fake instead of a WAL-backed
//! store.

use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use sendense_core::{JobId, StepId, TrackerStatus};
use sendense_storage::event::Event;
use sendense_storage::{MaterializedState, Wal};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: JobId,
    pub parent_id: Option<JobId>,
    pub job_type: String,
    pub operation: String,
    pub owner: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct NewStep {
    pub step_id: StepId,
    pub job_id: JobId,
    pub seq: u32,
    pub name: String,
}

/// Completed/failed/running/skipped step counts plus manual percent, as
/// returned by `get_job_progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepCounts {
    pub completed: u32,
    pub failed: u32,
    pub running: u32,
    pub skipped: u32,
    pub total: u32,
}

impl StepCounts {
    /// `completed_steps / total_steps × 100`, or `0.0` if there are no steps.
    pub fn computed_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Durable storage surface the tracker needs for job/step bookkeeping.
///
/// Log events are handled separately by [`crate::log_sink::LogSink`] — this
/// trait only covers the job/step transitions that must be durable and
/// queryable synchronously.
pub trait TrackerStore: Send + Sync {
    fn create_job(&self, job: NewJob, started_at: DateTime<Utc>) -> Result<(), TrackerError>;
    fn end_job(
        &self,
        job_id: JobId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), TrackerError>;
    fn job_status(&self, job_id: JobId) -> Option<TrackerStatus>;
    fn next_step_seq(&self, job_id: JobId) -> u32;
    fn create_step(&self, step: NewStep, started_at: DateTime<Utc>) -> Result<(), TrackerError>;
    fn end_step(
        &self,
        step_id: StepId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), TrackerError>;
    fn set_job_progress(&self, job_id: JobId, percent: f64) -> Result<(), TrackerError>;
    fn manual_percent(&self, job_id: JobId) -> Option<f64>;
    fn step_counts(&self, job_id: JobId) -> Option<StepCounts>;
    fn append_log_batch(&self, entries: &[Event]);
}

/// Production store: a shared [`MaterializedState`] plus the [`Wal`] that
/// backs it. Both guards are `parking_lot::Mutex` — every critical section
/// here is a short, synchronous state mutation plus an append, never held
/// across an `.await`.
pub struct WalBackedStore {
    state: Arc<parking_lot::Mutex<MaterializedState>>,
    wal: Arc<parking_lot::Mutex<Wal>>,
}

impl WalBackedStore {
    pub fn new(state: Arc<parking_lot::Mutex<MaterializedState>>, wal: Arc<parking_lot::Mutex<Wal>>) -> Self {
        Self { state, wal }
    }

    fn record(&self, event: Event) {
        let mut state = self.state.lock();
        state.apply_event(&event);
        drop(state);
        let mut wal = self.wal.lock();
        if let Err(error) = wal.append(&event) {
            tracing::error!(%error, kind = event.kind(), "tracker WAL append failed");
            return;
        }
        if wal.needs_flush() {
            if let Err(error) = wal.flush() {
                tracing::error!(%error, "tracker WAL flush failed");
            }
        }
    }
}

impl TrackerStore for WalBackedStore {
    fn create_job(&self, job: NewJob, started_at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.record(Event::JobTrackingCreated {
            job_id: job.job_id,
            parent_id: job.parent_id,
            job_type: job.job_type,
            operation: job.operation,
            owner: job.owner,
            metadata: job.metadata,
            started_at,
        });
        Ok(())
    }

    fn end_job(
        &self,
        job_id: JobId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let current = self.job_status(job_id).ok_or(TrackerError::NotFound)?;
        if current.is_terminal() {
            return Err(TrackerError::AlreadyTerminal);
        }
        self.record(Event::JobTrackingCompleted {
            job_id,
            status,
            error,
            completed_at,
        });
        Ok(())
    }

    fn job_status(&self, job_id: JobId) -> Option<TrackerStatus> {
        self.state.lock().job_tracking.get(&job_id).map(|j| j.status)
    }

    fn next_step_seq(&self, job_id: JobId) -> u32 {
        self.state
            .lock()
            .job_steps
            .values()
            .filter(|s| s.job_id == job_id)
            .map(|s| s.seq)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }

    fn create_step(&self, step: NewStep, started_at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.record(Event::JobStepStarted {
            step_id: step.step_id,
            job_id: step.job_id,
            seq: step.seq,
            name: step.name,
            started_at,
        });
        Ok(())
    }

    fn end_step(
        &self,
        step_id: StepId,
        status: TrackerStatus,
        error: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        self.record(Event::JobStepCompleted {
            step_id,
            status,
            error,
            completed_at,
        });
        Ok(())
    }

    fn set_job_progress(&self, job_id: JobId, percent: f64) -> Result<(), TrackerError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(TrackerError::InvalidInput(format!(
                "percent {percent} out of range [0, 100]"
            )));
        }
        self.record(Event::JobTrackingProgress { job_id, percent });
        Ok(())
    }

    fn manual_percent(&self, job_id: JobId) -> Option<f64> {
        self.state.lock().job_tracking.get(&job_id).and_then(|j| j.percent)
    }

    fn step_counts(&self, job_id: JobId) -> Option<StepCounts> {
        let state = self.state.lock();
        state.job_tracking.get(&job_id)?;
        let mut counts = StepCounts::default();
        for step in state.job_steps.values().filter(|s| s.job_id == job_id) {
            counts.total += 1;
            match step.status {
                TrackerStatus::Succeeded => counts.completed += 1,
                TrackerStatus::Failed => counts.failed += 1,
                TrackerStatus::Cancelled => counts.skipped += 1,
                TrackerStatus::Running => counts.running += 1,
            }
        }
        Some(counts)
    }

    fn append_log_batch(&self, entries: &[Event]) {
        for event in entries {
            self.record(event.clone());
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
