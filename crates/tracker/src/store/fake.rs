// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`TrackerStore`] for tests: applies events straight to a
//! [`MaterializedState`] guarded by a `parking_lot::Mutex`, with no WAL.

use super::{NewJob, NewStep, StepCounts, TrackerStore};
use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use sendense_core::{JobId, StepId, TrackerStatus};
use sendense_storage::event::Event;
use sendense_storage::MaterializedState;
use parking_lot::Mutex;

#[derive(Default)]
pub struct FakeTrackerStore {
    state: Mutex<MaterializedState>,
    pub appended: Mutex<Vec<Event>>,
}

impl FakeTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: Event) {
        self.state.lock().apply_event(&event);
        self.appended.lock().push(event);
    }
}

impl TrackerStore for FakeTrackerStore {
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
