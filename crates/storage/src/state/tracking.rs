// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::{LogEvent, TrackerJob, TrackerStep};
use super::MaterializedState;
use crate::event::Event;

/// Bound on the in-memory recent-log-window kept per job. The durable log
/// sink (tracker's bounded mpsc channel + writer workers) is the source of
/// truth for the full history; this is only a cheap recent-activity cache.
const MAX_RECENT_LOGS_PER_JOB: usize = 200;

pub(super) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobTrackingCreated {
            job_id,
            parent_id,
            job_type,
            operation,
            owner,
            metadata,
            started_at,
        } => {
            state.job_tracking.entry(*job_id).or_insert_with(|| TrackerJob {
                id: *job_id,
                parent_id: *parent_id,
                job_type: job_type.clone(),
                operation: operation.clone(),
                owner: owner.clone(),
                status: sendense_core::TrackerStatus::Running,
                percent: None,
                metadata: metadata.clone(),
                error: None,
                started_at: *started_at,
                completed_at: None,
            });
        }

        Event::JobTrackingProgress { job_id, percent } => {
            if let Some(job) = state.job_tracking.get_mut(job_id) {
                job.percent = Some(percent.clamp(0.0, 100.0));
            }
        }

        Event::JobTrackingCompleted {
            job_id,
            status,
            error,
            completed_at,
        } => {
            if let Some(job) = state.job_tracking.get_mut(job_id) {
                if !job.status.is_terminal() {
                    job.status = *status;
                    job.error = error.clone();
                    job.completed_at = Some(*completed_at);
                }
            }
        }

        Event::JobStepStarted {
            step_id,
            job_id,
            seq,
            name,
            started_at,
        } => {
            state.job_steps.entry(*step_id).or_insert_with(|| TrackerStep {
                id: *step_id,
                job_id: *job_id,
                seq: *seq,
                name: name.clone(),
                status: sendense_core::TrackerStatus::Running,
                error: None,
                started_at: *started_at,
                completed_at: None,
            });
        }

        Event::JobStepCompleted {
            step_id,
            status,
            error,
            completed_at,
        } => {
            if let Some(step) = state.job_steps.get_mut(step_id) {
                if !step.status.is_terminal() {
                    step.status = *status;
                    step.error = error.clone();
                    step.completed_at = Some(*completed_at);
                }
            }
        }

        Event::LogEventRecorded {
            job_id,
            step_id,
            level,
            message,
            attrs,
            emitted_at,
        } => {
            let Some(job_id) = job_id else { return };
            let entries = state.recent_logs.entry(*job_id).or_default();
            entries.push(LogEvent {
                job_id: Some(*job_id),
                step_id: *step_id,
                level: *level,
                message: message.clone(),
                attrs: attrs.clone(),
                emitted_at: *emitted_at,
            });
            if entries.len() > MAX_RECENT_LOGS_PER_JOB {
                entries.remove(0);
            }
        }

        _ => {}
    }
}

#[cfg(test)]
#[path = "tracking_tests.rs"]
mod tests;
