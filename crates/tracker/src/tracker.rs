// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job/step tracker itself: `start_job`/`end_job`, `start_step`/
//! `end_step`, the panic-safe `run_step`, manual + computed progress, and
//! the logger factory.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sendense_core::{Clock, JobId, StepId, TrackerStatus};

use crate::context::ExecutionContext;
use crate::error::TrackerError;
use crate::log_sink::LogSink;
use crate::logger::Logger;
use crate::store::{NewJob, NewStep, StepCounts, TrackerStore};

/// Progress snapshot returned by [`Tracker::get_job_progress`].
///
/// Callers are told (per spec) to "display whichever is higher or both" of
/// `manual_percent` and `step_percent` — this type deliberately keeps both
/// rather than picking a winner itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobProgress {
    pub completed_steps: u32,
    pub failed_steps: u32,
    pub running_steps: u32,
    pub skipped_steps: u32,
    pub total_steps: u32,
    pub manual_percent: Option<f64>,
    pub step_percent: f64,
}

impl From<StepCounts> for JobProgress {
    fn from(counts: StepCounts) -> Self {
        Self {
            completed_steps: counts.completed,
            failed_steps: counts.failed,
            running_steps: counts.running,
            skipped_steps: counts.skipped,
            total_steps: counts.total,
            manual_percent: None,
            step_percent: counts.computed_percent(),
        }
    }
}

/// Outcome of a [`Tracker::run_step`] call: distinguishes the business
/// closure's own error from an abnormal termination (panic) and from a
/// tracker-internal bookkeeping failure, without losing any of them.
#[derive(Debug)]
pub enum StepError<E> {
    /// `fn` returned `Err(_)`.
    Business(E),
    /// `fn`'s future panicked. The step is still closed `failed` before this
    /// is returned — the panic is converted, never silently swallowed.
    Panicked(String),
    /// Bookkeeping around the step itself failed (e.g. `start_step` input
    /// validation). Never caused by the business closure.
    Tracker(TrackerError),
}

impl<E: std::fmt::Display> std::fmt::Display for StepError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Business(e) => write!(f, "{e}"),
            Self::Panicked(msg) => write!(f, "step panicked: {msg}"),
            Self::Tracker(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for StepError<E> {}

impl<E> From<TrackerError> for StepError<E> {
    fn from(error: TrackerError) -> Self {
        Self::Tracker(error)
    }
}

/// Hierarchical execution tracker.
///
/// Generic over the durable [`TrackerStore`] and a [`Clock`] so tests can
/// substitute `FakeTrackerStore`/`FakeClock` and assert deterministically.
pub struct Tracker<S, C> {
    store: Arc<S>,
    clock: C,
    log_sink: LogSink,
}

impl<S, C> Clone for Tracker<S, C>
where
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            log_sink: self.log_sink.clone(),
        }
    }
}

impl<S, C> Tracker<S, C>
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    pub fn new(store: Arc<S>, clock: C, log_sink: LogSink) -> Self {
        Self { store, clock, log_sink }
    }

    fn now(&self) -> chrono::DateTime<Utc> {
        // The store's durable timestamps are wall-clock, independent of the
        // `Clock` used for stall-timeout/backoff math elsewhere in the hub.
        let _ = &self.clock;
        Utc::now()
    }

    /// Opens a new job in status `running`. `parent` links it under an
    /// existing job for nested operations (e.g. a backup job opened as a
    /// child of a policy-run job).
    pub fn start_job(
        &self,
        parent: Option<JobId>,
        job_type: impl Into<String>,
        operation: impl Into<String>,
        owner: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<(ExecutionContext, JobId), TrackerError> {
        let job_type = job_type.into();
        let operation = operation.into();
        if job_type.trim().is_empty() {
            return Err(TrackerError::InvalidInput("job type must not be empty".into()));
        }
        if operation.trim().is_empty() {
            return Err(TrackerError::InvalidInput("operation must not be empty".into()));
        }
        let job_id = JobId::new();
        self.store.create_job(
            NewJob {
                job_id,
                parent_id: parent,
                job_type,
                operation,
                owner,
                metadata,
            },
            self.now(),
        )?;
        Ok((ExecutionContext::root(job_id), job_id))
    }

    /// Sets a terminal status. Idempotent if called again with the same
    /// terminal value; errors with [`TrackerError::AlreadyTerminal`] if
    /// called with a *different* terminal value than the one already set.
    pub fn end_job(&self, job_id: JobId, status: TrackerStatus, error: Option<String>) -> Result<(), TrackerError> {
        match self.store.end_job(job_id, status, error, self.now()) {
            Ok(()) => Ok(()),
            Err(TrackerError::AlreadyTerminal) if self.store.job_status(job_id) == Some(status) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Opens a step under `job_id`, assigning the next sequence number.
    pub fn start_step(
        &self,
        ctx: &ExecutionContext,
        job_id: JobId,
        name: impl Into<String>,
    ) -> Result<(ExecutionContext, StepId), TrackerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TrackerError::InvalidInput("step name must not be empty".into()));
        }
        let step_id = StepId::new();
        let seq = self.store.next_step_seq(job_id);
        self.store.create_step(
            NewStep {
                step_id,
                job_id,
                seq,
                name,
            },
            self.now(),
        )?;
        Ok((ctx.with_step(step_id), step_id))
    }

    pub fn end_step(&self, step_id: StepId, status: TrackerStatus, error: Option<String>) -> Result<(), TrackerError> {
        self.store.end_step(step_id, status, error, self.now())
    }

    /// Opens a step, runs `f`, and guarantees the step closes exactly once
    /// in `succeeded` or `failed` — never left `running`, even if `f`'s
    /// future panics.
    ///
    /// `f`'s future is driven on a spawned task so a panic inside it
    /// surfaces as a [`tokio::task::JoinError`] rather than unwinding
    /// through this caller's stack; the panic message is recorded on the
    /// step and re-surfaced as [`StepError::Panicked`].
    pub async fn run_step<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        job_id: JobId,
        name: &str,
        f: F,
    ) -> Result<T, StepError<E>>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let (step_ctx, step_id) = self.start_step(ctx, job_id, name)?;
        let outcome = tokio::spawn(f(step_ctx)).await;
        match outcome {
            Ok(Ok(value)) => {
                self.end_step(step_id, TrackerStatus::Succeeded, None)?;
                Ok(value)
            }
            Ok(Err(business_error)) => {
                let message = business_error.to_string();
                self.end_step(step_id, TrackerStatus::Failed, Some(message))?;
                Err(StepError::Business(business_error))
            }
            Err(join_error) => {
                let message = panic_message(join_error);
                self.end_step(step_id, TrackerStatus::Failed, Some(message.clone()))?;
                Err(StepError::Panicked(message))
            }
        }
    }

    pub fn mark_job_progress(&self, job_id: JobId, percent: f64) -> Result<(), TrackerError> {
        self.store.set_job_progress(job_id, percent)
    }

    pub fn get_job_progress(&self, job_id: JobId) -> Result<JobProgress, TrackerError> {
        let counts = self.store.step_counts(job_id).ok_or(TrackerError::NotFound)?;
        let manual_percent = self.store.manual_percent(job_id);
        Ok(JobProgress {
            manual_percent,
            ..JobProgress::from(counts)
        })
    }

    /// Returns a [`Logger`] that attaches `(job_id, step_id)` from `ctx` to
    /// every event, fanning out to `tracing` and the durable log sink.
    pub fn logger(&self, ctx: &ExecutionContext) -> Logger {
        Logger::new(*ctx, self.log_sink.clone())
    }

    pub fn health(&self) -> sendense_core::TrackerHealth {
        self.log_sink.health(0)
    }
}

/// Extracts a human-readable message from a task panic. `JoinError`'s
/// `Display` already includes the panic payload when it can be downcast to
/// `&str`/`String`; this mirrors that but guarantees a message even for
/// other payload types.
fn panic_message(join_error: tokio::task::JoinError) -> String {
    match join_error.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(join_error) => join_error.to_string(),
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
