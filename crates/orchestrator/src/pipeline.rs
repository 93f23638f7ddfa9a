// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress Pipeline: gathers per-job progress from the capture agent (pull
//! poll or push), persists it with throttling, enforces the stall timeout,
//! and triggers orchestrator finalization on terminal states.
//!
//! Pull-mode polling is one `tokio::task` per registered job. The stall
//! watchdog is a single background task scanning the in-memory snapshot map
//! once per second rather than a timer per job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use sendense_agent_client::AgentClient;
use sendense_core::{BackupId, Clock, JobId, ProgressRecord, ProgressStage, ProgressStatus};
use sendense_repository::ChainManagerApi;
use sendense_tracker::{Tracker, TrackerStore};

use crate::error::OrchestratorError;

/// Cadence tunables for the progress pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub persist_min_interval: Duration,
    pub persist_min_progress: f64,
    pub stall_timeout: Duration,
    pub consecutive_fail_max: u32,
    pub poll_backoff: Duration,
    /// Grace window for repeated `404`s on a job that has never reported
    /// progress before treating it as a stream-start failure.
    pub poll_warmup_grace: Duration,
    /// How often the stall watchdog scans the in-memory job map.
    pub stall_scan_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            persist_min_interval: Duration::from_secs(2),
            persist_min_progress: 1.0,
            stall_timeout: Duration::from_secs(5 * 60),
            consecutive_fail_max: 3,
            poll_backoff: Duration::from_secs(10),
            poll_warmup_grace: Duration::from_secs(30),
            stall_scan_interval: Duration::from_secs(1),
        }
    }
}

/// Why a registered job finalized as a failure, passed to
/// [`FinalizationHandler::on_failed`].
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// The agent reported a terminal `failed` status.
    AgentFailed(String),
    /// No progress update has arrived for longer than `stall_timeout`.
    StreamTimeout,
    /// Pull polling returned repeated `404`s past the warm-up grace window
    /// without ever observing a successful poll.
    StreamStartFailure,
}

/// Implemented by [`crate::orchestrator::Orchestrator`] so the pipeline can
/// trigger finalization without the two crates depending on each other's
/// concrete types. Wired post-construction via [`ProgressPipeline::set_finalizer`]
/// to break the orchestrator/pipeline construction cycle (the orchestrator
/// owns the pipeline to register jobs; the pipeline calls back into the
/// orchestrator to finalize them).
#[async_trait]
pub trait FinalizationHandler: Send + Sync {
    async fn on_succeeded(&self, backup_id: BackupId, change_id: String, bytes_transferred: u64);
    async fn on_failed(&self, backup_id: BackupId, reason: FailureReason);
}

struct JobState {
    job_id: JobId,
    record: ProgressRecord,
    current_step: Option<sendense_core::StepId>,
    last_persist: Instant,
    last_activity: Instant,
    finalized: bool,
    consecutive_poll_failures: u32,
    registered_at: Instant,
    seen_any_poll_success: bool,
}

/// Component C5. Generic over the same [`TrackerStore`]/[`Clock`] pair as
/// [`Tracker`] so a single `Clock` drives both step bookkeeping timestamps
/// and stall/cadence math in tests.
pub struct ProgressPipeline<S, C> {
    clock: C,
    tracker: Tracker<S, C>,
    chain: Arc<dyn ChainManagerApi>,
    agent: Arc<dyn AgentClient>,
    config: PipelineConfig,
    jobs: Mutex<HashMap<BackupId, JobState>>,
    handler: Mutex<Option<Arc<dyn FinalizationHandler>>>,
}

fn initial_record() -> ProgressRecord {
    ProgressRecord {
        stage: ProgressStage::Discover,
        status: ProgressStatus::Queued,
        total_bytes: 0,
        bytes_transferred: 0,
        throughput_bytes_per_sec: 0,
        percent: 0.0,
        per_disk: Vec::new(),
        change_id: None,
    }
}

impl<S, C> ProgressPipeline<S, C>
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    pub fn new(
        clock: C,
        tracker: Tracker<S, C>,
        chain: Arc<dyn ChainManagerApi>,
        agent: Arc<dyn AgentClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            clock,
            tracker,
            chain,
            agent,
            config,
            jobs: Mutex::new(HashMap::new()),
            handler: Mutex::new(None),
        }
    }

    /// Completes the construction cycle described on [`FinalizationHandler`].
    pub fn set_finalizer(&self, handler: Arc<dyn FinalizationHandler>) {
        *self.handler.lock() = Some(handler);
    }

    /// Registers `backup_id` (just dispatched, tracked under `job_id`) to
    /// receive progress. If `pull` is set, spawns the one-task-per-job pull
    /// poller; push-mode jobs rely entirely on [`Self::update`] being called
    /// by the hub's telemetry endpoint.
    pub fn register(self: &Arc<Self>, backup_id: BackupId, job_id: JobId, pull: bool) {
        let now = self.clock.now();
        self.jobs.lock().insert(
            backup_id,
            JobState {
                job_id,
                record: initial_record(),
                current_step: None,
                last_persist: now,
                last_activity: now,
                finalized: false,
                consecutive_poll_failures: 0,
                registered_at: now,
                seen_any_poll_success: false,
            },
        );
        if pull {
            let pipeline = Arc::clone(self);
            tokio::spawn(async move { pipeline.poll_loop(backup_id).await });
        }
    }

    /// Normalized progress sink entry point. Registration is
    /// automatic on first update: if `backup_id` is unregistered, lazily
    /// re-opens a tracker job from the persisted backup row rather than
    /// rejecting an out-of-order arrival.
    pub async fn update(&self, backup_id: BackupId, mut record: ProgressRecord) -> Result<(), OrchestratorError> {
        record.clamp_percent();

        if !self.jobs.lock().contains_key(&backup_id) {
            self.lazy_register(backup_id).await?;
        }

        let now = self.clock.now();
        let outcome = {
            let mut jobs = self.jobs.lock();
            let Some(state) = jobs.get_mut(&backup_id) else {
                return Err(OrchestratorError::NotFound);
            };
            if state.finalized {
                return Ok(());
            }

            let stage_changed = state.record.stage != record.stage;
            let status_changed = state.record.status != record.status;
            let percent_delta = (record.percent - state.record.percent).abs();
            let persist_due = now.duration_since(state.last_persist) >= self.config.persist_min_interval
                || stage_changed
                || status_changed
                || percent_delta >= self.config.persist_min_progress;

            state.last_activity = now;
            state.record = record.clone();
            if persist_due {
                state.last_persist = now;
            }

            let became_terminal = record.status.is_terminal() && !state.finalized;
            if became_terminal {
                state.finalized = true;
            }

            (
                persist_due,
                stage_changed || status_changed,
                became_terminal,
                state.job_id,
                state.current_step.take(),
            )
        };

        let (persist_due, transitioned, became_terminal, job_id, previous_step) = outcome;

        if persist_due {
            self.chain.update_progress(backup_id, record.bytes_transferred).await?;
        }

        if transitioned {
            if let Some(step_id) = previous_step {
                if let Err(error) = self
                    .tracker
                    .end_step(step_id, sendense_core::TrackerStatus::Succeeded, None)
                {
                    tracing::error!(%error, "progress pipeline failed to close stage step");
                }
            }
            if !record.status.is_terminal() {
                let ctx = sendense_tracker::ExecutionContext::root(job_id);
                match self.tracker.start_step(&ctx, job_id, format!("backup-{}", record.stage)) {
                    Ok((_, step_id)) => {
                        if let Some(state) = self.jobs.lock().get_mut(&backup_id) {
                            state.current_step = Some(step_id);
                        }
                    }
                    Err(error) => tracing::error!(%error, "progress pipeline failed to open stage step"),
                }
            }
        }

        if became_terminal {
            self.finalize(backup_id, record).await;
        }

        Ok(())
    }

    async fn lazy_register(&self, backup_id: BackupId) -> Result<(), OrchestratorError> {
        let job = self.chain.get_backup(backup_id).await.ok_or(OrchestratorError::NotFound)?;
        let mut metadata = HashMap::new();
        metadata.insert("backup_id".to_string(), backup_id.to_string());
        metadata.insert("vm_context_id".to_string(), job.vm_context_id.to_string());
        let (_, job_id) = self
            .tracker
            .start_job(None, "backup", "backup-lazy-reattach", None, metadata)
            .map_err(|error| {
                tracing::error!(%error, %backup_id, "tracker start_job failed during lazy progress registration");
                OrchestratorError::NotFound
            })?;
        let now = self.clock.now();
        self.jobs.lock().insert(
            backup_id,
            JobState {
                job_id,
                record: initial_record(),
                current_step: None,
                last_persist: now,
                last_activity: now,
                finalized: false,
                consecutive_poll_failures: 0,
                registered_at: now,
                seen_any_poll_success: false,
            },
        );
        Ok(())
    }

    async fn finalize(&self, backup_id: BackupId, record: ProgressRecord) {
        let Some(handler) = self.handler.lock().clone() else {
            tracing::error!(%backup_id, "progress pipeline has no finalizer wired, dropping terminal update");
            return;
        };
        match record.status {
            ProgressStatus::Succeeded => match record.change_id {
                Some(change_id) => handler.on_succeeded(backup_id, change_id, record.bytes_transferred).await,
                None => {
                    handler
                        .on_failed(backup_id, FailureReason::AgentFailed("succeeded without a change id".to_string()))
                        .await
                }
            },
            _ => handler.on_failed(backup_id, FailureReason::AgentFailed("agent reported failure".to_string())).await,
        }
    }

    /// Pure stall check: compares `last_activity` against `self.clock`,
    /// testable with `FakeClock` without real sleeping. Returns the set of
    /// jobs it just failed, for test assertions.
    pub async fn check_stalls(&self) -> Vec<BackupId> {
        let now = self.clock.now();
        let stalled: Vec<(BackupId, JobId)> = {
            let mut jobs = self.jobs.lock();
            let mut found = Vec::new();
            for (backup_id, state) in jobs.iter_mut() {
                if state.finalized {
                    continue;
                }
                if now.duration_since(state.last_activity) > self.config.stall_timeout {
                    state.finalized = true;
                    found.push((*backup_id, state.job_id));
                }
            }
            found
        };

        let Some(handler) = self.handler.lock().clone() else {
            return stalled.into_iter().map(|(id, _)| id).collect();
        };
        let mut ids = Vec::with_capacity(stalled.len());
        for (backup_id, _job_id) in stalled {
            handler.on_failed(backup_id, FailureReason::StreamTimeout).await;
            ids.push(backup_id);
        }
        ids
    }

    /// Spawns the single stall-watchdog task (scans once per second, not
    /// one timer per job).
    pub fn spawn_stall_watchdog(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let interval = pipeline.config.stall_scan_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                pipeline.check_stalls().await;
            }
        })
    }

    async fn poll_loop(self: Arc<Self>, backup_id: BackupId) {
        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            let still_running = self.jobs.lock().get(&backup_id).map(|s| !s.finalized).unwrap_or(false);
            if !still_running {
                return;
            }

            match self.agent.poll_progress(backup_id).await {
                Ok(Some(record)) => {
                    if let Some(state) = self.jobs.lock().get_mut(&backup_id) {
                        state.consecutive_poll_failures = 0;
                        state.seen_any_poll_success = true;
                    }
                    if let Err(error) = self.update(backup_id, record).await {
                        tracing::error!(%error, %backup_id, "progress pipeline failed to apply polled update");
                    }
                }
                Ok(None) => {
                    let should_fail_start = {
                        let jobs = self.jobs.lock();
                        jobs.get(&backup_id)
                            .map(|s| {
                                !s.seen_any_poll_success
                                    && self.clock.now().duration_since(s.registered_at) > self.config.poll_warmup_grace
                            })
                            .unwrap_or(false)
                    };
                    if should_fail_start {
                        let finalized_now = {
                            let mut jobs = self.jobs.lock();
                            match jobs.get_mut(&backup_id) {
                                Some(state) if !state.finalized => {
                                    state.finalized = true;
                                    true
                                }
                                _ => false,
                            }
                        };
                        if finalized_now {
                            if let Some(handler) = self.handler.lock().clone() {
                                handler.on_failed(backup_id, FailureReason::StreamStartFailure).await;
                            }
                        }
                        return;
                    }
                }
                Err(error) => {
                    let hit_max = {
                        let mut jobs = self.jobs.lock();
                        match jobs.get_mut(&backup_id) {
                            Some(state) => {
                                state.consecutive_poll_failures += 1;
                                state.consecutive_poll_failures >= self.config.consecutive_fail_max
                            }
                            None => false,
                        }
                    };
                    tracing::warn!(%error, %backup_id, "progress poll failed");
                    if hit_max {
                        if let Some(state) = self.jobs.lock().get_mut(&backup_id) {
                            state.consecutive_poll_failures = 0;
                        }
                        tokio::time::sleep(self.config.poll_backoff).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
