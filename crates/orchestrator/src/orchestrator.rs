// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup Orchestrator: `start_backup`'s seven-step dispatch algorithm,
//! plus the [`FinalizationHandler`] implementation that closes the loop
//! back from the progress pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sendense_agent_client::{AgentClient, StartAcceptance, StartBackupRequest};
use sendense_core::{BackupId, BackupStatus, Clock, JobId};
use sendense_export::ExportServiceApi;
use sendense_repository::{ChainManagerApi, CreateBackupRequest};
use sendense_tracker::TrackerStore;
use sendense_tracker::Tracker;

use crate::error::OrchestratorError;
use crate::pipeline::{FailureReason, FinalizationHandler, ProgressPipeline};
use crate::types::{BackupRequest, BackupResult};

/// Orchestrates a single `start_backup` dispatch and owns the wiring back
/// from [`ProgressPipeline`] finalization into the chain manager.
///
/// Generic over the same `(TrackerStore, Clock)` pair as [`Tracker`] and
/// [`ProgressPipeline`] — a production hub instantiates this once with
/// `WalBackedStore`/`SystemClock`; tests instantiate it with
/// `FakeTrackerStore`/`FakeClock` and the fakes for the three collaborator
/// traits.
pub struct Orchestrator<S, C> {
    chain: Arc<dyn ChainManagerApi>,
    exports: Arc<dyn ExportServiceApi>,
    agent: Arc<dyn AgentClient>,
    tracker: Tracker<S, C>,
    pipeline: Arc<ProgressPipeline<S, C>>,
    /// Whether the progress pipeline pulls from the agent or waits for
    /// pushes to the hub's telemetry endpoint.
    pull_mode: bool,
    job_ids: Mutex<HashMap<BackupId, JobId>>,
}

impl<S, C> Orchestrator<S, C>
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    /// Constructs the orchestrator and wires it as the pipeline's
    /// finalizer, completing the cycle described on [`FinalizationHandler`].
    pub fn new(
        chain: Arc<dyn ChainManagerApi>,
        exports: Arc<dyn ExportServiceApi>,
        agent: Arc<dyn AgentClient>,
        tracker: Tracker<S, C>,
        pipeline: Arc<ProgressPipeline<S, C>>,
        pull_mode: bool,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            chain,
            exports,
            agent,
            tracker,
            pipeline,
            pull_mode,
            job_ids: Mutex::new(HashMap::new()),
        });
        orchestrator.pipeline.set_finalizer(Arc::clone(&orchestrator) as Arc<dyn FinalizationHandler>);
        orchestrator
    }

    /// Dispatches a new backup. Seven steps:
    /// validate, allocate the chain-manager image, publish the export,
    /// open a tracker job, dispatch to the capture agent, register with the
    /// progress pipeline, and return the in-flight result. Any failure
    /// after the image is allocated rolls back what already succeeded
    /// (export retraction, job row marked `failed`) before returning.
    pub async fn start_backup(&self, request: BackupRequest) -> Result<BackupResult, OrchestratorError> {
        if request.total_bytes == 0 {
            return Err(OrchestratorError::InvalidInput("total_bytes must be greater than zero".to_string()));
        }
        if request.vm_display_name.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("vm_display_name must not be empty".to_string()));
        }
        if request.backup_type == sendense_core::BackupType::Incremental && request.previous_change_id.is_none() {
            return Err(OrchestratorError::InvalidInput(
                "incremental backup requires previous_change_id".to_string(),
            ));
        }

        let job = self
            .chain
            .create_backup(CreateBackupRequest {
                vm_context_id: request.vm_context_id,
                disk_index: request.disk_index,
                repository_id: request.repository_id,
                backup_type: request.backup_type,
                policy_id: request.policy_id.clone(),
                previous_change_id: request.previous_change_id.clone(),
                total_bytes: request.total_bytes,
            })
            .await?;

        let export = match self
            .exports
            .create_file_export(
                request.vm_context_id,
                request.disk_index,
                job.id,
                request.backup_type,
                &job.file_path,
                true,
            )
            .await
        {
            Ok(export) => export,
            Err(error) => {
                self.abandon(job.id, format!("export publication failed: {error}")).await;
                return Err(OrchestratorError::from(error));
            }
        };

        if let Err(error) = self.chain.assign_export_name(job.id, export.name.clone()).await {
            tracing::error!(%error, backup_id = %job.id, "failed to record assigned export name on the backup job row");
        }

        let mut metadata = HashMap::new();
        metadata.insert("backup_id".to_string(), job.id.to_string());
        metadata.insert("vm_context_id".to_string(), request.vm_context_id.to_string());
        metadata.insert("disk_index".to_string(), request.disk_index.to_string());
        metadata.insert("repository_id".to_string(), request.repository_id.to_string());
        let (_, job_id) = match self.tracker.start_job(
            None,
            "backup",
            "start_backup",
            request.policy_id.clone(),
            metadata,
        ) {
            Ok(value) => value,
            Err(error) => {
                self.teardown_export(&export.name).await;
                self.abandon(job.id, format!("tracker start_job failed: {error}")).await;
                return Err(OrchestratorError::InvalidInput(error.to_string()));
            }
        };

        let dispatch = StartBackupRequest {
            backup_id: job.id,
            vm_display_name: request.vm_display_name.clone(),
            vm_context_id: request.vm_context_id,
            disk_index: request.disk_index,
            export_name: export.name.clone(),
            export_port: export.port,
            backup_type: request.backup_type,
            previous_change_id: request.previous_change_id.clone(),
        };

        let response = match self.agent.start_backup(&dispatch).await {
            Ok(response) => response,
            Err(error) => {
                let _ = self.tracker.end_job(job_id, sendense_core::TrackerStatus::Failed, Some(error.to_string()));
                self.teardown_export(&export.name).await;
                self.abandon(job.id, format!("agent dispatch failed: {error}")).await;
                return Err(OrchestratorError::AgentUnreachable(error.to_string()));
            }
        };

        if !matches!(response.status, StartAcceptance::Started | StartAcceptance::Accepted) {
            let message = "agent rejected the dispatch".to_string();
            let _ = self.tracker.end_job(job_id, sendense_core::TrackerStatus::Failed, Some(message.clone()));
            self.teardown_export(&export.name).await;
            self.abandon(job.id, message.clone()).await;
            return Err(OrchestratorError::AgentFailed(message));
        }

        if let Err(error) = self.chain.mark_backup_started(job.id).await {
            tracing::error!(%error, backup_id = %job.id, "failed to mark backup job started after successful dispatch");
        }

        self.job_ids.lock().insert(job.id, job_id);
        self.pipeline.register(job.id, job_id, self.pull_mode);

        Ok(BackupResult {
            backup_id: job.id,
            status: BackupStatus::Running,
            file_path: job.file_path,
            export_name: export.name,
            total_bytes: job.total_bytes,
            change_id: job.new_change_id,
            created_at: job.created_at,
            completed_at: job.completed_at,
        })
    }

    /// Tears down a published export without surfacing its own failure: a
    /// best-effort step inside an already-failing rollback path.
    async fn teardown_export(&self, export_name: &str) {
        if let Err(error) = self.exports.remove_file_export(export_name).await {
            tracing::error!(%error, export_name, "failed to retract export during rollback");
        }
    }

    /// Marks a job `failed` (the pending -> failed transition for
    /// early dispatch failures; `fail_backup` also deletes the image file,
    /// unlike `delete_backup` which requires the job to be chain-tail).
    async fn abandon(&self, backup_id: BackupId, message: String) {
        if let Err(error) = self.chain.fail_backup(backup_id, message).await {
            tracing::error!(%error, %backup_id, "failed to mark abandoned backup job failed");
        }
    }

    /// Retracts `backup_id`'s export by its persisted name, best-effort —
    /// finalization (either outcome) must not be blocked on the retire
    /// failing. A no-op if the job row never had an export name assigned.
    async fn retire_export(&self, backup_id: BackupId) {
        let export_name = match self.chain.get_backup(backup_id).await {
            Some(job) => job.export_name,
            None => {
                tracing::error!(%backup_id, "backup job row missing at finalization, cannot retire its export");
                return;
            }
        };
        let Some(export_name) = export_name else {
            tracing::error!(%backup_id, "backup job has no assigned export name at finalization");
            return;
        };
        self.teardown_export(&export_name).await;
    }
}

#[async_trait]
impl<S, C> FinalizationHandler for Orchestrator<S, C>
where
    S: TrackerStore + 'static,
    C: Clock + 'static,
{
    async fn on_succeeded(&self, backup_id: BackupId, change_id: String, bytes_transferred: u64) {
        if let Err(error) = self.chain.finalize_backup(backup_id, change_id, bytes_transferred).await {
            tracing::error!(%error, %backup_id, "failed to finalize succeeded backup job");
        }
        self.retire_export(backup_id).await;
        if let Some(job_id) = self.job_ids.lock().remove(&backup_id) {
            let _ = self.tracker.end_job(job_id, sendense_core::TrackerStatus::Succeeded, None);
        }
    }

    async fn on_failed(&self, backup_id: BackupId, reason: FailureReason) {
        let message = match reason {
            FailureReason::AgentFailed(msg) => msg,
            FailureReason::StreamTimeout => "progress stream stalled past the timeout".to_string(),
            FailureReason::StreamStartFailure => "agent never reported progress for this backup".to_string(),
        };
        if let Err(error) = self.chain.fail_backup(backup_id, message.clone()).await {
            tracing::error!(%error, %backup_id, "failed to mark stream-terminated backup job failed");
        }
        self.retire_export(backup_id).await;
        if let Some(job_id) = self.job_ids.lock().remove(&backup_id) {
            let _ = self.tracker.end_job(job_id, sendense_core::TrackerStatus::Failed, Some(message));
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
