use super::*;
use sendense_agent_client::FakeAgentClient;
use sendense_core::{BackupType, DiskIndex, FakeClock, RepositoryId, VmContextId};
use sendense_repository::{CreateBackupRequest, FakeChainManager};
use sendense_tracker::log_sink::LogSink;
use sendense_tracker::store::fake::FakeTrackerStore;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

#[derive(Default)]
struct SpyHandler {
    succeeded: StdMutex<Vec<(BackupId, String, u64)>>,
    failed: StdMutex<Vec<(BackupId, String)>>,
}

#[async_trait]
impl FinalizationHandler for SpyHandler {
    async fn on_succeeded(&self, backup_id: BackupId, change_id: String, bytes_transferred: u64) {
        self.succeeded.lock().unwrap().push((backup_id, change_id, bytes_transferred));
    }

    async fn on_failed(&self, backup_id: BackupId, reason: FailureReason) {
        let message = match reason {
            FailureReason::AgentFailed(m) => m,
            FailureReason::StreamTimeout => "stall".to_string(),
            FailureReason::StreamStartFailure => "stream-start".to_string(),
        };
        self.failed.lock().unwrap().push((backup_id, message));
    }
}

fn harness() -> (
    std::sync::Arc<ProgressPipeline<FakeTrackerStore, FakeClock>>,
    std::sync::Arc<FakeChainManager>,
    std::sync::Arc<SpyHandler>,
    FakeClock,
) {
    let store = std::sync::Arc::new(FakeTrackerStore::new());
    let (sink, _handle) = LogSink::spawn(store.clone(), 16);
    let clock = FakeClock::new();
    let tracker = Tracker::new(store, clock.clone(), sink);
    let chain = std::sync::Arc::new(FakeChainManager::default());
    let agent = std::sync::Arc::new(FakeAgentClient::default());
    let pipeline = std::sync::Arc::new(ProgressPipeline::new(
        clock.clone(),
        tracker,
        chain.clone() as std::sync::Arc<dyn ChainManagerApi>,
        agent as std::sync::Arc<dyn sendense_agent_client::AgentClient>,
        PipelineConfig::default(),
    ));
    let handler = std::sync::Arc::new(SpyHandler::default());
    pipeline.set_finalizer(handler.clone() as std::sync::Arc<dyn FinalizationHandler>);
    (pipeline, chain, handler, clock)
}

fn record(stage: ProgressStage, status: ProgressStatus, percent: f64) -> ProgressRecord {
    ProgressRecord {
        stage,
        status,
        total_bytes: 1_000,
        bytes_transferred: (percent / 100.0 * 1_000.0) as u64,
        throughput_bytes_per_sec: 0,
        percent,
        per_disk: Vec::new(),
        change_id: None,
    }
}

async fn create_backup(chain: &FakeChainManager) -> BackupId {
    let job = chain
        .create_backup(CreateBackupRequest {
            vm_context_id: VmContextId::new(),
            disk_index: DiskIndex::new(0),
            repository_id: RepositoryId::new(),
            backup_type: BackupType::Full,
            policy_id: None,
            previous_change_id: None,
            total_bytes: 1_000,
        })
        .await
        .unwrap();
    job.id
}

#[tokio::test]
async fn update_persists_bytes_on_first_call() {
    let (pipeline, chain, _handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 5.0)).await.unwrap();

    assert_eq!(chain.get_backup(backup_id).await.unwrap().bytes_transferred, 50);
}

#[tokio::test]
async fn update_throttles_small_progress_deltas_within_the_window() {
    let (pipeline, chain, _handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 10.0)).await.unwrap();
    // Same stage/status, tiny percent delta, well within persist_min_interval: should not persist yet.
    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 10.2)).await.unwrap();

    assert_eq!(chain.get_backup(backup_id).await.unwrap().bytes_transferred, 100);
}

#[tokio::test]
async fn update_persists_immediately_on_stage_change() {
    let (pipeline, chain, _handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    pipeline.update(backup_id, record(ProgressStage::Snapshot, ProgressStatus::Snapshotting, 1.0)).await.unwrap();
    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 1.1)).await.unwrap();

    assert_eq!(chain.get_backup(backup_id).await.unwrap().bytes_transferred, 11);
}

#[tokio::test]
async fn terminal_success_finalizes_exactly_once() {
    let (pipeline, chain, handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    let mut done = record(ProgressStage::Done, ProgressStatus::Succeeded, 100.0);
    done.change_id = Some("cid-123".to_string());
    pipeline.update(backup_id, done.clone()).await.unwrap();
    // A stray repeat arrival after finalization must not double-fire the handler.
    pipeline.update(backup_id, done).await.unwrap();

    let succeeded = handler.succeeded.lock().unwrap();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].1, "cid-123");
}

#[tokio::test]
async fn terminal_success_without_change_id_is_treated_as_failure() {
    let (pipeline, chain, handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    let done = record(ProgressStage::Done, ProgressStatus::Succeeded, 100.0);
    pipeline.update(backup_id, done).await.unwrap();

    assert!(handler.succeeded.lock().unwrap().is_empty());
    assert_eq!(handler.failed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_failure_notifies_handler() {
    let (pipeline, chain, handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Failed, 40.0)).await.unwrap();

    assert_eq!(handler.failed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn check_stalls_fails_a_job_past_the_timeout_exactly_once() {
    let (pipeline, chain, handler, clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    clock.advance(Duration::from_secs(6 * 60));
    let stalled_first = pipeline.check_stalls().await;
    let stalled_second = pipeline.check_stalls().await;

    assert_eq!(stalled_first, vec![backup_id]);
    assert!(stalled_second.is_empty());
    assert_eq!(handler.failed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn check_stalls_ignores_jobs_with_recent_activity() {
    let (pipeline, chain, handler, clock) = harness();
    let backup_id = create_backup(&chain).await;
    let job_id = sendense_core::JobId::new();
    pipeline.register(backup_id, job_id, false);

    clock.advance(Duration::from_secs(60));
    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 2.0)).await.unwrap();
    clock.advance(Duration::from_secs(60));
    let stalled = pipeline.check_stalls().await;

    assert!(stalled.is_empty());
    assert!(handler.failed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_lazily_registers_from_the_persisted_backup_row() {
    let (pipeline, chain, _handler, _clock) = harness();
    let backup_id = create_backup(&chain).await;

    // No register() call at all: update() must recover via chain.get_backup.
    pipeline.update(backup_id, record(ProgressStage::Transfer, ProgressStatus::Streaming, 3.0)).await.unwrap();

    assert_eq!(chain.get_backup(backup_id).await.unwrap().bytes_transferred, 30);
}

#[tokio::test]
async fn update_on_unknown_backup_is_not_found() {
    let (pipeline, _chain, _handler, _clock) = harness();

    let result = pipeline.update(BackupId::new(), record(ProgressStage::Transfer, ProgressStatus::Streaming, 3.0)).await;

    assert!(matches!(result, Err(OrchestratorError::NotFound)));
}
