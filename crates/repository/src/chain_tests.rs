use super::*;
use crate::local_fs::LocalFsRepository;
use parking_lot::Mutex as SyncMutex;
use sendense_core::{BackupType, DiskIndex, RepositoryId, VmContextId};
use sendense_storage::{MaterializedState, Wal};
use std::sync::Arc;
use tempfile::tempdir;

fn manager(root: &std::path::Path, wal_dir: &std::path::Path, max_chain_depth: u32) -> (ChainManager, RepositoryId) {
    let repository_id = RepositoryId::new();
    let driver = Arc::new(LocalFsRepository::new(root));
    let mut repos = HashMap::new();
    repos.insert(
        repository_id,
        RepositoryHandle {
            driver,
            root: root.to_path_buf(),
        },
    );
    let state = Arc::new(SyncMutex::new(MaterializedState::default()));
    let wal = Arc::new(SyncMutex::new(Wal::open(wal_dir.join("wal.log"), 0).unwrap()));
    (ChainManager::new(state, wal, repos, max_chain_depth), repository_id)
}

fn req(vm: VmContextId, disk: DiskIndex, repo: RepositoryId, backup_type: BackupType) -> CreateBackupRequest {
    CreateBackupRequest {
        vm_context_id: vm,
        disk_index: disk,
        repository_id: repo,
        backup_type,
        policy_id: None,
        previous_change_id: None,
        total_bytes: 4096,
    }
}

#[tokio::test]
async fn create_backup_full_has_no_parent_and_lands_pending() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let backup = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();

    assert_eq!(backup.status, BackupStatus::Pending);
    assert_eq!(backup.parent_backup_id, None);
    assert!(std::path::Path::new(&backup.file_path).exists());
}

#[tokio::test]
async fn create_backup_incremental_without_chain_is_no_parent() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let result = mgr.create_backup(req(vm, disk, repo_id, BackupType::Incremental)).await;

    assert!(matches!(result, Err(RepositoryError::NoParent)));
}

#[tokio::test]
async fn create_backup_rejects_second_in_flight_job_for_same_disk() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    let result = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await;

    assert!(matches!(result, Err(RepositoryError::Conflict)));
}

#[tokio::test]
async fn finalize_then_incremental_create_links_backing_and_change_id() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.finalize_backup(full.id, "cid-1".into(), 4096).await.unwrap();

    let incr = mgr.create_backup(req(vm, disk, repo_id, BackupType::Incremental)).await.unwrap();

    assert_eq!(incr.parent_backup_id, Some(full.id));
    assert_eq!(incr.prev_change_id, Some("cid-1".into()));

    let chain = mgr.get_chain(vm, disk, repo_id).await.unwrap();
    assert_eq!(chain.root_backup_id, full.id);
    assert_eq!(chain.length, 1);
}

#[tokio::test]
async fn create_backup_respects_chain_depth_cap() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 1);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.finalize_backup(full.id, "cid-1".into(), 4096).await.unwrap();

    let result = mgr.create_backup(req(vm, disk, repo_id, BackupType::Incremental)).await;

    assert!(matches!(result, Err(RepositoryError::ChainFull)));
}

#[tokio::test]
async fn finalize_backup_is_idempotent_for_repeat_calls() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.finalize_backup(full.id, "cid-1".into(), 4096).await.unwrap();
    mgr.finalize_backup(full.id, "cid-2".into(), 9999).await.unwrap();

    let row = mgr.get_backup(full.id).await.unwrap();
    assert_eq!(row.new_change_id, Some("cid-1".into()));
}

#[tokio::test]
async fn fail_backup_deletes_the_image_file() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let backup = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.fail_backup(backup.id, "agent unreachable".into()).await.unwrap();

    let row = mgr.get_backup(backup.id).await.unwrap();
    assert_eq!(row.status, BackupStatus::Failed);
    assert!(!std::path::Path::new(&row.file_path).exists());
    assert!(mgr.orphan_images().is_empty());
}

#[tokio::test]
async fn delete_backup_rejects_non_tail_succeeded_job() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.finalize_backup(full.id, "cid-1".into(), 4096).await.unwrap();
    let incr = mgr.create_backup(req(vm, disk, repo_id, BackupType::Incremental)).await.unwrap();
    mgr.finalize_backup(incr.id, "cid-2".into(), 4096).await.unwrap();

    let result = mgr.delete_backup(full.id).await;

    assert!(matches!(result, Err(RepositoryError::NotTail)));
}

#[tokio::test]
async fn delete_backup_allows_a_failed_job_regardless_of_position() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.fail_backup(full.id, "boom".into()).await.unwrap();

    mgr.delete_backup(full.id).await.unwrap();
}

#[tokio::test]
async fn create_backup_rejects_zero_total_bytes() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);
    let mut request = req(vm, disk, repo_id, BackupType::Full);
    request.total_bytes = 0;

    let result = mgr.create_backup(request).await;

    assert!(matches!(result, Err(RepositoryError::InvalidInput(_))));
}

#[tokio::test]
async fn create_backup_reports_unavailable_for_unknown_repository() {
    let dir = tempdir().unwrap();
    let (mgr, _repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let result = mgr.create_backup(req(vm, disk, RepositoryId::new(), BackupType::Full)).await;

    assert!(matches!(result, Err(RepositoryError::RepositoryUnavailable(_))));
}

#[tokio::test]
async fn update_progress_is_visible_but_not_persisted_past_terminal() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    mgr.update_progress(full.id, 1024).await.unwrap();
    assert_eq!(mgr.get_backup(full.id).await.unwrap().bytes_transferred, 1024);

    mgr.finalize_backup(full.id, "cid-1".into(), 4096).await.unwrap();
    mgr.update_progress(full.id, 2048).await.unwrap();

    assert_eq!(mgr.get_backup(full.id).await.unwrap().bytes_transferred, 4096);
}

#[tokio::test]
async fn assign_export_name_is_visible_on_the_job_row() {
    let dir = tempdir().unwrap();
    let (mgr, repo_id) = manager(dir.path(), dir.path(), 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let full = mgr.create_backup(req(vm, disk, repo_id, BackupType::Full)).await.unwrap();
    assert_eq!(full.export_name, None);

    mgr.assign_export_name(full.id, "backup-vmc-disk0-abcd1234".to_string()).await.unwrap();

    assert_eq!(
        mgr.get_backup(full.id).await.unwrap().export_name,
        Some("backup-vmc-disk0-abcd1234".to_string())
    );
}

#[tokio::test]
async fn assign_export_name_unknown_backup_is_not_found() {
    let dir = tempdir().unwrap();
    let (mgr, _repo_id) = manager(dir.path(), dir.path(), 64);

    let result = mgr.assign_export_name(sendense_core::BackupId::new(), "backup-x".to_string()).await;

    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn create_backup_rejects_below_hard_free_space_floor() {
    let dir = tempdir().unwrap();
    let repository_id = RepositoryId::new();
    let driver = Arc::new(LocalFsRepository::new(dir.path()));
    let mut repos = HashMap::new();
    repos.insert(
        repository_id,
        RepositoryHandle {
            driver,
            root: dir.path().to_path_buf(),
        },
    );
    let state = Arc::new(SyncMutex::new(MaterializedState::default()));
    let wal = Arc::new(SyncMutex::new(Wal::open(dir.path().join("wal.log"), 0).unwrap()));
    let mgr = ChainManager::new(state, wal, repos, 64).with_min_free_bytes_hard(u64::MAX);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);

    let result = mgr.create_backup(req(vm, disk, repository_id, BackupType::Full)).await;

    assert!(matches!(result, Err(RepositoryError::RepositoryUnavailable(_))));
}
