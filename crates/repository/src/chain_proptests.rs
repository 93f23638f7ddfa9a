//! Property tests for the chain invariants: a randomized
//! sequence of create/finalize/fail/delete calls against a single
//! `(vm, disk, repository)` must never leave the chain in a state that
//! violates linkage, in-flight exclusivity, or acyclicity, no matter the
//! order proptest picks.

use super::*;
use crate::local_fs::LocalFsRepository;
use proptest::prelude::*;
use sendense_storage::{MaterializedState, Wal};
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Debug, Clone, Copy)]
enum Op {
    CreateFull,
    CreateIncremental,
    FinalizeLast,
    FailLast,
    DeleteLast,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::CreateFull),
        3 => Just(Op::CreateIncremental),
        4 => Just(Op::FinalizeLast),
        2 => Just(Op::FailLast),
        2 => Just(Op::DeleteLast),
    ]
}

/// Runs `ops` against a fresh manager, asserting invariants after each step.
/// `last` tracks the most recently created backup id so `FinalizeLast` /
/// `FailLast` / `DeleteLast` have something to act on; ops that don't apply
/// to the current state (e.g. finalizing when nothing is pending) are no-ops,
/// since the point is to explore reachable states, not to reject inputs.
async fn run(ops: &[Op]) {
    let dir = tempdir().unwrap();
    let repository_id = RepositoryId::new();
    let driver = Arc::new(LocalFsRepository::new(dir.path()));
    let mut repos = HashMap::new();
    repos.insert(repository_id, RepositoryHandle { driver, root: dir.path().to_path_buf() });
    let state = Arc::new(SyncMutex::new(MaterializedState::default()));
    let wal = Arc::new(SyncMutex::new(Wal::open(dir.path().join("wal.log"), 0).unwrap()));
    let mgr = ChainManager::new(state, wal, repos, 64);
    let vm = VmContextId::new();
    let disk = DiskIndex::new(0);
    let mut last: Option<BackupId> = None;

    for op in ops {
        match op {
            Op::CreateFull => {
                if let Ok(job) = mgr
                    .create_backup(CreateBackupRequest {
                        vm_context_id: vm,
                        disk_index: disk,
                        repository_id,
                        backup_type: BackupType::Full,
                        policy_id: None,
                        previous_change_id: None,
                        total_bytes: 4096,
                    })
                    .await
                {
                    last = Some(job.id);
                }
            }
            Op::CreateIncremental => {
                if let Ok(job) = mgr
                    .create_backup(CreateBackupRequest {
                        vm_context_id: vm,
                        disk_index: disk,
                        repository_id,
                        backup_type: BackupType::Incremental,
                        policy_id: None,
                        previous_change_id: None,
                        total_bytes: 4096,
                    })
                    .await
                {
                    last = Some(job.id);
                }
            }
            Op::FinalizeLast => {
                if let Some(id) = last {
                    let _ = mgr.finalize_backup(id, format!("cid-{id}"), 4096).await;
                }
            }
            Op::FailLast => {
                if let Some(id) = last {
                    let _ = mgr.fail_backup(id, "proptest induced failure".into()).await;
                }
            }
            Op::DeleteLast => {
                if let Some(id) = last {
                    let _ = mgr.delete_backup(id).await;
                }
            }
        }

        assert_invariants(&mgr, vm, disk, repository_id).await;
    }
}

/// Invariant 1 (incremental linkage): every job with a parent points at a
/// parent that exists, is `Succeeded`, and whose `new_change_id` matches the
/// child's `prev_change_id`.
/// Invariant 2 (in-flight exclusivity): at most one pending/running job per
/// `(vm, disk)`.
/// Invariant 3 (chain acyclicity/reachability): walking `parent_backup_id`
/// from the chain's `latest_backup_id` reaches `root_backup_id` in exactly
/// `chain.length` hops, and never revisits a backup id.
async fn assert_invariants(mgr: &ChainManager, vm: VmContextId, disk: DiskIndex, repo: RepositoryId) {
    let state = mgr.state.lock();

    let in_flight = state
        .backup_jobs
        .values()
        .filter(|job| job.vm_context_id == vm && job.disk_index == disk && job.status.is_in_flight())
        .count();
    assert!(in_flight <= 1, "more than one in-flight job for the same disk: {in_flight}");

    for job in state.backup_jobs.values() {
        if let Some(parent_id) = job.parent_backup_id {
            let parent = state.backup_jobs.get(&parent_id).expect("parent backup row must exist");
            assert_eq!(parent.status, BackupStatus::Succeeded, "parent of {} is not succeeded", job.id);
            assert_eq!(
                job.prev_change_id, parent.new_change_id,
                "child {}'s prev_change_id doesn't match parent {}'s new_change_id",
                job.id, parent.id
            );
        }
    }

    if let Some(chain) = state.get_chain(vm, disk, repo) {
        let mut seen = std::collections::HashSet::new();
        let mut cursor = Some(chain.latest_backup_id);
        let mut hops = 0u32;
        while let Some(id) = cursor {
            assert!(seen.insert(id), "cycle detected in chain walk at {id}");
            let job = state.backup_jobs.get(&id).expect("chain-referenced backup row must exist");
            if id == chain.root_backup_id {
                break;
            }
            cursor = job.parent_backup_id;
            hops += 1;
            assert!(hops <= chain.length + 1, "chain walk exceeded recorded length {}", chain.length);
        }
        assert_eq!(cursor, Some(chain.root_backup_id), "chain walk never reached its recorded root");
        assert_eq!(hops, chain.length, "chain walk hop count didn't match recorded length");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chain_invariants_hold_across_random_op_sequences(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        tokio::runtime::Runtime::new().unwrap().block_on(run(&ops));
    }
}
