use super::fake::FakeTrackerStore;
use super::{NewJob, NewStep, TrackerStore};
use chrono::Utc;
use sendense_core::{JobId, StepId, TrackerStatus};
use std::collections::HashMap;
use yare::parameterized;

fn new_job(job_id: JobId) -> NewJob {
    NewJob {
        job_id,
        parent_id: None,
        job_type: "backup".into(),
        operation: "replicate".into(),
        owner: Some("orchestrator".into()),
        metadata: HashMap::new(),
    }
}

#[test]
fn create_job_is_queryable_as_running() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    assert_eq!(store.job_status(job_id), Some(TrackerStatus::Running));
}

#[test]
fn end_job_transitions_to_terminal_status() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    store
        .end_job(job_id, TrackerStatus::Succeeded, None, Utc::now())
        .unwrap();
    assert_eq!(store.job_status(job_id), Some(TrackerStatus::Succeeded));
}

#[test]
fn end_job_twice_errors_already_terminal() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    store
        .end_job(job_id, TrackerStatus::Succeeded, None, Utc::now())
        .unwrap();
    let result = store.end_job(job_id, TrackerStatus::Failed, None, Utc::now());
    assert!(matches!(result, Err(crate::error::TrackerError::AlreadyTerminal)));
}

#[test]
fn end_job_unknown_errors_not_found() {
    let store = FakeTrackerStore::new();
    let result = store.end_job(JobId::new(), TrackerStatus::Succeeded, None, Utc::now());
    assert!(matches!(result, Err(crate::error::TrackerError::NotFound)));
}

#[test]
fn next_step_seq_starts_at_one_and_increments() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    assert_eq!(store.next_step_seq(job_id), 1);
    store
        .create_step(
            NewStep {
                step_id: StepId::new(),
                job_id,
                seq: 1,
                name: "discover".into(),
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(store.next_step_seq(job_id), 2);
}

#[parameterized(
    below_range = { -1.0 },
    above_range = { 101.0 },
)]
fn set_job_progress_rejects_out_of_range(percent: f64) {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    let result = store.set_job_progress(job_id, percent);
    assert!(matches!(result, Err(crate::error::TrackerError::InvalidInput(_))));
}

#[test]
fn set_job_progress_is_readable_via_manual_percent() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();
    store.set_job_progress(job_id, 42.5).unwrap();
    assert_eq!(store.manual_percent(job_id), Some(42.5));
}

#[test]
fn step_counts_tally_by_status() {
    let store = FakeTrackerStore::new();
    let job_id = JobId::new();
    store.create_job(new_job(job_id), Utc::now()).unwrap();

    let done = StepId::new();
    store
        .create_step(
            NewStep {
                step_id: done,
                job_id,
                seq: 1,
                name: "discover".into(),
            },
            Utc::now(),
        )
        .unwrap();
    store
        .end_step(done, TrackerStatus::Succeeded, None, Utc::now())
        .unwrap();

    let running = StepId::new();
    store
        .create_step(
            NewStep {
                step_id: running,
                job_id,
                seq: 2,
                name: "transfer".into(),
            },
            Utc::now(),
        )
        .unwrap();

    let counts = store.step_counts(job_id).unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.running, 1);
    assert_eq!(counts.failed, 0);
}

#[test]
fn step_counts_none_for_unknown_job() {
    let store = FakeTrackerStore::new();
    assert!(store.step_counts(JobId::new()).is_none());
}
