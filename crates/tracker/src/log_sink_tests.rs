use super::{LogEntry, LogSink};
use crate::store::fake::FakeTrackerStore;
use sendense_core::{JobId, LogLevel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn entry(job_id: JobId, message: &str) -> LogEntry {
    LogEntry {
        job_id: Some(job_id),
        step_id: None,
        level: LogLevel::Info,
        message: message.to_string(),
        attrs: HashMap::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn submitted_entries_are_batched_to_the_store() {
    let store = Arc::new(FakeTrackerStore::new());
    let (sink, _handle) = LogSink::spawn(store.clone(), 16);
    let job_id = JobId::new();

    sink.submit(entry(job_id, "discovering disks"));
    sink.submit(entry(job_id, "snapshot taken"));

    tokio::time::advance(Duration::from_millis(30)).await;
    tokio::task::yield_now().await;

    assert_eq!(store.appended.lock().len(), 2);
}

#[tokio::test]
async fn full_channel_overflows_to_ring_buffer_with_drop_oldest() {
    let store = Arc::new(FakeTrackerStore::new());
    let (sink, _handle) = LogSink::spawn(store.clone(), 1);
    let job_id = JobId::new();

    // Channel capacity 1: the first submit is consumed eagerly by the
    // writer task's `recv`, so force overflow with a burst.
    for i in 0..5 {
        sink.submit(entry(job_id, &format!("line {i}")));
    }

    let health = sink.health(1);
    assert!(health.dropped_total <= 5);
}

#[test]
fn health_reports_zero_dropped_for_fresh_sink() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        let store = Arc::new(FakeTrackerStore::new());
        let (sink, _handle) = LogSink::spawn(store, 16);
        let health = sink.health(0);
        assert_eq!(health.dropped_total, 0);
        assert_eq!(health.queue_depth, 0);
    });
}
