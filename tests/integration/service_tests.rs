//! Run service lifecycle with a live background run

use crate::common::{collaborators, config, seed, MockFetcher, Scripted, LAB_PAGE};
use lab_scout::crawler::{CrawlService, StartAck, StartRequest, StopAck};
use lab_scout::state::Severity;
use lab_scout::storage::SqliteRecordStore;
use lab_scout::{RunOutcome, RunStatus};
use std::sync::Arc;
use std::time::Duration;

fn slow_service() -> CrawlService {
    let fetcher = Arc::new(
        MockFetcher::new()
            .respond(
                "https://univ.example/a",
                Scripted::Slow(Duration::from_millis(300), LAB_PAGE.to_string()),
            )
            .page("https://univ.example/b", LAB_PAGE),
    );
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());
    CrawlService::new(config("max-depth = 0", ""), collaborators(fetcher, store))
        .with_config_hash("test-hash")
}

fn request() -> StartRequest {
    StartRequest {
        seeds: vec![seed("https://univ.example/a"), seed("https://univ.example/b")],
        resume: false,
    }
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let service = slow_service();

    assert_eq!(service.start(request()).unwrap(), StartAck::Started);
    assert!(service.is_running());
    assert_eq!(service.start(request()).unwrap(), StartAck::AlreadyRunning);

    let report = service.wait().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 2);
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_stop_halts_after_task_in_flight() {
    let service = slow_service();
    service.start(request()).unwrap();

    // Let the run select its first task
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(service.stop(), StopAck::Stopping);
    assert_eq!(service.stop(), StopAck::Stopping);
    assert_eq!(service.status().status, RunStatus::Stopping);

    let report = service.wait().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.visited, 1);
    assert_eq!(report.counters.model_updates, 1);
    assert_eq!(report.frontier_remaining, 1);

    let status = service.status();
    assert_eq!(status.status, RunStatus::Stopped);
    assert_eq!(status.outcome, Some(RunOutcome::Halted));
    assert_eq!(service.stop(), StopAck::NotRunning);
}

#[tokio::test]
async fn test_service_can_start_again_after_a_run() {
    let service = slow_service();

    service.start(request()).unwrap();
    service.stop();
    assert_eq!(service.wait().await.unwrap().outcome, RunOutcome::Halted);

    assert_eq!(service.start(request()).unwrap(), StartAck::Started);
    let report = service.wait().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_log_cursor_only_returns_new_events() {
    let service = slow_service();
    service.start(request()).unwrap();
    service.wait().await.unwrap();

    let first = service.logs_since(0);
    assert!(!first.events.is_empty());
    assert_eq!(first.missed, 0);
    assert_eq!(first.events[0].seq, 0);
    assert!(first
        .events
        .iter()
        .any(|e| e.severity == Severity::Success && e.message.starts_with("Run completed")));

    let again = service.logs_since(first.next_cursor);
    assert!(again.events.is_empty());
    assert_eq!(again.next_cursor, first.next_cursor);

    for pair in first.events.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
    }
}
