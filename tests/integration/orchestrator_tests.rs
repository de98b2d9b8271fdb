//! Crawl loop behavior over scripted fetchers

use crate::common::{
    collaborators, config, config_with_output, orchestrator, orchestrator_with_store, seed, url,
    MockFetcher, Scripted, LAB_PAGE,
};
use lab_scout::crawler::{FetchError, FetchMode, Orchestrator};
use lab_scout::model::RelevanceModel;
use lab_scout::state::{EventLog, RunCheckpoint, RunMonitor, Severity, StopSignal};
use lab_scout::storage::SqliteRecordStore;
use lab_scout::{RunOutcome, RunStatus, Stage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DEPT_PAGE: &str = r#"
<html><head><title>Department</title></head>
<body>
  <a href="/groups/alpha">Research Lab</a>
  <a href="/groups/omega"></a>
</body></html>
"#;

const SHELL_PAGE: &str = r#"
<html><head></head>
<body><div id="root"></div><script src="/static/react.bundle.js"></script></body></html>
"#;

const ONLY_UNIV: &str = "[domains]\nallow = [\"univ.example\"]\n";

fn page_linking_to(path: &str) -> String {
    format!(r#"<html><body><a href="{}">Next</a></body></html>"#, path)
}

#[tokio::test]
async fn test_research_anchor_ranks_above_bare_link() {
    let fetcher = Arc::new(MockFetcher::new().page("https://univ.example/dept", DEPT_PAGE));
    let (mut orchestrator, _store) = orchestrator(config("", ""), fetcher);

    orchestrator
        .initialize(&[seed("https://univ.example/dept")], false)
        .unwrap();
    assert_eq!(orchestrator.step().await.unwrap(), None);

    assert!(orchestrator.visited().contains(&url("https://univ.example/dept")));
    assert_eq!(orchestrator.counters().model_updates, 1);

    let alpha = orchestrator
        .frontier()
        .score_of(&url("https://univ.example/groups/alpha"))
        .unwrap();
    let omega = orchestrator
        .frontier()
        .score_of(&url("https://univ.example/groups/omega"))
        .unwrap();
    assert!(alpha > omega, "alpha {} should outrank omega {}", alpha, omega);
    assert_eq!(
        orchestrator.frontier().peek().unwrap().task.url,
        url("https://univ.example/groups/alpha")
    );
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_the_run() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .respond("https://univ.example/a", Scripted::Fail(FetchError::Timeout))
            .page("https://univ.example/b", LAB_PAGE),
    );
    let (mut orchestrator, store) = orchestrator(config("max-depth = 0", ""), fetcher);

    let report = orchestrator
        .run_with_seeds(
            &[seed("https://univ.example/a"), seed("https://univ.example/b")],
            false,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 2);
    assert_eq!(report.counters.fetch_failures, 1);
    assert_eq!(report.counters.records_inserted, 1);
    assert_eq!(report.counters.model_updates, 2);

    let record = store
        .get_record(&url("https://univ.example/b"))
        .unwrap()
        .unwrap();
    assert_eq!(record.quality, 4);
    assert!(store.get_record(&url("https://univ.example/a")).unwrap().is_none());

    let events = orchestrator.events().since(0).events;
    assert!(events.iter().any(|e| e.severity == Severity::Error
        && e.message.contains("https://univ.example/a")));
    assert!(events
        .iter()
        .any(|e| e.severity == Severity::Success && e.message.contains("https://univ.example/b")));
}

#[tokio::test]
async fn test_slow_fetch_is_cut_off_by_request_timeout() {
    let fetcher = Arc::new(MockFetcher::new().respond(
        "https://univ.example/slow",
        Scripted::Slow(Duration::from_secs(5), LAB_PAGE.to_string()),
    ));
    let (mut orchestrator, store) =
        orchestrator(config("request-timeout-ms = 100", ""), fetcher);

    let started = std::time::Instant::now();
    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/slow")], false)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.counters.fetch_failures, 1);
    assert_eq!(report.counters.model_updates, 1);
    assert_eq!(store.count_records().unwrap(), 0);

    let events = orchestrator.events().since(0).events;
    assert!(events.iter().any(|e| e.message.contains("request timeout")));
}

#[tokio::test]
async fn test_stop_request_finishes_current_task() {
    let stop = StopSignal::new();
    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/a", &page_linking_to("/b"))
            .page("https://univ.example/b", LAB_PAGE)
            .stop_during("https://univ.example/a", stop.clone()),
    );
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());
    let mut orchestrator = orchestrator_with_store(config("", ""), fetcher.clone(), store)
        .with_channels(RunMonitor::new(), EventLog::new(), stop);

    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/a")], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.visited, 1);
    assert_eq!(report.counters.model_updates, 1);
    assert_eq!(report.frontier_remaining, 1);
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn test_link_from_two_parents_is_crawled_once() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/p1", &page_linking_to("/shared"))
            .page("https://univ.example/p2", &page_linking_to("/shared"))
            .page("https://univ.example/shared", LAB_PAGE),
    );
    let (mut orchestrator, _store) =
        orchestrator(config("max-depth = 1", ONLY_UNIV), fetcher.clone());

    let report = orchestrator
        .run_with_seeds(
            &[seed("https://univ.example/p1"), seed("https://univ.example/p2")],
            false,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 3);
    assert_eq!(report.counters.links_enqueued, 1);

    let shared_fetches = fetcher
        .calls()
        .iter()
        .filter(|(u, _)| u == "https://univ.example/shared")
        .count();
    assert_eq!(shared_fetches, 1);
}

#[tokio::test]
async fn test_depth_limit_stops_expansion() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/a", &page_linking_to("/b"))
            .page("https://univ.example/b", &page_linking_to("/c")),
    );
    let (mut orchestrator, _store) = orchestrator(config("max-depth = 1", ""), fetcher.clone());

    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/a")], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 2);
    assert!(!fetcher
        .calls()
        .iter()
        .any(|(u, _)| u == "https://univ.example/c"));
}

#[tokio::test]
async fn test_skip_stored_urls_on_later_runs() {
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());

    let first = Arc::new(MockFetcher::new().page("https://univ.example/lab", LAB_PAGE));
    let mut orchestrator =
        orchestrator_with_store(config("max-depth = 0", ""), first, store.clone());
    orchestrator
        .run_with_seeds(&[seed("https://univ.example/lab")], false)
        .await
        .unwrap();
    assert_eq!(store.count_records().unwrap(), 1);

    let second = Arc::new(MockFetcher::new().page("https://univ.example/lab", LAB_PAGE));
    let mut orchestrator = orchestrator_with_store(
        config("max-depth = 0\nskip-stored = true", ""),
        second.clone(),
        store.clone(),
    );
    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/lab")], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.counters.skipped, 1);
    assert_eq!(report.counters.model_updates, 0);
    assert!(second.calls().is_empty());
}

#[tokio::test]
async fn test_unchanged_page_is_a_duplicate() {
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());

    for expected_duplicates in [0, 1] {
        let fetcher = Arc::new(MockFetcher::new().page("https://univ.example/lab", LAB_PAGE));
        let mut orchestrator =
            orchestrator_with_store(config("max-depth = 0", ""), fetcher, store.clone());
        let report = orchestrator
            .run_with_seeds(&[seed("https://univ.example/lab")], false)
            .await
            .unwrap();
        assert_eq!(report.counters.duplicates, expected_duplicates);
    }

    assert_eq!(store.count_records().unwrap(), 1);
}

#[tokio::test]
async fn test_script_shell_is_escalated_to_rendering() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://spa.example/lab", SHELL_PAGE)
            .rendered("https://spa.example/lab", LAB_PAGE),
    );
    let (mut orchestrator, store) = orchestrator(config("max-depth = 0", ""), fetcher.clone());

    let report = orchestrator
        .run_with_seeds(&[seed("https://spa.example/lab")], false)
        .await
        .unwrap();

    assert_eq!(report.counters.escalations, 1);
    assert_eq!(report.counters.records_inserted, 1);
    assert_eq!(
        fetcher.calls(),
        vec![
            ("https://spa.example/lab".to_string(), FetchMode::Static),
            ("https://spa.example/lab".to_string(), FetchMode::Dynamic),
        ]
    );
    assert!(store.get_record(&url("https://spa.example/lab")).unwrap().is_some());
}

#[tokio::test]
async fn test_escalated_host_renders_directly_next_time() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://spa.example/one", SHELL_PAGE)
            .rendered("https://spa.example/one", &page_linking_to("/two"))
            .rendered("https://spa.example/two", LAB_PAGE),
    );
    let (mut orchestrator, _store) = orchestrator(config("max-depth = 1", ""), fetcher.clone());

    let report = orchestrator
        .run_with_seeds(&[seed("https://spa.example/one")], false)
        .await
        .unwrap();

    assert_eq!(report.counters.escalations, 1);
    assert_eq!(report.counters.records_inserted, 1);
    assert_eq!(
        fetcher.calls().last().unwrap(),
        &("https://spa.example/two".to_string(), FetchMode::Dynamic)
    );
}

#[tokio::test]
async fn test_failed_rendering_keeps_static_content() {
    let fetcher = Arc::new(MockFetcher::new().page("https://spa.example/lab", SHELL_PAGE));
    let (mut orchestrator, _store) = orchestrator(config("max-depth = 0", ""), fetcher);

    let report = orchestrator
        .run_with_seeds(&[seed("https://spa.example/lab")], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.counters.escalations, 1);
    assert_eq!(report.counters.pages_fetched, 1);
    assert_eq!(report.counters.fetch_failures, 0);
    assert_eq!(report.counters.extraction_failures, 1);
}

#[tokio::test]
async fn test_dynamic_host_falls_back_to_static_fetch() {
    let fetcher = Arc::new(MockFetcher::new().page("https://spa.example/lab", LAB_PAGE));
    let (mut orchestrator, store) = orchestrator(
        config(
            "max-depth = 0",
            "[rendering]\ndynamic-hosts = [\"spa.example\"]\n",
        ),
        fetcher.clone(),
    );

    let report = orchestrator
        .run_with_seeds(&[seed("https://spa.example/lab")], false)
        .await
        .unwrap();

    assert_eq!(report.counters.fetch_failures, 0);
    assert_eq!(report.counters.records_inserted, 1);
    assert_eq!(
        fetcher.calls(),
        vec![
            ("https://spa.example/lab".to_string(), FetchMode::Dynamic),
            ("https://spa.example/lab".to_string(), FetchMode::Static),
        ]
    );
    assert!(store.get_record(&url("https://spa.example/lab")).unwrap().is_some());

    let events = orchestrator.events().since(0).events;
    assert!(events
        .iter()
        .any(|e| e.severity == Severity::Warning && e.message.contains("using static fetch")));
}

#[tokio::test]
async fn test_model_snapshot_carries_over_between_runs() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("model.msgpack");
    let model_section = format!("[model]\nsnapshot-path = {:?}\n", snapshot.to_str().unwrap());

    let fetcher = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/a", LAB_PAGE)
            .page("https://univ.example/b", DEPT_PAGE),
    );
    let (mut first, _store) =
        orchestrator(config("max-depth = 0", &model_section), fetcher.clone());
    let report = first
        .run_with_seeds(
            &[seed("https://univ.example/a"), seed("https://univ.example/b")],
            false,
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let saved = RelevanceModel::load(&snapshot).unwrap();
    assert_eq!(saved.updates(), 2);
    assert_eq!(&saved, first.model());

    let (mut next, _store) = orchestrator(config("max-depth = 0", &model_section), fetcher);
    next.initialize(&[], false).unwrap();
    assert_eq!(next.model().updates(), 2);
}

#[tokio::test]
async fn test_resume_continues_interrupted_frontier() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint");
    let checkpoint_key = format!("checkpoint-path = {:?}", checkpoint.to_str().unwrap());

    let first = Arc::new(MockFetcher::new().page("https://univ.example/dept", DEPT_PAGE));
    let mut orchestrator = Orchestrator::new(
        config_with_output("max-pages = 1", &checkpoint_key, ONLY_UNIV),
        collaborators(first, Arc::new(SqliteRecordStore::new_in_memory().unwrap())),
    );
    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/dept")], false)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::LimitReached);
    assert_eq!(report.frontier_remaining, 2);

    let saved = RunCheckpoint::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.visited, vec!["https://univ.example/dept".to_string()]);
    assert_eq!(saved.frontier.len(), 2);

    let second = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/dept", DEPT_PAGE)
            .page("https://univ.example/groups/alpha", LAB_PAGE),
    );
    let mut resumed = Orchestrator::new(
        config_with_output("max-pages = 10", &checkpoint_key, ONLY_UNIV),
        collaborators(
            second.clone(),
            Arc::new(SqliteRecordStore::new_in_memory().unwrap()),
        ),
    );
    let report = resumed
        .run_with_seeds(&[seed("https://univ.example/dept")], true)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 3);
    assert_eq!(report.counters.records_inserted, 1);
    assert!(!second
        .calls()
        .iter()
        .any(|(u, _)| u == "https://univ.example/dept"));
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn test_periodic_checkpoint_includes_queued_children() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint");
    let checkpoint_key = format!("checkpoint-path = {:?}", checkpoint.to_str().unwrap());
    let sections = format!("{}\n[model]\ncheckpoint-every = 1\n", ONLY_UNIV);

    let fetcher = Arc::new(MockFetcher::new().page("https://univ.example/dept", DEPT_PAGE));
    let mut orchestrator = Orchestrator::new(
        config_with_output("", &checkpoint_key, &sections),
        collaborators(fetcher, Arc::new(SqliteRecordStore::new_in_memory().unwrap())),
    );
    orchestrator
        .initialize(&[seed("https://univ.example/dept")], false)
        .unwrap();
    assert_eq!(orchestrator.step().await.unwrap(), None);
    assert_eq!(orchestrator.frontier().len(), 2);

    let saved = RunCheckpoint::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.visited, vec!["https://univ.example/dept".to_string()]);
    let mut queued: Vec<&str> = saved.frontier.iter().map(|e| e.url.as_str()).collect();
    queued.sort();
    assert_eq!(
        queued,
        vec![
            "https://univ.example/groups/alpha",
            "https://univ.example/groups/omega"
        ]
    );
}

#[tokio::test]
async fn test_resumed_run_gets_its_own_page_budget() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("run.checkpoint");
    let checkpoint_key = format!("checkpoint-path = {:?}", checkpoint.to_str().unwrap());

    let first = Arc::new(MockFetcher::new().page("https://univ.example/dept", DEPT_PAGE));
    let mut orchestrator = Orchestrator::new(
        config_with_output("max-pages = 1", &checkpoint_key, ONLY_UNIV),
        collaborators(first, Arc::new(SqliteRecordStore::new_in_memory().unwrap())),
    );
    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/dept")], false)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::LimitReached);

    let second = Arc::new(
        MockFetcher::new()
            .page("https://univ.example/groups/alpha", LAB_PAGE)
            .page("https://univ.example/groups/omega", LAB_PAGE),
    );
    let mut resumed = Orchestrator::new(
        config_with_output("max-pages = 1", &checkpoint_key, ONLY_UNIV),
        collaborators(
            second.clone(),
            Arc::new(SqliteRecordStore::new_in_memory().unwrap()),
        ),
    );
    let report = resumed.run_with_seeds(&[], true).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::LimitReached);
    assert_eq!(report.visited, 2);
    assert_eq!(report.frontier_remaining, 1);
    assert_eq!(second.calls().len(), 1);
}

#[tokio::test]
async fn test_hash_bang_routes_are_rendered() {
    let home = r##"<html><body>
        <a href="#!/labs/optics">Optics Lab</a>
        <a href="#!/labs/robotics">Robotics Lab</a>
        <a href="#top">Top</a>
    </body></html>"##;
    let fetcher = Arc::new(
        MockFetcher::new()
            .rendered("https://spa.example/#!/home", home)
            .rendered("https://spa.example/#!/labs/optics", LAB_PAGE)
            .rendered("https://spa.example/#!/labs/robotics", LAB_PAGE),
    );
    let (mut orchestrator, store) = orchestrator(config("max-depth = 1", ""), fetcher.clone());

    let report = orchestrator
        .run_with_seeds(&[seed("https://www.spa.example/#!/home")], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.visited, 3);
    assert_eq!(report.counters.links_enqueued, 2);
    for route in ["#!/labs/optics", "#!/labs/robotics"] {
        let lab = url(&format!("https://spa.example/{}", route));
        assert!(store.get_record(&lab).unwrap().is_some(), "no record for {}", lab);
    }

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        ("https://spa.example/#!/home".to_string(), FetchMode::Dynamic)
    );
    assert!(calls.iter().all(|(_, mode)| *mode == FetchMode::Dynamic));
}

#[tokio::test]
async fn test_model_error_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("model.msgpack");
    let model_section = format!("[model]\nsnapshot-path = {:?}\n", snapshot.to_str().unwrap());

    let fetcher = Arc::new(MockFetcher::new().page("https://univ.example/lab", LAB_PAGE));
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());
    let mut orchestrator =
        orchestrator_with_store(config("max-depth = 0", &model_section), fetcher, store.clone())
            .with_model(RelevanceModel::with_layout(
                vec!["a".into()],
                vec![1.0],
                0.0,
                0.1,
            ));

    let result = orchestrator
        .run_with_seeds(&[seed("https://univ.example/lab")], false)
        .await;

    assert!(result.is_err());
    assert!(matches!(orchestrator.outcome(), Some(RunOutcome::Failed(_))));
    assert_eq!(orchestrator.stage(), Stage::Stopped);
    assert_eq!(orchestrator.monitor().snapshot().status, RunStatus::Stopped);
    assert!(!snapshot.exists());

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, "failed");

    let events = orchestrator.events().since(0).events;
    assert!(events
        .iter()
        .any(|e| e.severity == Severity::Error && e.message.starts_with("Run failed")));
}

#[tokio::test]
async fn test_url_words_do_not_set_event_severity() {
    let fetcher = Arc::new(
        MockFetcher::new().page("https://univ.example/failed-materials-lab", LAB_PAGE),
    );
    let (mut orchestrator, _store) = orchestrator(config("max-depth = 0", ""), fetcher);

    orchestrator
        .run_with_seeds(&[seed("https://univ.example/failed-materials-lab")], false)
        .await
        .unwrap();

    let events = orchestrator.events().since(0).events;
    assert!(events.iter().any(|e| e.severity == Severity::Success
        && e.message.starts_with("Stored lab record")));
    assert!(!events.iter().any(|e| e.severity == Severity::Error));
}

#[tokio::test]
async fn test_run_is_recorded_in_store() {
    let fetcher = Arc::new(MockFetcher::new().page("https://univ.example/lab", LAB_PAGE));
    let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());
    let mut orchestrator =
        orchestrator_with_store(config("max-depth = 0", ""), fetcher, store.clone())
            .with_config_hash("abc123");

    let report = orchestrator
        .run_with_seeds(&[seed("https://univ.example/lab")], false)
        .await
        .unwrap();

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(Some(run.id), report.run_id);
    assert_eq!(run.config_hash, "abc123");
    assert_eq!(run.status, "completed");
    assert_eq!(run.pages_visited, 1);
    assert_eq!(run.records_stored, 1);
    assert!(run.finished_at.is_some());

    let record = store
        .get_record(&url("https://univ.example/lab"))
        .unwrap()
        .unwrap();
    assert_eq!(record.first_run, report.run_id);
}
