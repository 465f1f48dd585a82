use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use aiaaic_common::{Incident, ScrapingError, SourceLink};
use aiaaic_ledger::RecordStore;
use aiaaic_scout::testing::{
    detail_url, incident, incident_page, incident_without_url, FixtureSource, MockFetcher,
    RecordingObserver,
};
use aiaaic_scout::{
    CancelFlag, IncidentResult, IncidentStatus, RetryPolicy, ScrapeMode, ScrapeObserver, Scraper,
};
use tempfile::TempDir;

const NARRATIVE: &str = "A recruitment screening tool ranked applicants lower when their CVs mentioned women's colleges or clubs.";

struct Harness {
    _dir: TempDir,
    store: Arc<RecordStore>,
    fetcher: Arc<MockFetcher>,
    observer: Arc<RecordingObserver>,
}

impl Harness {
    fn new(fetcher: MockFetcher) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::in_dir(dir.path()));
        Self {
            _dir: dir,
            store,
            fetcher: Arc::new(fetcher),
            observer: Arc::new(RecordingObserver::new()),
        }
    }

    fn scraper(&self) -> Scraper {
        Scraper::new(self.fetcher.clone(), self.store.clone())
            .with_retry_policy(RetryPolicy::immediate(3))
            .with_observer(self.observer.clone())
            .with_concurrency(4)
    }

    fn records_for(&self, id: &str) -> Vec<Incident> {
        self.store
            .incidents()
            .unwrap()
            .into_iter()
            .filter(|i| i.aiaaic_id == id)
            .collect()
    }
}

fn page_for(id: &str) -> String {
    incident_page(NARRATIVE, &format!("https://news.example.com/{}", id.to_lowercase()))
}

fn fetcher_with_pages(ids: &[&str]) -> MockFetcher {
    ids.iter().fold(MockFetcher::new(), |f, id| {
        f.on_page(&detail_url(id), page_for(id))
    })
}

fn complete_record(id: &str) -> Incident {
    let mut record = incident(id);
    record.page_scraped = true;
    record.description = Some("An older description of the incident.".into());
    record.source_links = vec![SourceLink {
        url: "https://old.example.com/story".into(),
        title: None,
    }];
    record
}

fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// --- Scenario properties ---

#[tokio::test]
async fn targeted_rescrape_replaces_existing_record() {
    let h = Harness::new(fetcher_with_pages(&["X001", "X002"]));
    h.store.append_incident(&complete_record("X001")).unwrap();

    let report = h
        .scraper()
        .run(
            vec![incident("X001"), incident("X002")],
            &ScrapeMode::Targeted(ids(&["X001"])),
            None,
        )
        .await
        .unwrap();

    let records = h.records_for("X001");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].description.as_deref(), Some(NARRATIVE));
    assert_eq!(records[0].source_links[0].url, "https://news.example.com/x001");
    assert_eq!(records[0].page_published.as_deref(), Some("March 2024"));
    assert!(records[0].page_scraped);

    assert_eq!(h.fetcher.calls(&detail_url("X002")), 0);
    assert_eq!(report.stats.successful, 1);
}

#[tokio::test]
async fn rate_limited_fetch_recovers_within_schedule() {
    let url = detail_url("R001");
    let h = Harness::new(MockFetcher::new().on_sequence(
        &url,
        vec![Err(429), Err(429), Ok(page_for("R001"))],
    ));

    let report = h
        .scraper()
        .run(vec![incident("R001")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    assert_eq!(h.fetcher.calls(&url), 3);
    assert_eq!(h.store.incidents().unwrap().len(), 1);
    assert!(h.store.errors().unwrap().is_empty());
    assert_eq!(report.stats.failed, 0);
    assert!(!report.is_degraded());
}

#[tokio::test]
async fn not_found_is_recorded_unscraped_without_error() {
    let h = Harness::new(MockFetcher::new().on_status(&detail_url("G001"), 404));

    let report = h
        .scraper()
        .run(vec![incident("G001")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    let records = h.records_for("G001");
    assert_eq!(records.len(), 1);
    assert!(!records[0].page_scraped);
    assert!(records[0].description.is_none());
    assert!(h.store.errors().unwrap().is_empty());
    assert_eq!(report.stats.successful, 1);
    assert_eq!(h.observer.status_of("G001"), Some(IncidentStatus::NotFound));
}

// --- Per-incident outcomes ---

#[tokio::test]
async fn missing_url_is_recorded_without_fetching() {
    let h = Harness::new(MockFetcher::new());

    let report = h
        .scraper()
        .run(vec![incident_without_url("N001")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    assert_eq!(h.fetcher.total_calls(), 0);
    let records = h.records_for("N001");
    assert_eq!(records.len(), 1);
    assert!(!records[0].page_scraped);
    assert_eq!(report.stats.no_url, 1);
    assert_eq!(report.stats.successful, 1);
    assert_eq!(report.stats.failed, 0);
}

#[tokio::test]
async fn server_error_logs_exactly_one_error() {
    let url = detail_url("F001");
    let h = Harness::new(MockFetcher::new().on_status(&url, 500));

    let report = h
        .scraper()
        .run(vec![incident("F001")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    let errors = h.store.errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].aiaaic_id, "F001");
    assert_eq!(errors[0].error_type, "http_status");
    assert_eq!(errors[0].url.as_deref(), Some(url.as_str()));
    assert!(h.store.incidents().unwrap().is_empty());
    assert_eq!(h.fetcher.calls(&url), 1);
    assert!(report.is_degraded());
}

#[tokio::test]
async fn timeouts_exhaust_schedule_then_fail() {
    let url = detail_url("T001");
    let h = Harness::new(MockFetcher::new().on_timeout(&url));

    h.scraper()
        .run(vec![incident("T001")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    assert_eq!(h.fetcher.calls(&url), 3);
    let errors = h.store.errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, "timeout");
}

#[tokio::test]
async fn one_failure_does_not_affect_the_batch() {
    let fetcher = fetcher_with_pages(&["B001", "B003"]).on_status(&detail_url("B002"), 500);
    let h = Harness::new(fetcher);

    let report = h
        .scraper()
        .run(
            vec![
                incident("B001"),
                incident("B002"),
                incident("B003"),
                incident_without_url("B004"),
            ],
            &ScrapeMode::Resume,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.stats.total, 4);
    assert_eq!(report.stats.processed, 4);
    assert_eq!(report.stats.successful, 3);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.descriptions_found, 2);
    assert_eq!(report.stats.source_links_found, 2);
    assert_eq!(h.store.incidents().unwrap().len(), 3);
    assert_eq!(h.store.errors().unwrap().len(), 1);
    assert_eq!(h.observer.results().len(), 4);
    assert_eq!(h.observer.progress(), 4);
    assert!(matches!(
        h.observer.status_of("B002"),
        Some(IncidentStatus::Failed { .. })
    ));
}

// --- Modes ---

#[tokio::test]
async fn resume_skips_ids_already_in_ledger() {
    let h = Harness::new(fetcher_with_pages(&["A", "B"]));
    h.store.append_incident(&complete_record("A")).unwrap();

    let report = h
        .scraper()
        .run(vec![incident("A"), incident("B")], &ScrapeMode::Resume, None)
        .await
        .unwrap();

    assert_eq!(h.fetcher.calls(&detail_url("A")), 0);
    assert_eq!(h.fetcher.calls(&detail_url("B")), 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.total, 1);
}

#[tokio::test]
async fn force_scrapes_everything_without_purging() {
    let h = Harness::new(fetcher_with_pages(&["A"]));
    h.store.append_incident(&complete_record("A")).unwrap();

    h.scraper()
        .run(vec![incident("A")], &ScrapeMode::Force, None)
        .await
        .unwrap();

    assert_eq!(h.records_for("A").len(), 2);
}

#[tokio::test]
async fn retry_errors_purges_then_rescrapes_failed_ids() {
    let h = Harness::new(fetcher_with_pages(&["A", "B", "C"]));
    h.store.append_incident(&complete_record("A")).unwrap();
    h.store.append_incident(&incident("B")).unwrap();
    h.store
        .append_error(&ScrapingError::new(
            "B",
            Some(detail_url("B")),
            "timeout",
            "Timed out",
        ))
        .unwrap();

    h.scraper()
        .run(
            vec![incident("A"), incident("B"), incident("C")],
            &ScrapeMode::RetryErrors,
            None,
        )
        .await
        .unwrap();

    assert_eq!(h.fetcher.total_calls(), 1);
    let records = h.records_for("B");
    assert_eq!(records.len(), 1);
    assert!(records[0].page_scraped);
    assert!(h.store.errors().unwrap().is_empty());
    assert_eq!(h.records_for("A").len(), 1);
}

#[tokio::test]
async fn targeted_ids_missing_from_sheet_are_still_purged() {
    let h = Harness::new(fetcher_with_pages(&["X001"]));
    h.store.append_incident(&complete_record("X009")).unwrap();
    h.store.append_incident(&complete_record("X002")).unwrap();

    let report = h
        .scraper()
        .run(
            vec![incident("X001"), incident("X002")],
            &ScrapeMode::Targeted(ids(&["X009"])),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.stats.total, 0);
    assert_eq!(h.fetcher.total_calls(), 0);
    assert_eq!(h.store.processed_ids().unwrap(), ids(&["X002"]));
}

#[tokio::test]
async fn retry_errors_purges_stale_records_for_delisted_ids() {
    let h = Harness::new(fetcher_with_pages(&["A"]));
    h.store.append_incident(&incident("A")).unwrap();
    h.store.append_incident(&incident("GONE")).unwrap();
    for id in ["A", "GONE"] {
        h.store
            .append_error(&ScrapingError::new(id, Some(detail_url(id)), "timeout", "Timed out"))
            .unwrap();
    }

    h.scraper()
        .run(vec![incident("A")], &ScrapeMode::RetryErrors, None)
        .await
        .unwrap();

    assert!(h.records_for("GONE").is_empty());
    assert_eq!(h.records_for("A").len(), 1);
    assert!(h.store.errors().unwrap().is_empty());
}

#[tokio::test]
async fn update_rescrapes_every_stored_id_once() {
    let h = Harness::new(fetcher_with_pages(&["A", "B", "C"]));
    h.store.append_incident(&complete_record("A")).unwrap();
    h.store.append_incident(&complete_record("B")).unwrap();

    h.scraper()
        .run(
            vec![incident("A"), incident("B"), incident("C")],
            &ScrapeMode::Update,
            None,
        )
        .await
        .unwrap();

    for id in ["A", "B"] {
        let records = h.records_for(id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description.as_deref(), Some(NARRATIVE));
    }
    assert!(h.records_for("C").is_empty());
}

#[tokio::test]
async fn rescrape_incomplete_targets_records_missing_content() {
    let h = Harness::new(fetcher_with_pages(&["A", "B"]));
    h.store.append_incident(&complete_record("A")).unwrap();
    let mut thin = incident("B");
    thin.page_scraped = true;
    h.store.append_incident(&thin).unwrap();

    h.scraper()
        .run(
            vec![incident("A"), incident("B")],
            &ScrapeMode::RescrapeIncomplete,
            None,
        )
        .await
        .unwrap();

    assert_eq!(h.fetcher.calls(&detail_url("A")), 0);
    let records = h.records_for("B");
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_incomplete());
}

#[tokio::test]
async fn sample_caps_the_worklist_and_purge() {
    let h = Harness::new(fetcher_with_pages(&["A", "B"]));
    h.store.append_incident(&complete_record("A")).unwrap();
    h.store.append_incident(&complete_record("B")).unwrap();

    let report = h
        .scraper()
        .run(
            vec![incident("A"), incident("B")],
            &ScrapeMode::Targeted(ids(&["A", "B"])),
            Some(1),
        )
        .await
        .unwrap();

    assert_eq!(report.stats.total, 1);
    assert_eq!(h.fetcher.calls(&detail_url("B")), 0);
    // B was outside the sample, so its record is untouched.
    let b = h.records_for("B");
    assert_eq!(b.len(), 1);
    assert_eq!(
        b[0].description.as_deref(),
        Some("An older description of the incident.")
    );
}

// --- Cancellation and whole-run failures ---

#[tokio::test]
async fn cancelled_before_start_runs_nothing_and_resumes_later() {
    let h = Harness::new(fetcher_with_pages(&["A", "B"]));
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = h
        .scraper()
        .with_cancel_flag(cancel)
        .run(vec![incident("A"), incident("B")], &ScrapeMode::Resume, None)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.stats.processed, 0);
    assert_eq!(h.fetcher.total_calls(), 0);

    let report = h
        .scraper()
        .run(vec![incident("A"), incident("B")], &ScrapeMode::Resume, None)
        .await
        .unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.stats.successful, 2);
}

/// Cancels the run as soon as the first incident finishes.
struct CancelAfterFirst(CancelFlag);

impl ScrapeObserver for CancelAfterFirst {
    fn on_incident_result(&self, _result: &IncidentResult) {
        self.0.cancel();
    }
}

#[tokio::test]
async fn cancellation_stops_new_tasks_and_keeps_finished_work() {
    let h = Harness::new(
        fetcher_with_pages(&["A", "B", "C"]).with_delay(Duration::from_millis(5)),
    );
    let cancel = CancelFlag::new();

    let report = h
        .scraper()
        .with_concurrency(1)
        .with_cancel_flag(cancel.clone())
        .with_observer(Arc::new(CancelAfterFirst(cancel)))
        .run(
            vec![incident("A"), incident("B"), incident("C")],
            &ScrapeMode::Resume,
            None,
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.stats.processed, 1);
    assert_eq!(h.store.incidents().unwrap().len(), 1);

    // A rerun picks up the remaining two.
    let report = h
        .scraper()
        .run(
            vec![incident("A"), incident("B"), incident("C")],
            &ScrapeMode::Resume,
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.successful, 2);
}

#[tokio::test]
async fn unreachable_incident_list_fails_the_run() {
    let h = Harness::new(MockFetcher::new());
    let result = h
        .scraper()
        .run_from_source(&FixtureSource::unreachable(), &ScrapeMode::Resume, None)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn fixture_source_feeds_the_run() {
    let h = Harness::new(fetcher_with_pages(&["S1"]));
    let source = FixtureSource::new(vec![incident("S1")]);

    let report = h
        .scraper()
        .run_from_source(&source, &ScrapeMode::Resume, None)
        .await
        .unwrap();
    assert_eq!(report.stats.successful, 1);
}

#[tokio::test]
async fn unwritable_ledger_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger");
    std::fs::create_dir(&ledger).unwrap();
    let store = Arc::new(RecordStore::new(&ledger, dir.path().join("errors.jsonl")));

    let result = Scraper::new(Arc::new(fetcher_with_pages(&["A"])), store)
        .with_retry_policy(RetryPolicy::immediate(1))
        .run(vec![incident("A")], &ScrapeMode::Force, None)
        .await;
    assert!(result.is_err());
}
