//! Scrape orchestrator: worklist selection, then bounded-concurrency
//! fetch → extract → append per incident.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use aiaaic_common::{Incident, ScrapingError};
use aiaaic_extract::Extractor;
use aiaaic_ledger::{LedgerError, RecordStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::observer::{IncidentResult, IncidentStatus, ScrapeObserver, TracingObserver};
use crate::retry::{FetchOutcome, RetryPolicy};
use crate::stats::{ScrapeStats, StatsSnapshot};
use crate::traits::{IncidentSource, PageFetcher};

/// Which incidents a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeMode {
    /// Everything not yet in the ledger.
    Resume,
    /// Everything. Existing records stay; `dedupe` resolves the duplicates.
    Force,
    /// Ids in the error log. Their old records and errors are purged first.
    RetryErrors,
    /// Every id already in the ledger, purged then re-scraped.
    Update,
    /// Only these ids, purged then re-scraped.
    Targeted(HashSet<String>),
    /// Scraped records missing description or sources, purged then re-scraped.
    RescrapeIncomplete,
}

impl fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScrapeMode::Resume => "resume",
            ScrapeMode::Force => "force",
            ScrapeMode::RetryErrors => "retry_errors",
            ScrapeMode::Update => "update",
            ScrapeMode::Targeted(_) => "targeted",
            ScrapeMode::RescrapeIncomplete => "rescrape_incomplete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub run_id: Uuid,
    pub stats: StatsSnapshot,
    pub cancelled: bool,
}

impl ScrapeReport {
    /// Finished, but some incidents failed. Not an error for the run.
    pub fn is_degraded(&self) -> bool {
        self.stats.failed > 0
    }
}

pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<RecordStore>,
    extractor: Arc<Extractor>,
    retry: RetryPolicy,
    observer: Arc<dyn ScrapeObserver>,
    cancel: CancelFlag,
    concurrency: usize,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<RecordStore>) -> Self {
        Self {
            fetcher,
            store,
            extractor: Arc::new(Extractor::default()),
            retry: RetryPolicy::default(),
            observer: Arc::new(TracingObserver::default()),
            cancel: CancelFlag::new(),
            concurrency: aiaaic_common::config::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScrapeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Load incidents from `source`, then [`Scraper::run`].
    pub async fn run_from_source(
        &self,
        source: &dyn IncidentSource,
        mode: &ScrapeMode,
        sample: Option<usize>,
    ) -> anyhow::Result<ScrapeReport> {
        let incidents = source.incidents().await?;
        Ok(self.run(incidents, mode, sample).await?)
    }

    /// Scrape the part of `incidents` selected by `mode`, optionally capped at
    /// `sample`. Per-incident failures go to the error log; only store I/O
    /// failures end the run with an error.
    pub async fn run(
        &self,
        incidents: Vec<Incident>,
        mode: &ScrapeMode,
        sample: Option<usize>,
    ) -> Result<ScrapeReport, LedgerError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape_run", run_id = %run_id, mode = %mode);
        self.run_inner(run_id, incidents, mode, sample)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        incidents: Vec<Incident>,
        mode: &ScrapeMode,
        sample: Option<usize>,
    ) -> Result<ScrapeReport, LedgerError> {
        let stats = ScrapeStats::new();
        let worklist = self.plan(incidents, mode, sample, &stats)?;
        stats.set_total(worklist.len() as u64);
        info!(
            total = worklist.len(),
            concurrency = self.concurrency,
            "Starting scrape"
        );

        // Set when an append fails, so no further tasks start.
        let halt = CancelFlag::new();
        let cancel = self.cancel.clone();
        let stop = halt.clone();

        let results: Vec<Result<(), LedgerError>> = stream::iter(worklist)
            .take_while(move |_| {
                futures::future::ready(!cancel.is_cancelled() && !stop.is_cancelled())
            })
            .map(|incident| {
                let halt = halt.clone();
                let stats = &stats;
                async move {
                    let result = self.process(incident, stats).await;
                    if result.is_err() {
                        halt.cancel();
                    }
                    result
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        if let Some(err) = results.into_iter().find_map(Result::err) {
            warn!(error = %err, "Scrape stopped on store failure");
            return Err(err);
        }

        let snapshot = stats.snapshot();
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!(remaining = snapshot.remaining(), "Scrape interrupted; rerun to resume");
        }
        info!(
            processed = snapshot.processed,
            successful = snapshot.successful,
            failed = snapshot.failed,
            "Scrape finished"
        );

        Ok(ScrapeReport {
            run_id,
            stats: snapshot,
            cancelled,
        })
    }

    /// Select the worklist and purge anything it will replace.
    fn plan(
        &self,
        incidents: Vec<Incident>,
        mode: &ScrapeMode,
        sample: Option<usize>,
        stats: &ScrapeStats,
    ) -> Result<Vec<Incident>, LedgerError> {
        // Second element: ids to purge before scraping. Explicit requests
        // (targeted ids, logged errors) purge even ids the sheet no longer lists.
        let (mut worklist, purge): (Vec<Incident>, Option<HashSet<String>>) = match mode {
            ScrapeMode::Resume => {
                let done = self.store.processed_ids()?;
                let before = incidents.len();
                let pending: Vec<Incident> = incidents
                    .into_iter()
                    .filter(|i| !done.contains(&i.aiaaic_id))
                    .collect();
                stats.add_skipped((before - pending.len()) as u64);
                info!(skipped = before - pending.len(), "Skipping already-scraped incidents");
                (pending, None)
            }
            ScrapeMode::Force => (incidents, None),
            ScrapeMode::RetryErrors => {
                let ids = self.store.error_ids()?;
                info!(errors = ids.len(), "Retrying failed incidents");
                (select(incidents, &ids), Some(ids))
            }
            ScrapeMode::Update => {
                // Records the sheet no longer lists have no replacement, so they stay.
                let ids = self.store.processed_ids()?;
                let selected = select(incidents, &ids);
                let listed = worklist_ids(&selected);
                (selected, Some(listed))
            }
            ScrapeMode::Targeted(ids) => {
                let selected = select(incidents, ids);
                let found: HashSet<&str> =
                    selected.iter().map(|i| i.aiaaic_id.as_str()).collect();
                for missing in ids.iter().filter(|id| !found.contains(id.as_str())) {
                    warn!(id = missing.as_str(), "Requested id not in incident list; purging only");
                }
                (selected, Some(ids.clone()))
            }
            ScrapeMode::RescrapeIncomplete => {
                let ids: HashSet<String> = aiaaic_ledger::incomplete(&self.store.incidents()?)
                    .into_iter()
                    .map(|r| r.aiaaic_id)
                    .collect();
                info!(incomplete = ids.len(), "Re-scraping incomplete records");
                let selected = select(incidents, &ids);
                let listed = worklist_ids(&selected);
                (selected, Some(listed))
            }
        };

        if let Some(n) = sample {
            worklist.truncate(n);
        }

        // A sample narrows the purge to what this run will actually re-scrape.
        let purge = match (purge, sample) {
            (Some(_), Some(_)) => Some(worklist_ids(&worklist)),
            (purge, _) => purge,
        };

        if let Some(ids) = purge {
            let removed = self.store.remove_ids(&ids)?;
            info!(removed, "Purged records to be replaced");
            if *mode == ScrapeMode::RetryErrors {
                if sample.is_none() {
                    self.store.clear_errors()?;
                } else {
                    self.store.remove_error_ids(&ids)?;
                }
            }
        }

        Ok(worklist)
    }

    /// Fetch, extract and record one incident. Exactly one line is appended
    /// to either the ledger or the error log.
    async fn process(&self, mut incident: Incident, stats: &ScrapeStats) -> Result<(), LedgerError> {
        let id = incident.aiaaic_id.clone();

        let Some(url) = incident.detail_page_url.clone() else {
            incident.scraped_at = Utc::now();
            self.persist(move |store| store.append_incident(&incident))
                .await?;
            stats.record_no_url();
            self.report(IncidentResult::bare(&id, IncidentStatus::NoUrl));
            return Ok(());
        };

        let result = match self.retry.fetch(self.fetcher.as_ref(), &url).await {
            FetchOutcome::Page(html) => {
                let fields = self.extractor.extract(&html, &url);
                let result = IncidentResult {
                    aiaaic_id: id,
                    status: IncidentStatus::Scraped,
                    description_found: fields.description.is_some(),
                    source_links: fields.source_links.len(),
                    related: fields.related_incidents.len(),
                };
                fields.apply_to(&mut incident);
                self.persist(move |store| store.append_incident(&incident))
                    .await?;
                stats.record_success(result.description_found, result.source_links, result.related);
                result
            }
            FetchOutcome::NotFound => {
                incident.page_scraped = false;
                incident.scraped_at = Utc::now();
                self.persist(move |store| store.append_incident(&incident))
                    .await?;
                stats.record_success(false, 0, 0);
                IncidentResult::bare(&id, IncidentStatus::NotFound)
            }
            FetchOutcome::Failed { error, attempts } => {
                let record = ScrapingError::new(
                    id.as_str(),
                    Some(url),
                    error.error_type(),
                    error.to_string(),
                );
                let line = record.clone();
                self.persist(move |store| store.append_error(&line)).await?;
                stats.record_failure();
                debug!(id = id.as_str(), attempts, "Giving up on incident");
                IncidentResult::bare(
                    &id,
                    IncidentStatus::Failed {
                        error_type: record.error_type,
                        message: record.error_message,
                    },
                )
            }
        };

        self.report(result);
        Ok(())
    }

    /// Run a store write on the blocking pool. Every in-flight incident is
    /// polled on this one task, so a write here must never block it.
    pub(crate) async fn persist<T, F>(&self, write: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&RecordStore) -> Result<T, LedgerError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || write(&store)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(LedgerError::Aborted(e.to_string())),
        }
    }

    fn report(&self, result: IncidentResult) {
        self.observer.on_incident_result(&result);
        self.observer.on_progress(1);
    }
}

fn worklist_ids(incidents: &[Incident]) -> HashSet<String> {
    incidents.iter().map(|i| i.aiaaic_id.clone()).collect()
}

/// Incidents whose id is in `ids`, in input order.
fn select(incidents: Vec<Incident>, ids: &HashSet<String>) -> Vec<Incident> {
    incidents
        .into_iter()
        .filter(|i| ids.contains(&i.aiaaic_id))
        .collect()
}
