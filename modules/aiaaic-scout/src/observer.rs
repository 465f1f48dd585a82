use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

/// How one incident's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentStatus {
    Scraped,
    /// The detail page returned 404.
    NotFound,
    /// The sheet row had no usable detail page URL.
    NoUrl,
    Failed {
        error_type: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentResult {
    pub aiaaic_id: String,
    pub status: IncidentStatus,
    pub description_found: bool,
    pub source_links: usize,
    pub related: usize,
}

impl IncidentResult {
    pub(crate) fn bare(aiaaic_id: &str, status: IncidentStatus) -> Self {
        Self {
            aiaaic_id: aiaaic_id.to_string(),
            status,
            description_found: false,
            source_links: 0,
            related: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, IncidentStatus::Failed { .. })
    }
}

/// Progress callbacks from the orchestrator. Called from concurrent tasks.
pub trait ScrapeObserver: Send + Sync {
    /// `delta` more incidents have finished.
    fn on_progress(&self, _delta: u64) {}

    fn on_incident_result(&self, _result: &IncidentResult) {}
}

/// Logs each result through `tracing`, plus a progress line every `every` incidents.
pub struct TracingObserver {
    every: u64,
    done: AtomicU64,
}

impl TracingObserver {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            done: AtomicU64::new(0),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ScrapeObserver for TracingObserver {
    fn on_progress(&self, delta: u64) {
        let before = self.done.fetch_add(delta, Ordering::Relaxed);
        let after = before + delta;
        if after / self.every > before / self.every {
            info!(done = after, "Scrape progress");
        }
    }

    fn on_incident_result(&self, result: &IncidentResult) {
        match &result.status {
            IncidentStatus::Scraped => debug!(
                id = result.aiaaic_id.as_str(),
                description = result.description_found,
                sources = result.source_links,
                related = result.related,
                "Scraped"
            ),
            IncidentStatus::NotFound => {
                info!(id = result.aiaaic_id.as_str(), "Detail page not found")
            }
            IncidentStatus::NoUrl => debug!(id = result.aiaaic_id.as_str(), "No detail page URL"),
            IncidentStatus::Failed {
                error_type,
                message,
            } => warn!(
                id = result.aiaaic_id.as_str(),
                error_type = error_type.as_str(),
                error = message.as_str(),
                "Scrape failed"
            ),
        }
    }
}

pub struct NoopObserver;

impl ScrapeObserver for NoopObserver {}
