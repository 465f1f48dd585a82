use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Running counters for one scrape. Shared across tasks; every update is a
/// single atomic increment.
pub struct ScrapeStats {
    started: Instant,
    total: AtomicU64,
    processed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    no_url: AtomicU64,
    descriptions_found: AtomicU64,
    source_links_found: AtomicU64,
    related_found: AtomicU64,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            no_url: AtomicU64::new(0),
            descriptions_found: AtomicU64::new(0),
            source_links_found: AtomicU64::new(0),
            related_found: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn add_skipped(&self, n: u64) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self, description: bool, sources: usize, related: usize) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        if description {
            self.descriptions_found.fetch_add(1, Ordering::Relaxed);
        }
        self.source_links_found
            .fetch_add(sources as u64, Ordering::Relaxed);
        self.related_found.fetch_add(related as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_no_url(&self) {
        self.no_url.fetch_add(1, Ordering::Relaxed);
        self.record_success(false, 0, 0);
    }

    pub(crate) fn record_failure(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            no_url: self.no_url.load(Ordering::Relaxed),
            descriptions_found: self.descriptions_found.load(Ordering::Relaxed),
            source_links_found: self.source_links_found.load(Ordering::Relaxed),
            related_found: self.related_found.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Point-in-time copy of [`ScrapeStats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub no_url: u64,
    pub descriptions_found: u64,
    pub source_links_found: u64,
    pub related_found: u64,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Incidents processed per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.processed)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Scrape Complete ===")?;
        writeln!(f, "Total:              {}", self.total)?;
        writeln!(f, "Processed:          {}", self.processed)?;
        writeln!(f, "Successful:         {}", self.successful)?;
        writeln!(f, "Failed:             {}", self.failed)?;
        writeln!(f, "Skipped (done):     {}", self.skipped)?;
        writeln!(f, "No detail URL:      {}", self.no_url)?;
        writeln!(f, "Descriptions found: {}", self.descriptions_found)?;
        writeln!(f, "Source links found: {}", self.source_links_found)?;
        writeln!(f, "Related found:      {}", self.related_found)?;
        write!(
            f,
            "Elapsed:            {:.1}s ({:.1}/s)",
            self.elapsed.as_secs_f64(),
            self.rate()
        )
    }
}
