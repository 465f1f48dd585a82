// Test doubles for the scrape pipeline.
//
// - MockFetcher (PageFetcher): scripted responses per URL, call counting
// - RecordingObserver (ScrapeObserver): keeps every result it is given
// - FixtureSource (IncidentSource): fixed incident list, or an unreachable sheet
//
// Plus helpers for building incidents and detail pages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use aiaaic_client::FetchError;
use aiaaic_common::Incident;
use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::observer::{IncidentResult, IncidentStatus, ScrapeObserver};
use crate::traits::{IncidentSource, PageFetcher};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum MockResponse {
    Page(String),
    Status(u16),
    Timeout,
    Network(String),
}

impl MockResponse {
    fn into_result(self, url: &str) -> std::result::Result<String, FetchError> {
        match self {
            MockResponse::Page(html) => Ok(html),
            MockResponse::Status(status) => Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            MockResponse::Timeout => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            MockResponse::Network(msg) => Err(FetchError::Network(msg)),
        }
    }
}

/// Responses are consumed in order; the last one repeats.
pub struct MockFetcher {
    responses: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn on_responses(mut self, url: &str, responses: Vec<MockResponse>) -> Self {
        self.responses
            .get_mut()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    pub fn on_page(self, url: &str, html: impl Into<String>) -> Self {
        self.on_responses(url, vec![MockResponse::Page(html.into())])
    }

    pub fn on_status(self, url: &str, status: u16) -> Self {
        self.on_responses(url, vec![MockResponse::Status(status)])
    }

    pub fn on_timeout(self, url: &str) -> Self {
        self.on_responses(url, vec![MockResponse::Timeout])
    }

    /// `Ok(html)` is a page, `Err(code)` an HTTP status.
    pub fn on_sequence(self, url: &str, sequence: Vec<std::result::Result<String, u16>>) -> Self {
        let responses = sequence
            .into_iter()
            .map(|r| match r {
                Ok(html) => MockResponse::Page(html),
                Err(status) => MockResponse::Status(status),
            })
            .collect();
        self.on_responses(url, responses)
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match next {
            Some(response) => response.into_result(url),
            None => Err(FetchError::Network(format!(
                "MockFetcher: no response registered for {url}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingObserver {
    results: Mutex<Vec<IncidentResult>>,
    progress: AtomicU64,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<IncidentResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn status_of(&self, id: &str) -> Option<IncidentStatus> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.aiaaic_id == id)
            .map(|r| r.status.clone())
    }

    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }
}

impl ScrapeObserver for RecordingObserver {
    fn on_progress(&self, delta: u64) {
        self.progress.fetch_add(delta, Ordering::Relaxed);
    }

    fn on_incident_result(&self, result: &IncidentResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

// ---------------------------------------------------------------------------
// FixtureSource
// ---------------------------------------------------------------------------

pub struct FixtureSource {
    incidents: Vec<Incident>,
    unreachable: bool,
}

impl FixtureSource {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self {
            incidents,
            unreachable: false,
        }
    }

    /// A source that always fails, like a sheet that cannot be downloaded.
    pub fn unreachable() -> Self {
        Self {
            incidents: Vec::new(),
            unreachable: true,
        }
    }
}

#[async_trait]
impl IncidentSource for FixtureSource {
    async fn incidents(&self) -> Result<Vec<Incident>> {
        if self.unreachable {
            bail!("FixtureSource: incident list unreachable");
        }
        Ok(self.incidents.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn detail_url(id: &str) -> String {
    format!(
        "https://www.aiaaic.org/aiaaic-repository/ai-algorithmic-and-automation-incidents/{}",
        id.to_lowercase()
    )
}

/// A sheet row with a detail page URL.
pub fn incident(id: &str) -> Incident {
    Incident::new(id, format!("Incident {id}")).with_detail_page_url(Some(&detail_url(id)))
}

/// A sheet row with no usable detail page.
pub fn incident_without_url(id: &str) -> Incident {
    Incident::new(id, format!("Incident {id}"))
}

/// Minimal detail page: title, metadata, one narrative paragraph with a
/// source link, and a footer.
pub fn incident_page(narrative: &str, source_url: &str) -> String {
    format!(
        r#"<html><body>
<section><h1>Incident title</h1></section>
<section><p>Occurred: January 2024</p><p>Page published: March 2024</p><p>System: Example</p><p>Developer: Example Corp</p></section>
<section><p>{narrative}</p><ul><li><a href="{source_url}">News coverage of the incident in detail</a></li></ul></section>
<section><p>Page updated</p></section>
</body></html>"#
    )
}
