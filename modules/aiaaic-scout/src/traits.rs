// Seams between the orchestrator and the outside world.
//
// PageFetcher wraps the HTTP client, IncidentSource wraps the upstream sheet.
// Tests swap in MockFetcher and FixtureSource from `testing`.

use aiaaic_client::{FetchError, PageClient};
use aiaaic_common::Incident;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Body of `url`, or the classified failure.
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

#[async_trait]
impl PageFetcher for PageClient {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        PageClient::fetch(self, url).await
    }
}

#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Every incident row, in sheet order, with no page fields filled.
    async fn incidents(&self) -> Result<Vec<Incident>>;
}
