pub mod error;

pub use error::{FetchError, Result};

use std::time::Duration;

use tracing::debug;

/// Idle connections kept per host beyond the task concurrency. Only idle
/// connections are capped; open connections are bounded by the caller's
/// concurrency limit.
const POOL_HEADROOM: usize = 10;
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            concurrency: 20,
            timeout: Duration::from_secs(30),
            user_agent: "aiaaic-scout/0.1".to_string(),
        }
    }
}

/// Shared HTTP client for detail pages. Cheap to clone; clones share the pool.
///
/// Uses reqwest's default TLS backend, which does not negotiate ALPN, so
/// requests go over pooled HTTP/1.1 keep-alive connections.
#[derive(Clone)]
pub struct PageClient {
    client: reqwest::Client,
}

impl PageClient {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .pool_max_idle_per_host(options.concurrency + POOL_HEADROOM)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET `url`, following redirects, and return the body as text.
    /// Any non-2xx final status is an error.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Non-success response");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))
    }
}
