use std::time::Duration;

use aiaaic_client::FetchError;
use tracing::debug;

use crate::traits::PageFetcher;

/// Terminal result of fetching one page under a [`RetryPolicy`].
#[derive(Debug)]
pub enum FetchOutcome {
    Page(String),
    /// 404. The incident is recorded as attempted, with no content.
    NotFound,
    Failed { error: FetchError, attempts: usize },
}

/// Fixed backoff schedule. Attempts = schedule length; the delay before
/// retry `n` is `schedule[n - 1]`. Only timeouts, 429 and 503 are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(5),
        ])
    }
}

impl RetryPolicy {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    /// `attempts` tries with no delay between them.
    pub fn immediate(attempts: usize) -> Self {
        Self::new(vec![Duration::ZERO; attempts])
    }

    pub fn max_attempts(&self) -> usize {
        self.schedule.len().max(1)
    }

    pub async fn fetch<F>(&self, fetcher: &F, url: &str) -> FetchOutcome
    where
        F: PageFetcher + ?Sized,
    {
        let attempts = self.max_attempts();
        let mut attempt = 0;
        loop {
            match fetcher.fetch(url).await {
                Ok(html) => return FetchOutcome::Page(html),
                Err(e) if e.is_not_found() => return FetchOutcome::NotFound,
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.schedule.get(attempt).copied().unwrap_or_default();
                    debug!(url, attempt = attempt + 1, ?delay, error = %e, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return FetchOutcome::Failed {
                        error,
                        attempts: attempt + 1,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    const URL: &str = "https://www.aiaaic.org/p";

    #[tokio::test]
    async fn retries_rate_limit_until_success() {
        let fetcher = MockFetcher::new().on_sequence(
            URL,
            vec![Err(429), Err(429), Ok("<html></html>".into())],
        );
        let outcome = RetryPolicy::immediate(3).fetch(&fetcher, URL).await;
        assert!(matches!(outcome, FetchOutcome::Page(_)));
        assert_eq!(fetcher.calls(URL), 3);
    }

    #[tokio::test]
    async fn exhausting_schedule_fails() {
        let fetcher = MockFetcher::new().on_sequence(URL, vec![Err(503), Err(503), Err(503)]);
        match RetryPolicy::immediate(3).fetch(&fetcher, URL).await {
            FetchOutcome::Failed { error, attempts } => {
                assert_eq!(error.status(), Some(503));
                assert_eq!(attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_status_is_not_retried() {
        let fetcher = MockFetcher::new().on_sequence(URL, vec![Err(500), Ok("late".into())]);
        let outcome = RetryPolicy::immediate(3).fetch(&fetcher, URL).await;
        assert!(matches!(outcome, FetchOutcome::Failed { attempts: 1, .. }));
        assert_eq!(fetcher.calls(URL), 1);
    }

    #[tokio::test]
    async fn not_found_is_terminal() {
        let fetcher = MockFetcher::new().on_sequence(URL, vec![Err(404)]);
        let outcome = RetryPolicy::immediate(3).fetch(&fetcher, URL).await;
        assert!(matches!(outcome, FetchOutcome::NotFound));
    }

    #[tokio::test]
    async fn empty_schedule_still_tries_once() {
        let fetcher = MockFetcher::new().on_sequence(URL, vec![Err(429), Ok("x".into())]);
        let outcome = RetryPolicy::new(Vec::new()).fetch(&fetcher, URL).await;
        assert!(matches!(outcome, FetchOutcome::Failed { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_per_schedule() {
        let fetcher = MockFetcher::new().on_sequence(URL, vec![Err(429), Ok("x".into())]);
        let start = tokio::time::Instant::now();
        let outcome = RetryPolicy::default().fetch(&fetcher, URL).await;
        assert!(matches!(outcome, FetchOutcome::Page(_)));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2));
    }
}
