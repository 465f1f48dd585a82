use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Public CSV export of the AIAAIC incident sheet.
pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/1Bn55B4xz21-_Rgdr8BBb2lt0n_4rzLGxFADMlVW0PYI/export?format=csv&gid=888071280";

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

pub const LEDGER_FILE: &str = "aiaaic_incidents.jsonl";
pub const ERRORS_FILE: &str = "errors.jsonl";

/// Runtime configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub sheet_url: String,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sheet_url: DEFAULT_SHEET_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let concurrency: usize = parsed_env("AIAAIC_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "AIAAIC_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let timeout_secs: u64 =
            parsed_env("AIAAIC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            data_dir: env::var("AIAAIC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            sheet_url: env::var("AIAAIC_SHEET_URL").unwrap_or(defaults.sheet_url),
            concurrency,
            request_timeout: Duration::from_secs(timeout_secs),
            user_agent: env::var("AIAAIC_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    /// Incident ledger (one JSON record per line).
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    /// Error log for failed scrapes.
    pub fn errors_path(&self) -> PathBuf {
        self.data_dir.join(ERRORS_FILE)
    }

    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  data dir:        {}", self.data_dir.display());
        tracing::info!("  sheet url:       {}", self.sheet_url);
        tracing::info!("  concurrency:     {}", self.concurrency);
        tracing::info!("  request timeout: {}s", self.request_timeout.as_secs());
    }
}

fn parsed_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/aiaaic"),
            ..Config::default()
        };
        assert_eq!(config.ledger_path(), PathBuf::from("/tmp/aiaaic/aiaaic_incidents.jsonl"));
        assert_eq!(config.errors_path(), PathBuf::from("/tmp/aiaaic/errors.jsonl"));
    }

    #[test]
    fn unparsable_number_is_an_error() {
        // Uses a key no other test touches.
        env::set_var("AIAAIC_TEST_PARSE_KEY", "twenty");
        let result: Result<usize, _> = parsed_env("AIAAIC_TEST_PARSE_KEY", 20);
        assert!(result.is_err());
        env::remove_var("AIAAIC_TEST_PARSE_KEY");
    }

    #[test]
    fn missing_key_uses_default() {
        let value: u64 = parsed_env("AIAAIC_TEST_MISSING_KEY", 30).unwrap();
        assert_eq!(value, 30);
    }
}
