pub mod config;
pub mod error;
pub mod timestamp;
pub mod types;
pub mod typos;

pub use config::{Config, ERRORS_FILE, LEDGER_FILE};
pub use error::ConfigError;
pub use types::*;
