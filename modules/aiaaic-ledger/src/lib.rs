pub mod cache;
pub mod consistency;
pub mod error;
pub mod quality;
pub mod store;

pub use cache::CachedLedger;
pub use consistency::{check, deduplicate, ConsistencyReport, DedupOutcome, DuplicateGroup};
pub use error::{LedgerError, Result};
pub use quality::{incomplete, without_detail_url, IncompleteRecord, QualityMetrics};
pub use store::RecordStore;
