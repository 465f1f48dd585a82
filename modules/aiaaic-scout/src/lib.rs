pub mod cancel;
pub mod csv;
pub mod observer;
pub mod retry;
pub mod scraper;
pub mod sheet;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use cancel::CancelFlag;
pub use observer::{IncidentResult, IncidentStatus, NoopObserver, ScrapeObserver, TracingObserver};
pub use retry::{FetchOutcome, RetryPolicy};
pub use scraper::{ScrapeMode, ScrapeReport, Scraper};
pub use sheet::SheetSource;
pub use stats::{ScrapeStats, StatsSnapshot};
pub use traits::{IncidentSource, PageFetcher};
