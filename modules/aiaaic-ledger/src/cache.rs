//! Time-boxed snapshot of the ledger for read-heavy callers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aiaaic_common::Incident;
use tracing::debug;

use crate::error::Result;
use crate::store::RecordStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Snapshot {
    loaded_at: Instant,
    incidents: Arc<Vec<Incident>>,
}

/// Memoised `RecordStore::incidents()` that re-reads after `ttl` or on `invalidate()`.
pub struct CachedLedger {
    store: Arc<RecordStore>,
    ttl: Duration,
    snapshot: Mutex<Option<Snapshot>>,
}

impl CachedLedger {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            snapshot: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn incidents(&self) -> Result<Arc<Vec<Incident>>> {
        let mut snapshot = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(s) = snapshot.as_ref() {
            if s.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&s.incidents));
            }
        }

        let incidents = Arc::new(self.store.incidents()?);
        debug!(count = incidents.len(), "Reloaded ledger snapshot");
        *snapshot = Some(Snapshot {
            loaded_at: Instant::now(),
            incidents: Arc::clone(&incidents),
        });
        Ok(incidents)
    }

    pub fn invalidate(&self) {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
