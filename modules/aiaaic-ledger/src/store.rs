//! Append-only JSONL persistence for incidents and scrape errors.
//!
//! One JSON object per line. Reads skip lines that fail to parse; rewrites
//! keep them byte for byte, invalid UTF-8 included. Concurrent processes
//! writing the same files are not supported.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aiaaic_common::{Config, Incident, ScrapingError, ERRORS_FILE, LEDGER_FILE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};

/// The only field needed to index a line.
#[derive(Deserialize)]
pub(crate) struct IdOnly {
    #[serde(default)]
    pub aiaaic_id: Option<String>,
}

impl IdOnly {
    pub(crate) fn parse(line: &[u8]) -> Option<String> {
        serde_json::from_slice::<IdOnly>(line)
            .ok()
            .and_then(|r| r.aiaaic_id)
            .filter(|id| !id.is_empty())
    }
}

pub struct RecordStore {
    ledger_path: PathBuf,
    errors_path: PathBuf,
    /// Serializes appends and rewrites within this process.
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(ledger_path: impl Into<PathBuf>, errors_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            errors_path: errors_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store using the standard file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(LEDGER_FILE), dir.join(ERRORS_FILE))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ledger_path(), config.errors_path())
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn errors_path(&self) -> &Path {
        &self.errors_path
    }

    // --- Reads ---

    /// Non-blank ledger lines in file order, parseable or not, as stored.
    pub fn raw_lines(&self) -> Result<Vec<Vec<u8>>> {
        read_lines(&self.ledger_path)
    }

    /// [`RecordStore::raw_lines`] decoded for display. Invalid UTF-8 is replaced.
    pub fn lines(&self) -> Result<Vec<String>> {
        Ok(self
            .raw_lines()?
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect())
    }

    pub fn incidents(&self) -> Result<Vec<Incident>> {
        read_records(&self.ledger_path)
    }

    pub fn errors(&self) -> Result<Vec<ScrapingError>> {
        read_records(&self.errors_path)
    }

    /// Ids with at least one ledger record.
    pub fn processed_ids(&self) -> Result<HashSet<String>> {
        read_ids(&self.ledger_path)
    }

    /// Ids with at least one logged error.
    pub fn error_ids(&self) -> Result<HashSet<String>> {
        read_ids(&self.errors_path)
    }

    // --- Writes ---

    /// Append one incident. Durable on return.
    pub fn append_incident(&self, incident: &Incident) -> Result<()> {
        self.append(&self.ledger_path, incident)
    }

    /// Append one scrape error. Durable on return.
    pub fn append_error(&self, error: &ScrapingError) -> Result<()> {
        self.append(&self.errors_path, error)
    }

    /// Drop the whole error log.
    pub fn clear_errors(&self) -> Result<()> {
        let _guard = self.lock();
        match fs::remove_file(&self.errors_path) {
            Ok(()) => {
                info!(path = %self.errors_path.display(), "Cleared error log");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::io(&self.errors_path)(e)),
        }
    }

    /// Remove every record whose id is in `ids`. Malformed lines are kept.
    /// Returns the number of records removed.
    pub fn remove_ids(&self, ids: &HashSet<String>) -> Result<usize> {
        let removed = self.remove_from(&self.ledger_path, ids)?;
        if removed > 0 {
            info!(removed, "Removed records from ledger");
        }
        Ok(removed)
    }

    /// Remove logged errors for `ids`, keeping the rest of the error log.
    pub fn remove_error_ids(&self, ids: &HashSet<String>) -> Result<usize> {
        self.remove_from(&self.errors_path, ids)
    }

    fn remove_from(&self, path: &Path, ids: &HashSet<String>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock();
        let lines = read_lines(path)?;
        let before = lines.len();
        let kept: Vec<Vec<u8>> = lines
            .into_iter()
            .filter(|line| IdOnly::parse(line).map_or(true, |id| !ids.contains(&id)))
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            write_lines_atomic(path, &kept)?;
        }
        Ok(removed)
    }

    /// Replace the ledger contents. Callers must hold exclusive use of the store.
    pub(crate) fn rewrite_lines(&self, lines: &[Vec<u8>]) -> Result<()> {
        let _guard = self.lock();
        write_lines_atomic(&self.ledger_path, lines)
    }

    /// Write every parseable incident to `out` as a pretty JSON array.
    pub fn export_json(&self, out: impl AsRef<Path>) -> Result<usize> {
        let out = out.as_ref();
        let incidents = self.incidents()?;
        let json = serde_json::to_string_pretty(&incidents)?;
        write_lines_atomic(out, &[json])?;
        info!(count = incidents.len(), path = %out.display(), "Exported incidents");
        Ok(incidents.len())
    }

    fn append<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock();
        ensure_parent(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(LedgerError::io(path))?;
        file.write_all(line.as_bytes())
            .map_err(LedgerError::io(path))?;
        file.sync_data().map_err(LedgerError::io(path))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock is still usable.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(LedgerError::io(parent))
        }
        _ => Ok(()),
    }
}

/// Lines split on `\n` only, so a rewrite reproduces every other byte.
fn read_lines(path: &Path) -> Result<Vec<Vec<u8>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::io(path)(e)),
    };
    Ok(bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .map(<[u8]>::to_vec)
        .collect())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in read_lines(path)?.iter().enumerate() {
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(path = %path.display(), line = idx + 1, error = %e, "Skipping unparseable line");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Skipped unparseable lines");
    }
    Ok(records)
}

fn read_ids(path: &Path) -> Result<HashSet<String>> {
    Ok(read_lines(path)?
        .iter()
        .filter_map(|line| IdOnly::parse(line))
        .collect())
}

/// Write `lines` to a temp file beside `path`, sync it, then rename it over `path`.
fn write_lines_atomic<L: AsRef<[u8]>>(path: &Path, lines: &[L]) -> Result<()> {
    ensure_parent(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut body = Vec::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
    for line in lines {
        body.extend_from_slice(line.as_ref());
        body.push(b'\n');
    }

    let mut tmp = NamedTempFile::new_in(dir).map_err(LedgerError::io(dir))?;
    tmp.write_all(&body)
        .map_err(LedgerError::io(tmp.path()))?;
    tmp.as_file()
        .sync_all()
        .map_err(LedgerError::io(tmp.path()))?;
    tmp.persist(path).map_err(|e| LedgerError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
