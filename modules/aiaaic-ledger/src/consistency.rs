//! Duplicate detection and repair for the incident ledger.
//!
//! Duplicates arise because every scrape attempt appends a new record. For
//! each id with several records the best one is the most recently scraped,
//! with a content score as tie-break.

use std::collections::HashMap;
use std::fmt;

use aiaaic_common::timestamp;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::Result;
use crate::store::{IdOnly, RecordStore};

#[derive(Debug, Clone)]
struct Candidate {
    line: usize,
    headline: String,
    scraped_at: Option<DateTime<Utc>>,
    score: usize,
}

impl Candidate {
    /// Recency first; a record with no readable timestamp ranks oldest.
    fn outranks(&self, other: &Candidate) -> bool {
        (self.scraped_at, self.score) > (other.scraped_at, other.score)
    }
}

/// `description length + 100 per source link + 1000 if the page was scraped`.
pub fn quality_score(description: Option<&str>, source_links: usize, page_scraped: bool) -> usize {
    description.map_or(0, |d| d.chars().count())
        + source_links * 100
        + if page_scraped { 1000 } else { 0 }
}

enum Line {
    Record(String),
    NoId,
    Malformed,
}

/// Grouping uses the same id the store indexes by. Ranking fields are read
/// one at a time, and one of the wrong type counts as absent.
fn classify(raw: &[u8]) -> (Line, Option<Candidate>) {
    let fields: Map<String, Value> = match serde_json::from_slice(raw) {
        Ok(Value::Object(fields)) => fields,
        _ => return (Line::Malformed, None),
    };
    let Some(id) = IdOnly::parse(raw) else {
        return (Line::NoId, None);
    };

    let text = |key: &str| fields.get(key).and_then(Value::as_str);
    let candidate = Candidate {
        line: 0,
        headline: text("headline").unwrap_or_default().to_string(),
        scraped_at: text("scraped_at").and_then(timestamp::parse),
        score: quality_score(
            text("description"),
            fields
                .get("source_links")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            fields
                .get("page_scraped")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
    };
    (Line::Record(id), Some(candidate))
}

/// All records for one id and the one that survives deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub aiaaic_id: String,
    pub headline: String,
    pub count: usize,
    /// 1-based ledger line of the best record.
    pub best_line: usize,
    pub best_scraped_at: Option<DateTime<Utc>>,
    pub best_score: usize,
}

impl DuplicateGroup {
    pub fn discarded(&self) -> usize {
        self.count - 1
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    pub total_records: usize,
    pub unique_ids: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub malformed_lines: usize,
    pub records_without_id: usize,
}

impl ConsistencyReport {
    /// Records a deduplication would remove.
    pub fn total_duplicates(&self) -> usize {
        self.duplicate_groups.iter().map(DuplicateGroup::discarded).sum()
    }

    pub fn has_issues(&self) -> bool {
        !self.duplicate_groups.is_empty() || self.malformed_lines > 0 || self.records_without_id > 0
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:      {}", self.total_records)?;
        writeln!(f, "Unique ids:         {}", self.unique_ids)?;
        writeln!(f, "Duplicate ids:      {}", self.duplicate_groups.len())?;
        writeln!(f, "Records to remove:  {}", self.total_duplicates())?;
        writeln!(f, "Malformed lines:    {}", self.malformed_lines)?;
        write!(f, "Records without id: {}", self.records_without_id)
    }
}

struct Analysis {
    lines: Vec<Line>,
    /// Best candidate and record count per id.
    best: HashMap<String, (Candidate, usize)>,
    /// Ids in order of first appearance.
    order: Vec<String>,
}

fn analyze<L: AsRef<[u8]>>(raw_lines: &[L]) -> Analysis {
    let mut lines = Vec::with_capacity(raw_lines.len());
    let mut best: HashMap<String, (Candidate, usize)> = HashMap::new();
    let mut order = Vec::new();

    for (idx, raw) in raw_lines.iter().enumerate() {
        let (line, candidate) = classify(raw.as_ref());
        if let (Line::Record(id), Some(mut candidate)) = (&line, candidate) {
            candidate.line = idx;
            match best.get_mut(id) {
                Some((current, count)) => {
                    *count += 1;
                    // Strictly better only, so ties keep the earliest line.
                    if candidate.outranks(current) {
                        *current = candidate;
                    }
                }
                None => {
                    order.push(id.clone());
                    best.insert(id.clone(), (candidate, 1));
                }
            }
        }
        lines.push(line);
    }

    Analysis { lines, best, order }
}

impl Analysis {
    fn report(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();
        for line in &self.lines {
            match line {
                Line::Record(_) => report.total_records += 1,
                Line::NoId => report.records_without_id += 1,
                Line::Malformed => report.malformed_lines += 1,
            }
        }
        report.unique_ids = self.best.len();
        report.duplicate_groups = self
            .order
            .iter()
            .filter_map(|id| {
                let (best, count) = &self.best[id];
                (*count > 1).then(|| DuplicateGroup {
                    aiaaic_id: id.clone(),
                    headline: best.headline.clone(),
                    count: *count,
                    best_line: best.line + 1,
                    best_scraped_at: best.scraped_at,
                    best_score: best.score,
                })
            })
            .collect();
        report
    }
}

/// Read-only scan of the ledger.
pub fn check(store: &RecordStore) -> Result<ConsistencyReport> {
    let raw = store.raw_lines()?;
    Ok(analyze(&raw).report())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOutcome {
    pub kept: usize,
    pub removed: usize,
}

/// Keep one record per id. Each survivor takes the position of its id's
/// first record; malformed and id-less lines stay where they are.
/// With `dry_run` nothing is written.
pub fn deduplicate(store: &RecordStore, dry_run: bool) -> Result<DedupOutcome> {
    let raw = store.raw_lines()?;
    let analysis = analyze(&raw);
    let report = analysis.report();
    let outcome = DedupOutcome {
        kept: report.unique_ids,
        removed: report.total_duplicates(),
    };

    if dry_run || outcome.removed == 0 {
        return Ok(outcome);
    }

    let mut emitted = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(raw.len() - outcome.removed);
    for (raw_line, line) in raw.iter().zip(&analysis.lines) {
        match line {
            Line::Record(id) => {
                if emitted.insert(id.as_str()) {
                    let (best, _) = &analysis.best[id];
                    out.push(raw[best.line].clone());
                }
            }
            Line::NoId | Line::Malformed => out.push(raw_line.clone()),
        }
    }

    store.rewrite_lines(&out)?;
    info!(kept = outcome.kept, removed = outcome.removed, "Deduplicated ledger");
    Ok(outcome)
}
