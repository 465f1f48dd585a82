use std::collections::HashMap;
use std::fmt;

use aiaaic_common::typos::has_known_typo;
use aiaaic_common::Incident;

/// Fields reported in the completeness table, in display order.
pub const COMPLETENESS_FIELDS: [&str; 8] = [
    "description",
    "source_links",
    "developers",
    "deployers",
    "system_names",
    "occurred",
    "countries",
    "technologies",
];

fn is_filled(incident: &Incident, field: &str) -> bool {
    match field {
        "description" => incident.has_description(),
        "source_links" => !incident.source_links.is_empty(),
        "developers" => !incident.developers.is_empty(),
        "deployers" => !incident.deployers.is_empty(),
        "system_names" => !incident.system_names.is_empty(),
        "occurred" => !incident.occurred.trim().is_empty(),
        "countries" => !incident.countries.is_empty(),
        "technologies" => !incident.technologies.is_empty(),
        _ => false,
    }
}

pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCompleteness {
    pub field: &'static str,
    pub filled: usize,
}

/// Aggregate data-quality figures over a set of ledger records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityMetrics {
    pub total: usize,
    pub scraped: usize,
    pub with_description: usize,
    pub with_sources: usize,
    /// Ids with more than one record, in first-seen order.
    pub duplicate_ids: Vec<String>,
    /// Ids whose `issues` contain a known misspelling.
    pub typo_ids: Vec<String>,
    pub no_date: usize,
    pub completeness: Vec<FieldCompleteness>,
}

impl QualityMetrics {
    pub fn compute(incidents: &[Incident]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for incident in incidents {
            let count = counts.entry(incident.aiaaic_id.as_str()).or_insert(0);
            if *count == 0 {
                order.push(incident.aiaaic_id.as_str());
            }
            *count += 1;
        }

        Self {
            total: incidents.len(),
            scraped: incidents.iter().filter(|i| i.page_scraped).count(),
            with_description: incidents.iter().filter(|i| i.has_description()).count(),
            with_sources: incidents.iter().filter(|i| !i.source_links.is_empty()).count(),
            duplicate_ids: order
                .into_iter()
                .filter(|id| counts[id] > 1)
                .map(String::from)
                .collect(),
            typo_ids: incidents
                .iter()
                .filter(|i| has_known_typo(&i.issues))
                .map(|i| i.aiaaic_id.clone())
                .collect(),
            no_date: incidents.iter().filter(|i| i.occurred.trim().is_empty()).count(),
            completeness: COMPLETENESS_FIELDS
                .iter()
                .map(|&field| FieldCompleteness {
                    field,
                    filled: incidents.iter().filter(|i| is_filled(i, field)).count(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for QualityMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n| percent(n, self.total);
        writeln!(f, "Records:          {}", self.total)?;
        writeln!(f, "Scraped:          {} ({:.1}%)", self.scraped, pct(self.scraped))?;
        writeln!(
            f,
            "With description: {} ({:.1}%)",
            self.with_description,
            pct(self.with_description)
        )?;
        writeln!(f, "With sources:     {} ({:.1}%)", self.with_sources, pct(self.with_sources))?;
        writeln!(f, "Duplicate ids:    {}", self.duplicate_ids.len())?;
        writeln!(f, "Known typos:      {}", self.typo_ids.len())?;
        writeln!(f, "No date:          {}", self.no_date)?;
        write!(f, "Field completeness:")?;
        for c in &self.completeness {
            write!(f, "\n  {:<14} {:>5.1}%", c.field, pct(c.filled))?;
        }
        Ok(())
    }
}

/// A scraped record missing description and/or sources.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteRecord {
    pub aiaaic_id: String,
    pub headline: String,
    pub detail_page_url: Option<String>,
    pub missing: Vec<&'static str>,
}

pub fn incomplete(incidents: &[Incident]) -> Vec<IncompleteRecord> {
    incidents
        .iter()
        .filter(|i| i.is_incomplete())
        .map(|i| IncompleteRecord {
            aiaaic_id: i.aiaaic_id.clone(),
            headline: i.headline.clone(),
            detail_page_url: i.detail_page_url.clone(),
            missing: i.missing_page_fields(),
        })
        .collect()
}

/// Records whose sheet row had no usable detail page URL.
pub fn without_detail_url(incidents: &[Incident]) -> Vec<&Incident> {
    incidents
        .iter()
        .filter(|i| i.detail_page_url.is_none())
        .collect()
}
