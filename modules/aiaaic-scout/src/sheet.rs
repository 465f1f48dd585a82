//! The upstream incident list: a CSV export of the AIAAIC Google Sheet.

use aiaaic_client::PageClient;
use aiaaic_common::{ExternalHarms, Incident, InternalImpacts};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::csv::parse_rows;
use crate::traits::IncidentSource;

/// Title row, column header, and the harms/impacts sub-header.
pub const HEADER_ROWS: usize = 3;

mod col {
    pub const ID: usize = 0;
    pub const HEADLINE: usize = 1;
    pub const OCCURRED: usize = 2;
    pub const COUNTRIES: usize = 3;
    pub const SECTORS: usize = 4;
    pub const DEPLOYERS: usize = 5;
    pub const DEVELOPERS: usize = 6;
    pub const SYSTEM_NAMES: usize = 7;
    pub const TECHNOLOGIES: usize = 8;
    pub const PURPOSES: usize = 9;
    pub const NEWS_TRIGGERS: usize = 10;
    pub const ISSUES: usize = 11;
    pub const HARMS_INDIVIDUAL: usize = 12;
    pub const HARMS_SOCIETAL: usize = 13;
    pub const HARMS_ENVIRONMENTAL: usize = 14;
    pub const IMPACTS_STRATEGIC: usize = 15;
    pub const IMPACTS_OPERATIONAL: usize = 16;
    pub const IMPACTS_FINANCIAL: usize = 17;
    pub const IMPACTS_LEGAL: usize = 18;
    pub const DETAIL_URL: usize = 19;
}

/// `"a; b;c"` → `["a", "b", "c"]`.
pub fn split_field(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|c| c.trim()).unwrap_or_default()
}

fn list(row: &[String], idx: usize) -> Vec<String> {
    split_field(cell(row, idx))
}

/// One data row, or `None` when the id cell is empty.
pub fn row_to_incident(row: &[String]) -> Option<Incident> {
    let id = cell(row, col::ID);
    if id.is_empty() {
        return None;
    }

    let mut incident = Incident::new(id, cell(row, col::HEADLINE))
        .with_detail_page_url(Some(cell(row, col::DETAIL_URL)));
    incident.occurred = cell(row, col::OCCURRED).to_string();
    incident.countries = list(row, col::COUNTRIES);
    incident.sectors = list(row, col::SECTORS);
    incident.deployers = list(row, col::DEPLOYERS);
    incident.developers = list(row, col::DEVELOPERS);
    incident.system_names = list(row, col::SYSTEM_NAMES);
    incident.technologies = list(row, col::TECHNOLOGIES);
    incident.purposes = list(row, col::PURPOSES);
    incident.news_triggers = list(row, col::NEWS_TRIGGERS);
    incident.issues = list(row, col::ISSUES);
    incident.external_harms = ExternalHarms {
        individual: list(row, col::HARMS_INDIVIDUAL),
        societal: list(row, col::HARMS_SOCIETAL),
        environmental: list(row, col::HARMS_ENVIRONMENTAL),
    };
    incident.internal_impacts = InternalImpacts {
        strategic_reputational: list(row, col::IMPACTS_STRATEGIC),
        operational: list(row, col::IMPACTS_OPERATIONAL),
        financial: list(row, col::IMPACTS_FINANCIAL),
        legal_regulatory: list(row, col::IMPACTS_LEGAL),
    };
    Some(incident)
}

pub fn parse_sheet(csv: &str) -> Vec<Incident> {
    parse_rows(csv)
        .iter()
        .skip(HEADER_ROWS)
        .filter_map(|row| row_to_incident(row))
        .collect()
}

/// Downloads and parses the sheet export on every call.
pub struct SheetSource {
    client: PageClient,
    url: String,
}

impl SheetSource {
    pub fn new(client: PageClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl IncidentSource for SheetSource {
    async fn incidents(&self) -> Result<Vec<Incident>> {
        let csv = self
            .client
            .fetch(&self.url)
            .await
            .with_context(|| format!("Failed to download incident sheet from {}", self.url))?;
        let incidents = parse_sheet(&csv);
        info!(count = incidents.len(), "Loaded incidents from sheet");
        Ok(incidents)
    }
}
