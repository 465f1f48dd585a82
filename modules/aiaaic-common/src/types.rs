use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain every incident detail page lives on.
pub const SOURCE_DOMAIN: &str = "aiaaic.org";

/// Base URL used to resolve site-relative links.
pub const BASE_URL: &str = "https://www.aiaaic.org";

// --- Incident ---

/// External harms caused by the incident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalHarms {
    #[serde(default)]
    pub individual: Vec<String>,
    #[serde(default)]
    pub societal: Vec<String>,
    #[serde(default)]
    pub environmental: Vec<String>,
}

/// Internal impacts on the deploying/developing organisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalImpacts {
    #[serde(default)]
    pub strategic_reputational: Vec<String>,
    #[serde(default)]
    pub operational: Vec<String>,
    #[serde(default)]
    pub financial: Vec<String>,
    #[serde(default)]
    pub legal_regulatory: Vec<String>,
}

/// A news/reference link cited by an incident page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Another incident page referenced from the "Related" block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedIncident {
    pub title: String,
    pub url: String,
}

/// One AIAAIC incident: spreadsheet columns plus fields scraped from its detail page.
///
/// Identity is `aiaaic_id`. The ledger may hold several records for one id
/// (one per scrape attempt); the consistency checker resolves those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub aiaaic_id: String,

    // Spreadsheet columns
    pub headline: String,
    #[serde(default)]
    pub occurred: String,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub deployers: Vec<String>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub system_names: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub purposes: Vec<String>,
    #[serde(default)]
    pub news_triggers: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub external_harms: ExternalHarms,
    #[serde(default)]
    pub internal_impacts: InternalImpacts,
    #[serde(default)]
    pub detail_page_url: Option<String>,

    // Detail page
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_links: Vec<SourceLink>,
    #[serde(default)]
    pub related_incidents: Vec<RelatedIncident>,
    #[serde(default)]
    pub page_published: Option<String>,
    #[serde(default)]
    pub page_scraped: bool,

    #[serde(default = "Utc::now", with = "crate::timestamp")]
    pub scraped_at: DateTime<Utc>,
}

impl Incident {
    /// A freshly-parsed spreadsheet row: nothing scraped yet.
    pub fn new(aiaaic_id: impl Into<String>, headline: impl Into<String>) -> Self {
        Self {
            aiaaic_id: aiaaic_id.into(),
            headline: headline.into(),
            occurred: String::new(),
            countries: Vec::new(),
            sectors: Vec::new(),
            deployers: Vec::new(),
            developers: Vec::new(),
            system_names: Vec::new(),
            technologies: Vec::new(),
            purposes: Vec::new(),
            news_triggers: Vec::new(),
            issues: Vec::new(),
            external_harms: ExternalHarms::default(),
            internal_impacts: InternalImpacts::default(),
            detail_page_url: None,
            description: None,
            source_links: Vec::new(),
            related_incidents: Vec::new(),
            page_published: None,
            page_scraped: false,
            scraped_at: Utc::now(),
        }
    }

    /// Set the detail page URL, dropping anything not hosted on the source domain.
    pub fn with_detail_page_url(mut self, url: Option<&str>) -> Self {
        self.detail_page_url = url
            .map(str::trim)
            .filter(|u| !u.is_empty() && u.contains(SOURCE_DOMAIN))
            .map(String::from);
        self
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Scraped, but the page yielded no description or no sources.
    /// Related incidents may legitimately be empty and are not checked.
    pub fn is_incomplete(&self) -> bool {
        self.page_scraped && (!self.has_description() || self.source_links.is_empty())
    }

    /// Names of the page fields this record is missing (see [`Incident::is_incomplete`]).
    pub fn missing_page_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_description() {
            missing.push("description");
        }
        if self.source_links.is_empty() {
            missing.push("sources");
        }
        missing
    }
}

// --- Scraping errors ---

/// Terminal failure of one incident's fetch, kept so a later run can retry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingError {
    pub aiaaic_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub error_type: String,
    pub error_message: String,
    #[serde(default = "Utc::now", with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ScrapingError {
    pub fn new(
        aiaaic_id: impl Into<String>,
        url: Option<String>,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            aiaaic_id: aiaaic_id.into(),
            url,
            error_type: error_type.into(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }
}
