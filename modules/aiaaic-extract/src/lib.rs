//! Structured fields from an AIAAIC incident detail page.
//!
//! Extraction is pure and synchronous: `HTML × URL → ExtractedFields`. It
//! never fails; a field the page does not yield is simply `None` or empty.

pub mod boilerplate;
pub mod dates;
pub mod description;
pub mod links;
mod markup;

use aiaaic_common::{Incident, RelatedIncident, SourceLink};
use chrono::Utc;
use scraper::Html;
use tracing::debug;

pub use boilerplate::{contains_boilerplate_phrase, is_boilerplate, BOILERPLATE_PHRASES};
pub use description::{
    DescriptionStrategy, EmphasisStrategy, MainRegionStrategy, MetaDescriptionStrategy,
    SectionStrategy,
};
pub use links::{is_blocked, is_own_domain, BLOCKED_PATTERNS, REPOSITORY_PATH};

/// Everything a detail page contributes to an [`Incident`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub description: Option<String>,
    pub source_links: Vec<SourceLink>,
    pub related_incidents: Vec<RelatedIncident>,
    pub page_published: Option<String>,
    /// "Occurred" as printed on the page. Only used when the sheet left it blank.
    pub occurred: Option<String>,
}

impl ExtractedFields {
    /// Enrich `incident` in place and mark it scraped.
    pub fn apply_to(self, incident: &mut Incident) {
        incident.description = self.description;
        incident.source_links = self.source_links;
        incident.related_incidents = self.related_incidents;
        incident.page_published = self.page_published;
        if incident.occurred.trim().is_empty() {
            if let Some(occurred) = self.occurred {
                incident.occurred = occurred;
            }
        }
        incident.page_scraped = true;
        incident.scraped_at = Utc::now();
    }
}

/// Ordered chain of description strategies plus the fixed link/date passes.
pub struct Extractor {
    strategies: Vec<Box<dyn DescriptionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(SectionStrategy),
                Box::new(MainRegionStrategy),
                Box::new(EmphasisStrategy),
                Box::new(MetaDescriptionStrategy),
            ],
        }
    }
}

impl Extractor {
    /// A chain with no description strategies. Links and dates are still extracted.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl DescriptionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Insert at `index` (clamped to the chain length).
    pub fn insert_strategy(
        mut self,
        index: usize,
        strategy: impl DescriptionStrategy + 'static,
    ) -> Self {
        let index = index.min(self.strategies.len());
        self.strategies.insert(index, Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, html: &str, url: &str) -> ExtractedFields {
        let document = Html::parse_document(html);

        let page_text = markup::block_text(document.root_element());
        let (occurred, page_published) = dates::extract_dates(&page_text);
        let (source_links, related_incidents) = links::extract_links(&document, url);
        let description = self.describe(&document);

        debug!(
            url,
            has_description = description.is_some(),
            sources = source_links.len(),
            related = related_incidents.len(),
            "Extracted page"
        );

        ExtractedFields {
            description,
            source_links,
            related_incidents,
            page_published,
            occurred,
        }
    }

    /// First strategy whose candidate is free of boilerplate phrases.
    fn describe(&self, document: &Html) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let candidate = strategy.describe(document)?;
            if contains_boilerplate_phrase(&candidate) {
                debug!(strategy = strategy.name(), "Rejected boilerplate description");
                return None;
            }
            Some(candidate)
        })
    }
}

/// Extract with the default strategy chain.
pub fn extract(html: &str, url: &str) -> ExtractedFields {
    Extractor::default().extract(html, url)
}
