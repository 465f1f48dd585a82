//! Description strategies, tried in order by [`crate::Extractor`].
//!
//! Incident pages are Google Sites exports: a title section, a metadata
//! section, one or more narrative sections, a "Related" block and a footer.
//! None of that is marked up semantically, so each strategy is a heuristic
//! over structure and text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::boilerplate::is_boilerplate;
use crate::markup::{
    block_text, inline_text, is_heading, EMPHASIS, ITEMPROP_DESCRIPTION, MAIN_REGION,
    NARRATIVE_BLOCKS, OG_DESCRIPTION, SECTION,
};

pub const MIN_DESCRIPTION_LEN: usize = 80;
pub const MIN_EMPHASIS_LEN: usize = 50;
pub const MAX_EMPHASIS_PARENT_LEN: usize = 1000;
pub const MIN_META_LEN: usize = 20;

/// Sub-headings that belong to the narrative and are kept as `**Heading**`.
pub const NARRATIVE_HEADINGS: [&str; 8] = [
    "What happened",
    "Background",
    "Impact",
    "Why it happened",
    "What it means",
    "Response",
    "Outcome",
    "Reaction",
];

/// Lowercase prefixes of metadata labels. Two or more in one section marks it as metadata.
const SIGNATURE_FIELDS: [&str; 9] = [
    "system",
    "developer",
    "deployer",
    "countr",
    "sector",
    "technolog",
    "purpose",
    "news trigger",
    "issue",
];

/// A line that opens the metadata block. Everything from here on is not narrative.
static METADATA_FIELD_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:system(?:\s+names?)?|developers?|deployers?|country|countries|sectors?|technology|technologies|purposes?|news\s+triggers?|issues?|occurred|page\s+published)\s*(?::|$)",
    )
    .expect("valid regex")
});

/// One way of finding an incident description in a parsed page.
pub trait DescriptionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn describe(&self, document: &Html) -> Option<String>;
}

/// Narrative content from the middle sections, skipping title, footer,
/// metadata and "Related" blocks.
pub struct SectionStrategy;

impl DescriptionStrategy for SectionStrategy {
    fn name(&self) -> &'static str {
        "section"
    }

    fn describe(&self, document: &Html) -> Option<String> {
        let sections: Vec<ElementRef> = document.select(&SECTION).collect();
        if sections.len() < 3 {
            return None;
        }

        sections[1..sections.len() - 1]
            .iter()
            .filter(|section| !is_metadata_section(**section) && !is_related_section(**section))
            .find_map(|section| collect_narrative(*section))
    }
}

/// Same collection, run over the `role="main"` region.
pub struct MainRegionStrategy;

impl DescriptionStrategy for MainRegionStrategy {
    fn name(&self) -> &'static str {
        "main_region"
    }

    fn describe(&self, document: &Html) -> Option<String> {
        document.select(&MAIN_REGION).next().and_then(collect_narrative)
    }
}

/// First long bold run, widened to its parent block when that stays small.
pub struct EmphasisStrategy;

impl DescriptionStrategy for EmphasisStrategy {
    fn name(&self) -> &'static str {
        "emphasis"
    }

    fn describe(&self, document: &Html) -> Option<String> {
        let emphasis = document.select(&EMPHASIS).find_map(|el| {
            let text = inline_text(el);
            (text.chars().count() > MIN_EMPHASIS_LEN && !is_boilerplate(&text))
                .then_some((el, text))
        })?;
        let (el, text) = emphasis;

        let parent_text = el.parent().and_then(ElementRef::wrap).map(inline_text);
        match parent_text {
            Some(parent)
                if parent.chars().count() > text.chars().count()
                    && parent.chars().count() < MAX_EMPHASIS_PARENT_LEN =>
            {
                Some(parent)
            }
            _ => Some(text),
        }
    }
}

/// `og:description`, then `itemprop="description"`.
pub struct MetaDescriptionStrategy;

impl DescriptionStrategy for MetaDescriptionStrategy {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn describe(&self, document: &Html) -> Option<String> {
        [&*OG_DESCRIPTION, &*ITEMPROP_DESCRIPTION]
            .into_iter()
            .filter_map(|sel| document.select(sel).next())
            .filter_map(|meta| meta.value().attr("content"))
            .map(str::trim)
            .find(|content| content.chars().count() > MIN_META_LEN)
            .map(String::from)
    }
}

pub(crate) fn is_metadata_section(section: ElementRef<'_>) -> bool {
    let lines: Vec<String> = block_text(section)
        .lines()
        .map(|l| l.trim_start().to_lowercase())
        .collect();

    let fields = SIGNATURE_FIELDS
        .iter()
        .filter(|field| lines.iter().any(|l| l.starts_with(*field)))
        .count();
    if fields >= 2 {
        return true;
    }

    let text = lines.join("\n");
    text.contains("occurred:") && text.contains("page published:")
}

pub(crate) fn is_related_section(section: ElementRef<'_>) -> bool {
    inline_text(section).to_lowercase().starts_with("related")
}

fn narrative_heading(text: &str) -> Option<&'static str> {
    let text = text.trim().trim_end_matches(':');
    NARRATIVE_HEADINGS
        .iter()
        .find(|h| h.eq_ignore_ascii_case(text))
        .copied()
}

/// Paragraphs and narrative headings of `container`, up to the first metadata line.
fn collect_narrative(container: ElementRef<'_>) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    for el in container.select(&NARRATIVE_BLOCKS) {
        let text = inline_text(el);
        if text.is_empty() {
            continue;
        }
        if METADATA_FIELD_START.is_match(&text) {
            break;
        }
        if is_heading(el) {
            if let Some(heading) = narrative_heading(&text) {
                lines.push(format!("**{heading}**"));
            }
            continue;
        }
        if is_boilerplate(&text) || text.starts_with("http") {
            continue;
        }
        lines.push(text);
    }

    // A heading with nothing under it adds no narrative.
    while lines.last().is_some_and(|l| l.starts_with("**")) {
        lines.pop();
    }

    let description = lines.join("\n\n");
    (description.chars().count() >= MIN_DESCRIPTION_LEN).then_some(description)
}
