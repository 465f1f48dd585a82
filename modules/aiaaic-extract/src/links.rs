//! Source and related-incident links.

use std::collections::HashSet;
use std::sync::LazyLock;

use aiaaic_common::{RelatedIncident, SourceLink, BASE_URL, SOURCE_DOMAIN};
use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use crate::boilerplate::is_boilerplate;
use crate::description::is_related_section;
use crate::markup::{has_anchor, inline_text, ANCHOR, LIST_ITEM, PARAGRAPH, SECTION, STYLED_SPAN};

/// Path prefix shared by every incident detail page.
pub const REPOSITORY_PATH: &str = "/aiaaic-repository/ai-algorithmic-and-automation-incidents/";

/// Substrings of URLs that are never news sources.
pub const BLOCKED_PATTERNS: [&str; 10] = [
    "facebook.com/sharer",
    "twitter.com/intent",
    "linkedin.com/share",
    "linktree",
    "gstatic.com",
    "google.com/url",
    "docs.google.com/forms",
    "docs.google.com/spreadsheets",
    "wikipedia.org",
    "doubao.com",
];

static BASE: LazyLock<Url> = LazyLock::new(|| Url::parse(BASE_URL).expect("valid base url"));

static TEXT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\\]+[^\s<>"'\\.,;:!?)\]}]"#).expect("valid regex")
});

pub fn is_blocked(url: &str) -> bool {
    let lower = url.to_lowercase();
    BLOCKED_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Hosted on the site itself (`aiaaic.org` or any subdomain).
pub fn is_own_domain(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().is_some_and(|host| {
            let host = host.to_lowercase();
            host == SOURCE_DOMAIN || host.ends_with(&format!(".{SOURCE_DOMAIN}"))
        }),
        Err(_) => url.to_lowercase().contains(SOURCE_DOMAIN),
    }
}

/// Path of `href` resolved against the site root, without a trailing slash.
fn normalized_path(href: &str) -> Option<String> {
    BASE.join(href)
        .ok()
        .map(|u| u.path().trim_end_matches('/').to_string())
}

fn link_title(text: String) -> Option<String> {
    (!text.is_empty() && !is_boilerplate(&text) && !text.starts_with("http")).then_some(text)
}

#[derive(Default)]
struct LinkCollector {
    sources: Vec<SourceLink>,
    related: Vec<RelatedIncident>,
    seen_sources: HashSet<String>,
    seen_related: HashSet<String>,
}

impl LinkCollector {
    fn push_source(&mut self, url: String, title: Option<String>) {
        if is_blocked(&url) || is_own_domain(&url) || !self.seen_sources.insert(url.clone()) {
            return;
        }
        self.sources.push(SourceLink { url, title });
    }

    fn visit_section(&mut self, section: ElementRef<'_>, current_path: Option<&str>) {
        let related_block = is_related_section(section);

        for anchor in section.select(&ANCHOR) {
            let href = anchor.value().attr("href").unwrap_or_default().trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let text = inline_text(anchor);

            if href.starts_with("http") && !is_own_domain(href) {
                self.push_source(href.to_string(), link_title(text));
            } else if related_block && href.contains(REPOSITORY_PATH) {
                let path = normalized_path(href);
                if path.is_some() && path.as_deref() == current_path {
                    continue;
                }
                let full_url = match BASE.join(href) {
                    Ok(u) if href.starts_with('/') => u.to_string(),
                    _ => href.to_string(),
                };
                // Keyed by path so absolute and relative forms of one page collapse.
                if !self
                    .seen_related
                    .insert(path.unwrap_or_else(|| full_url.clone()))
                {
                    continue;
                }
                if !text.is_empty() && !is_boilerplate(&text) {
                    self.related.push(RelatedIncident {
                        title: text,
                        url: full_url,
                    });
                }
            }
        }
    }

    /// URLs written out as text: underlined spans, and list items or
    /// paragraphs that contain no anchor.
    fn visit_plain_text(&mut self, document: &Html) {
        let mut found: Vec<String> = Vec::new();

        for span in document.select(&STYLED_SPAN) {
            let underlined = span
                .value()
                .attr("style")
                .is_some_and(|s| s.contains("underline"));
            if underlined {
                let text = inline_text(span);
                if text.starts_with("http") {
                    found.push(text);
                }
            }
        }

        for el in document
            .select(&LIST_ITEM)
            .chain(document.select(&PARAGRAPH))
            .filter(|el| !has_anchor(*el))
        {
            let text = inline_text(el);
            found.extend(TEXT_URL.find_iter(&text).map(|m| m.as_str().to_string()));
        }

        for url in found {
            self.push_source(url, None);
        }
    }
}

/// Source links and related incidents for the page at `current_url`.
pub fn extract_links(document: &Html, current_url: &str) -> (Vec<SourceLink>, Vec<RelatedIncident>) {
    let current_path = normalized_path(current_url);
    let sections: Vec<ElementRef> = document.select(&SECTION).collect();
    // The last section is the site footer.
    let content = match sections.len() {
        0 | 1 => &sections[..],
        n => &sections[..n - 1],
    };

    let mut collector = LinkCollector::default();
    for section in content {
        collector.visit_section(*section, current_path.as_deref());
    }
    collector.visit_plain_text(document);

    (collector.sources, collector.related)
}
