// Text helpers over the parsed DOM. All text excludes script/style content.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

const HIDDEN_TAGS: [&str; 4] = ["script", "style", "template", "noscript"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

pub(crate) static SECTION: LazyLock<Selector> = LazyLock::new(|| selector("section"));
pub(crate) static NARRATIVE_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| selector("p, h1, h2, h3, h4, h5, h6"));
pub(crate) static MAIN_REGION: LazyLock<Selector> = LazyLock::new(|| selector(r#"[role="main"]"#));
pub(crate) static EMPHASIS: LazyLock<Selector> = LazyLock::new(|| selector("b, strong"));
pub(crate) static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:description"]"#));
pub(crate) static ITEMPROP_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[itemprop="description"]"#));
pub(crate) static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
pub(crate) static ANY_ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));
pub(crate) static STYLED_SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span[style]"));
pub(crate) static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("li"));
pub(crate) static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));

/// Visible text nodes under `el`, in document order.
pub(crate) fn visible_text<'a>(el: ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    el.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| HIDDEN_TAGS.contains(&e.name())))
            .unwrap_or(false);
        (!hidden).then_some(&**text)
    })
}

/// Text of an inline run: nodes concatenated, whitespace collapsed.
pub(crate) fn inline_text(el: ElementRef<'_>) -> String {
    let joined: String = visible_text(el).collect();
    collapse_whitespace(&joined)
}

/// Text of a block: one trimmed, non-empty text node per line.
pub(crate) fn block_text(el: ElementRef<'_>) -> String {
    visible_text(el)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_heading(el: ElementRef<'_>) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

pub(crate) fn has_anchor(el: ElementRef<'_>) -> bool {
    el.select(&ANY_ANCHOR).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn script_text_is_hidden() {
        let doc = Html::parse_document(
            "<html><body><p>Visible</p><script>var hidden = 1;</script></body></html>",
        );
        let text = block_text(doc.root_element());
        assert!(text.contains("Visible"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn inline_text_joins_spans() {
        let doc = Html::parse_document("<p><span>Occurred</span><span>: 2023</span></p>");
        let p = doc.select(&PARAGRAPH).next().unwrap();
        assert_eq!(inline_text(p), "Occurred: 2023");
    }

    #[test]
    fn block_text_keeps_node_boundaries() {
        let doc = Html::parse_document("<div><p>One</p>\n  <p>Two</p></div>");
        assert_eq!(block_text(doc.root_element()), "One\nTwo");
    }
}
