use std::sync::LazyLock;

use regex::Regex;

// Values stop at the next label or the end of the line.
static OCCURRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Occurred\s*:\s*([A-Za-z0-9 ,/\-]+?)[ \t]*(?:Page published|\n|$)")
        .expect("valid regex")
});

static PAGE_PUBLISHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Page published\s*:\s*([A-Za-z0-9 ,/\-]+?)[ \t]*(?:Report|\n|$)")
        .expect("valid regex")
});

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `(occurred, page_published)` from the page's flattened text.
pub fn extract_dates(page_text: &str) -> (Option<String>, Option<String>) {
    (capture(&OCCURRED, page_text), capture(&PAGE_PUBLISHED, page_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_on_separate_lines() {
        let text = "Title\nOccurred: March 2023\nPage published: May 2023\nReport incident";
        assert_eq!(
            extract_dates(text),
            (Some("March 2023".into()), Some("May 2023".into()))
        );
    }

    #[test]
    fn value_on_next_line_after_label() {
        let text = "Occurred:\nJanuary 2021\nPage published:\nFebruary 2021";
        assert_eq!(
            extract_dates(text),
            (Some("January 2021".into()), Some("February 2021".into()))
        );
    }

    #[test]
    fn labels_on_one_line() {
        let text = "Occurred: 2019 Page published: June 2020 Report incident";
        assert_eq!(
            extract_dates(text),
            (Some("2019".into()), Some("June 2020".into()))
        );
    }

    #[test]
    fn missing_labels_are_none() {
        assert_eq!(extract_dates("Nothing to see here"), (None, None));
    }
}
