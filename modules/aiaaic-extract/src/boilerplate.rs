/// Navigation/footer strings that never belong in extracted content.
pub const BOILERPLATE_PHRASES: [&str; 10] = [
    "Report incident",
    "Improve page",
    "Access database",
    "Page updated",
    "Google Sites",
    "Skip to main",
    "Skip to navigation",
    "Copy heading link",
    "Back to site",
    "Search this site",
];

/// Text shorter than this is treated as boilerplate.
pub const MIN_TEXT_LEN: usize = 30;

/// Short text, or text containing any boilerplate phrase.
pub fn is_boilerplate(text: &str) -> bool {
    text.chars().count() < MIN_TEXT_LEN || contains_boilerplate_phrase(text)
}

pub fn contains_boilerplate_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_PHRASES
        .iter()
        .any(|phrase| lower.contains(&phrase.to_lowercase()))
}
