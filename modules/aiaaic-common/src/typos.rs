//! Known misspellings in the sheet's `issues` column.
//!
//! Lookup only. Stored records are never rewritten with the corrections.

pub const KNOWN_TYPOS: [(&str, &str); 6] = [
    ("Accuracy/reliabiity", "Accuracy/reliability"),
    ("Accuracy/reliablity", "Accuracy/reliability"),
    ("Accountabiity", "Accountability"),
    ("Compeititon/monopolisation", "Competition/monopolisation"),
    ("Surveillanc", "Surveillance"),
    ("Privacy/surveillance/surveillance", "Privacy/surveillance"),
];

pub fn correction_for(value: &str) -> Option<&'static str> {
    KNOWN_TYPOS
        .iter()
        .find(|(typo, _)| *typo == value)
        .map(|(_, fixed)| *fixed)
}

pub fn has_known_typo(values: &[String]) -> bool {
    values.iter().any(|v| correction_for(v).is_some())
}

/// Render a value for reports: `typo → correction` when known, the value otherwise.
pub fn annotate(value: &str) -> String {
    match correction_for(value) {
        Some(fixed) => format!("{value} → {fixed}"),
        None => value.to_string(),
    }
}
