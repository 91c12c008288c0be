//! Address normalization for similarity comparison.

/// Street-suffix abbreviations applied word by word.
const SUFFIXES: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("boulevard", "blvd"),
    ("road", "rd"),
    ("drive", "dr"),
    ("place", "pl"),
    ("court", "ct"),
    ("lane", "ln"),
];

/// Normalize an address for comparison.
///
/// Lower-cases, drops everything from the first comma on (city, state, zip),
/// abbreviates street suffixes and collapses whitespace.
pub fn normalize_address(address: &str) -> String {
    let lower = address.to_lowercase();
    let street = lower.split(',').next().unwrap_or_default();

    street
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_end_matches('.');
            SUFFIXES
                .iter()
                .find(|(long, _)| *long == bare)
                .map(|(_, short)| *short)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
