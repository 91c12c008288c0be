//! Cleaning of raw text fields read from the lookup source.
//!
//! Lookup pages return decorated text: icon glyphs in the private-use area,
//! multi-line addresses, ratings inside labels like `"4.5 stars"` and review
//! counts like `"(1,234)"`. These helpers turn them into typed fields.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Text at or above this length is treated as page noise, not a field.
pub const MAX_FIELD_LEN: usize = 200;

/// Categories longer than this are not category labels.
pub const MAX_CATEGORY_LEN: usize = 100;

/// Keywords that mark a label as a food-place category.
pub const CATEGORY_KEYWORDS: &[&str] = &[
    "restaurant", "cafe", "food", "cuisine", "bar", "grill", "kitchen", "diner", "pizzeria",
    "bakery", "deli",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static COMMA_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());
static EMPTY_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*,").unwrap());
static RATING_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d.]+)\s*star").unwrap());
static REVIEW_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d,]+)\s*review").unwrap());
static REVIEW_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(?([\d,]+)\)?").unwrap());

fn is_private_use(c: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&c)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Clean a place name; `None` when blank or too long.
pub fn clean_name(text: &str) -> Option<String> {
    let name = collapse_whitespace(text);
    (!name.is_empty() && name.len() < MAX_FIELD_LEN).then_some(name)
}

/// Clean an address: drop icon glyphs, join lines with commas, squeeze
/// whitespace and empty segments.
pub fn clean_address(text: &str) -> Option<String> {
    if text.len() >= MAX_FIELD_LEN {
        return None;
    }
    let text: String = text.chars().filter(|c| !is_private_use(*c)).collect();
    let text = NEWLINES.replace_all(&text, ", ");
    let text = COMMA_SPACING.replace_all(&text, ", ");
    let text = EMPTY_COMMAS.replace_all(&text, ",");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim_matches(|c| c == ' ' || c == ',');
    (!text.is_empty()).then(|| text.to_string())
}

/// Keep a category label only if it names a kind of food place.
pub fn clean_category(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text.len() >= MAX_CATEGORY_LEN {
        return None;
    }
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .any(|kw| lower.contains(kw))
        .then(|| text.to_string())
}

/// Parse a rating from `"4.5 stars"` or a bare `"4.5"`.
///
/// Bare numbers outside 1..=5 are rejected.
pub fn parse_rating(text: &str) -> Option<f32> {
    if let Some(caps) = RATING_LABEL.captures(text) {
        return caps.get(1)?.as_str().parse().ok();
    }
    let rating: f32 = text.trim().parse().ok()?;
    (1.0..=5.0).contains(&rating).then_some(rating)
}

/// Parse a review count from `"1,234 reviews"` or `"(1,234)"`.
pub fn parse_review_count(text: &str) -> Option<u32> {
    let caps = REVIEW_LABEL
        .captures(text)
        .or_else(|| REVIEW_COUNT.captures(text))?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}
