//! City name normalization.
//!
//! Raw caller input is checked against the allowed character set, trimmed, and
//! mapped through a small correction table of known misspellings and
//! transliterations. Rejected names are dropped by the caller without a
//! per-city error.

use serde::{Deserialize, Serialize};

/// Known misspellings and non-Latin spellings mapped to the provider's name
const CORRECTIONS: &[(&str, &str)] = &[
    ("Киев", "Kyiv"),
    ("Київ", "Kyiv"),
    ("Kiev", "Kyiv"),
    ("Londn", "London"),
    ("Лондон", "London"),
    ("Париж", "Paris"),
    ("Токио", "Tokyo"),
    ("Пекин", "Beijing"),
    ("Нью-Йорк", "New York"),
];

/// A validated city name ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityQuery {
    /// The string exactly as submitted; the key of the task result
    pub original: String,
    /// The name sent to the provider and the classifier
    pub canonical: String,
}

impl CityQuery {
    /// Normalize `raw`, returning `None` when it fails validation.
    pub fn parse(raw: &str) -> Option<Self> {
        normalize_city_name(raw).map(|canonical| Self {
            original: raw.to_string(),
            canonical,
        })
    }
}

/// Letters of any script, whitespace, hyphens and apostrophes
fn is_allowed_char(c: char) -> bool {
    c.is_alphabetic() || c.is_whitespace() || c == '-' || c == '\'' || c == '’'
}

/// Validate and canonicalize a raw city name.
///
/// Returns `None` if the name is empty after trimming or contains characters
/// outside the allowed set. Otherwise returns the corrected spelling, or the
/// trimmed input unchanged when no correction applies.
pub fn normalize_city_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    if !trimmed.chars().all(is_allowed_char) {
        tracing::debug!("Rejecting city name with disallowed characters: {:?}", raw);
        return None;
    }

    let canonical = CORRECTIONS
        .iter()
        .find(|(from, _)| *from == trimmed)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| trimmed.to_string());

    Some(canonical)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_corrections_applied() {
        assert_eq!(normalize_city_name("Londn").as_deref(), Some("London"));
        assert_eq!(normalize_city_name("Киев").as_deref(), Some("Kyiv"));
        assert_eq!(normalize_city_name("Токио").as_deref(), Some("Tokyo"));
    }

    #[test]
    fn test_trims_before_lookup() {
        assert_eq!(normalize_city_name("  Londn \t").as_deref(), Some("London"));
        assert_eq!(normalize_city_name(" Paris ").as_deref(), Some("Paris"));
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(
            normalize_city_name("Nonexistentville").as_deref(),
            Some("Nonexistentville")
        );
        assert_eq!(normalize_city_name("São Paulo").as_deref(), Some("São Paulo"));
        assert_eq!(
            normalize_city_name("Saint-Jean-d'Angély").as_deref(),
            Some("Saint-Jean-d'Angély")
        );
        assert_eq!(normalize_city_name("Харків").as_deref(), Some("Харків"));
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(normalize_city_name("Paris75").is_none());
        assert!(normalize_city_name("Kyiv; DROP TABLE").is_none());
        assert!(normalize_city_name("<script>").is_none());
    }

    #[test]
    fn test_rejects_blank_and_punctuation_only() {
        assert!(normalize_city_name("").is_none());
        assert!(normalize_city_name("   ").is_none());
        assert!(normalize_city_name("--'").is_none());
    }

    #[test]
    fn test_city_query_keeps_original() {
        let query = CityQuery::parse(" Londn").unwrap();
        assert_eq!(query.original, " Londn");
        assert_eq!(query.canonical, "London");
    }
}
