//! Rule condition matching.
//!
//! # Design Decisions
//! - Country matching is case-insensitive (ISO codes arrive in either case)
//! - Empty condition = always matches (wildcard)
//! - A condition on a hint the caller did not send never matches

use crate::load_balancer::SelectionHints;

/// Trait for matching selection hints against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the hints match this condition.
    fn matches(&self, hints: &SelectionHints) -> bool;
}

/// Matches the caller's country against a set.
#[derive(Debug, Clone)]
pub struct CountryMatcher {
    countries: Vec<String>,
}

impl CountryMatcher {
    /// Countries are normalized to uppercase.
    pub fn new(countries: &[String]) -> Self {
        Self {
            countries: countries.iter().map(|c| c.to_uppercase()).collect(),
        }
    }
}

impl Matcher for CountryMatcher {
    fn matches(&self, hints: &SelectionHints) -> bool {
        hints
            .country
            .as_deref()
            .map(|c| self.countries.contains(&c.to_uppercase()))
            .unwrap_or(false)
    }
}

/// Matches the requested stream id against a set.
#[derive(Debug, Clone)]
pub struct StreamMatcher {
    stream_ids: Vec<u64>,
}

impl StreamMatcher {
    pub fn new(stream_ids: &[u64]) -> Self {
        Self {
            stream_ids: stream_ids.to_vec(),
        }
    }
}

impl Matcher for StreamMatcher {
    fn matches(&self, hints: &SelectionHints) -> bool {
        hints
            .stream_id
            .map(|id| self.stream_ids.contains(&id))
            .unwrap_or(false)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, hints: &SelectionHints) -> bool {
        self.matchers.iter().all(|m| m.matches(hints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(country: Option<&str>, stream_id: Option<u64>) -> SelectionHints {
        SelectionHints {
            country: country.map(String::from),
            stream_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_country_matcher() {
        let matcher = CountryMatcher::new(&["de".into(), "AT".into()]);
        assert!(matcher.matches(&hints(Some("DE"), None)));
        assert!(matcher.matches(&hints(Some("at"), None)));
        assert!(!matcher.matches(&hints(Some("FR"), None)));
        assert!(!matcher.matches(&hints(None, None)));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(CountryMatcher::new(&["US".into()])),
            Box::new(StreamMatcher::new(&[7, 8])),
        ]);
        assert!(matcher.matches(&hints(Some("US"), Some(8))));
        assert!(!matcher.matches(&hints(Some("US"), Some(9))));
        assert!(!matcher.matches(&hints(None, Some(7))));

        assert!(AndMatcher::new(vec![]).matches(&hints(None, None)));
    }
}
