//! Fuzzy product matching and price/availability text parsing.
//!
//! Scores are additive: exact normalized name 100, token overlap up to 60,
//! brand 30 (or 15 on containment), shared model number 40.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candidates scoring below this are excluded from price results.
pub const MIN_MATCH_SCORE: u32 = 60;

/// Best matches kept per retailer.
pub const MAX_MATCHES_PER_RETAILER: usize = 3;

const EXACT_NAME_POINTS: u32 = 100;
const TOKEN_OVERLAP_POINTS: f64 = 60.0;
const BRAND_EXACT_POINTS: u32 = 30;
const BRAND_PARTIAL_POINTS: u32 = 15;
const MODEL_NUMBER_POINTS: u32 = 40;

const SEARCH_STOPWORDS: [&str; 6] = ["the", "and", "for", "with", "tool", "only"];
const MAX_SEARCH_KEYWORDS: usize = 4;

// Tried in order; first match wins. e.g. DHP484Z, 18VXR, Z516.
static MODEL_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\b([A-Z]{2,}\d{2,}[A-Z]*)\b").expect("valid regex"),
        Regex::new(r"\b(\d{2,}[A-Z]{2,})\b").expect("valid regex"),
        Regex::new(r"\b([A-Z]\d{3,})\b").expect("valid regex"),
    ]
});

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?([0-9,]+\.?[0-9]*)").expect("valid regex"));

const OUT_OF_STOCK_TERMS: [&str; 4] = ["out of stock", "unavailable", "sold out", "not available"];

/// A product the caller is looking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
}

impl MatchQuery {
    #[must_use]
    pub fn new(name: impl Into<String>, brand: Option<&str>) -> Self {
        Self {
            name: name.into(),
            brand: brand.map(str::to_string),
        }
    }

    /// Cache key for this query, stable across case and spacing.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = normalize_name(&self.name);
        if let Some(brand) = self.brand.as_deref().map(normalize_name) {
            if !brand.is_empty() && !key.contains(&brand) {
                key = format!("{brand} {key}");
            }
        }
        key
    }
}

/// Anything with a name and optional brand that can be scored.
pub trait MatchCandidate {
    fn match_name(&self) -> &str;
    fn match_brand(&self) -> Option<&str>;
}

impl MatchCandidate for MatchQuery {
    fn match_name(&self) -> &str {
        &self.name
    }

    fn match_brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
}

/// Lowercase, replace anything but letters, digits and `_` with spaces, and
/// collapse runs of whitespace.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First model-number-like token in `name`. Case-sensitive, so this must be
/// given the name as published rather than a normalized one.
#[must_use]
pub fn extract_model_number(name: &str) -> Option<&str> {
    MODEL_PATTERNS
        .iter()
        .find_map(|re| re.captures(name).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

/// Score how well `candidate` matches `query`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn score(query: &impl MatchCandidate, candidate: &impl MatchCandidate) -> u32 {
    let query_name = normalize_name(query.match_name());
    let candidate_name = normalize_name(candidate.match_name());

    let mut total = 0u32;
    if query_name == candidate_name {
        total += EXACT_NAME_POINTS;
    }

    let query_tokens: Vec<&str> = query_name.split(' ').collect();
    let candidate_tokens: Vec<&str> = candidate_name.split(' ').filter(|t| !t.is_empty()).collect();
    let hits = query_tokens
        .iter()
        .filter(|word| {
            word.chars().count() > 2
                && candidate_tokens
                    .iter()
                    .any(|ct| ct.contains(**word) || word.contains(ct))
        })
        .count();
    total += ((hits as f64 / query_tokens.len() as f64) * TOKEN_OVERLAP_POINTS).round() as u32;

    let query_brand = query.match_brand().map(normalize_name).unwrap_or_default();
    let candidate_brand = candidate.match_brand().map(normalize_name).unwrap_or_default();
    if !query_brand.is_empty() && !candidate_brand.is_empty() {
        if query_brand == candidate_brand {
            total += BRAND_EXACT_POINTS;
        } else if query_brand.contains(&candidate_brand) || candidate_brand.contains(&query_brand) {
            total += BRAND_PARTIAL_POINTS;
        }
    }

    if let (Some(a), Some(b)) = (
        extract_model_number(query.match_name()),
        extract_model_number(candidate.match_name()),
    ) {
        if a == b {
            total += MODEL_NUMBER_POINTS;
        }
    }

    total
}

/// Score every candidate, keep those at or above [`MIN_MATCH_SCORE`], and
/// return the best [`MAX_MATCHES_PER_RETAILER`] in descending score order.
/// Equal scores keep input order.
#[must_use]
pub fn rank_candidates<C: MatchCandidate>(query: &MatchQuery, candidates: Vec<C>) -> Vec<(u32, C)> {
    let mut scored: Vec<(u32, C)> = candidates
        .into_iter()
        .map(|c| (score(query, &c), c))
        .filter(|(s, _)| *s >= MIN_MATCH_SCORE)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(MAX_MATCHES_PER_RETAILER);
    scored
}

/// Parse a displayed price such as `$1,299.00`. Missing, unparseable or
/// non-positive prices yield `None`.
#[must_use]
pub fn extract_price(text: &str) -> Option<Decimal> {
    PRICE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| {
            let digits = m.as_str().replace(',', "");
            Decimal::from_str(digits.trim_end_matches('.')).ok()
        })
        .filter(|p| *p > Decimal::ZERO)
}

/// Empty availability text means in stock.
#[must_use]
pub fn parse_availability(text: Option<&str>) -> bool {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return true;
    };
    let lower = text.to_lowercase();
    !OUT_OF_STOCK_TERMS.iter().any(|term| lower.contains(term))
}

/// Retailer search string: brand plus model number when one is present,
/// otherwise brand plus up to four keywords.
#[must_use]
pub fn build_search_query(query: &MatchQuery) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(brand) = query.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        parts.push(brand);
    }
    if let Some(model) = extract_model_number(&query.name) {
        parts.push(model);
    } else {
        parts.extend(
            query
                .name
                .split(' ')
                .filter(|w| w.chars().count() > 2)
                .filter(|w| !SEARCH_STOPWORDS.contains(&w.to_lowercase().as_str()))
                .take(MAX_SEARCH_KEYWORDS),
        );
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str, brand: Option<&str>) -> MatchQuery {
        MatchQuery::new(name, brand)
    }

    #[test]
    fn scenario_c_model_number_and_brand_stack() {
        let query = q("Makita DHP484Z Drill", Some("Makita"));
        let candidate = q(
            "Makita 18V LXT Brushless Hammer Driver Drill DHP484Z",
            Some("Makita"),
        );
        let s = score(&query, &candidate);
        // 60 token overlap + 30 brand + 40 model number.
        assert_eq!(s, 130);
        assert!(s >= 100);
    }

    #[test]
    fn self_match_scores_at_least_exact_points() {
        for name in ["DeWalt 20V Max Circular Saw", "a", "Castrol GTX 20W-50 5L"] {
            let query = q(name, Some("Brand"));
            assert!(score(&query, &query) >= 100, "{name}");
        }
    }

    #[test]
    fn unrelated_candidate_scores_zero() {
        let query = q("Makita DHP484Z Drill", Some("Makita"));
        let candidate = q("Garden Hose 30m", Some("Hozelock"));
        assert_eq!(score(&query, &candidate), 0);
    }

    #[test]
    fn brand_containment_scores_partial() {
        let query = q("Cordless Drill", Some("Makita"));
        let candidate = q("Impact Wrench", Some("Makita Tools"));
        assert_eq!(score(&query, &candidate), 15);
    }

    #[test]
    fn short_tokens_do_not_count_but_do_dilute() {
        // "v" and "kit" : only "kit" is long enough; 1 of 2 tokens.
        let query = q("V Kit", None);
        let candidate = q("Starter Kit", None);
        assert_eq!(score(&query, &candidate), 30);
    }

    #[test]
    fn model_number_patterns_in_priority_order() {
        assert_eq!(extract_model_number("Makita DHP484Z Drill"), Some("DHP484Z"));
        assert_eq!(extract_model_number("Ryobi 18VXR Kit"), Some("18VXR"));
        assert_eq!(extract_model_number("Filter Z516"), Some("Z516"));
        assert_eq!(extract_model_number("makita dhp484z"), None);
    }

    #[test]
    fn rank_filters_sorts_and_truncates() {
        let query = q("Makita DHP484Z Drill", Some("Makita"));
        let candidates = vec![
            q("Garden Hose", None),
            q("Makita Drill", Some("Makita")),
            q("Makita DHP484Z Drill", Some("Makita")),
            q("Makita DHP484Z Bare Tool", Some("Makita")),
            q("Makita Drill Bits", Some("Makita")),
        ];
        let ranked = rank_candidates(&query, candidates);
        let names: Vec<&str> = ranked.iter().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Makita DHP484Z Drill",
                "Makita DHP484Z Bare Tool",
                "Makita Drill"
            ]
        );
        assert!(ranked.iter().all(|(s, _)| *s >= MIN_MATCH_SCORE));
        assert!(ranked.windows(2).all(|w| w[0].0 >= w[1].0));
    }

    #[test]
    fn price_text_parses_with_separators() {
        assert_eq!(extract_price("$1,299.00"), Some(Decimal::new(129_900, 2)));
        assert_eq!(extract_price("Now $289"), Some(Decimal::new(289, 0)));
        assert_eq!(extract_price("12."), Some(Decimal::new(12, 0)));
        assert_eq!(extract_price("$0.00"), None);
        assert_eq!(extract_price("Call for price"), None);
        assert_eq!(extract_price(""), None);
        assert_eq!(extract_price("Sale, now $45.50"), Some(Decimal::new(4550, 2)));
    }

    #[test]
    fn availability_defaults_to_in_stock() {
        assert!(parse_availability(None));
        assert!(parse_availability(Some("  ")));
        assert!(parse_availability(Some("In stock at Botany")));
        assert!(!parse_availability(Some("Currently OUT OF STOCK")));
        assert!(!parse_availability(Some("Not available online")));
    }

    #[test]
    fn search_query_prefers_model_number() {
        assert_eq!(
            build_search_query(&q("Makita DHP484Z Drill", Some("Makita"))),
            "Makita DHP484Z"
        );
        assert_eq!(
            build_search_query(&q("The Best Hammer With Claw and Grip Handle", None)),
            "Best Hammer Claw Grip"
        );
    }

    #[test]
    fn cache_key_folds_case_and_brand() {
        assert_eq!(q("Makita  Drill", Some("makita")).cache_key(), "makita drill");
        assert_eq!(q("Hammer Drill", Some("Makita")).cache_key(), "makita hammer drill");
        assert_eq!(q("makita drill", None).cache_key(), "makita drill");
    }
}
