//! Term-containment relevance scoring.
//!
//! No index, no stemming: a query is lower-cased and split on whitespace,
//! tokens shorter than two characters are dropped, and each remaining token
//! earns [`TITLE_WEIGHT`] for a title hit and [`BODY_WEIGHT`] for a body hit.

/// Points for a token found in the title.
pub const TITLE_WEIGHT: u32 = 10;

/// Points for a token found in the body.
pub const BODY_WEIGHT: u32 = 1;

/// Lower-cased query tokens worth matching.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Score a title/body pair against pre-computed [`query_terms`].
pub fn score(terms: &[String], title: &str, body: &str) -> u32 {
    if terms.is_empty() {
        return 0;
    }

    let title = title.to_lowercase();
    let body = body.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let mut points = 0;
            if title.contains(term.as_str()) {
                points += TITLE_WEIGHT;
            }
            if body.contains(term.as_str()) {
                points += BODY_WEIGHT;
            }
            points
        })
        .sum()
}
