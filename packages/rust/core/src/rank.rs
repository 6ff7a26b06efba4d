//! Relevance ranking over candidate passages.

use groundwork_shared::Passage;
use groundwork_text::relevance;

/// Score one passage against a query.
pub fn score_passage(passage: &Passage, query: &str) -> u32 {
    relevance::score(&relevance::query_terms(query), &passage.title, &passage.body)
}

/// Order passages by descending score, dropping those that score zero.
///
/// The sort is stable: equal scores keep their input order.
pub fn rank(passages: Vec<Passage>, query: &str) -> Vec<Passage> {
    let terms = relevance::query_terms(query);
    let mut scored: Vec<(u32, Passage)> = passages
        .into_iter()
        .map(|p| (relevance::score(&terms, &p.title, &p.body), p))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|(a, _), (b, _)| b.cmp(a));
    scored.into_iter().map(|(_, p)| p).collect()
}
