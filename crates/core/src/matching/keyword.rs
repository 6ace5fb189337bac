//! Keyword overlap baseline. Needs no history, metrics or network access, so it always
//! produces a result.

use async_trait::async_trait;

use super::text::{keyword_set, keywords};
use super::{MatchContext, ScoringStrategy, StrategyKind, StrategyResult};
use crate::domain::recommendation::{rank_descending, ScoreFactor, ScoredCandidate};

/// Keyword matches are flagged at a lower bar than the other strategies.
pub const KEYWORD_RECOMMENDED_THRESHOLD: f64 = 50.0;

/// Cap on the query keyword count used as the score denominator.
const MAX_SCORED_KEYWORDS: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Scores every supplier sharing at least one keyword with the RFQ, best first.
    pub fn rank(&self, context: &MatchContext, limit: usize) -> Vec<ScoredCandidate> {
        let query = keywords(&context.rfq.search_text());
        if query.is_empty() {
            return Vec::new();
        }
        let denominator = query.len().min(MAX_SCORED_KEYWORDS) as f64;

        let mut scored: Vec<ScoredCandidate> = context
            .suppliers
            .iter()
            .filter_map(|supplier| {
                let supplier_words = keyword_set(&supplier.search_text());
                let matched: Vec<&str> = query
                    .iter()
                    .filter(|word| supplier_words.contains(*word))
                    .map(String::as_str)
                    .collect();
                if matched.is_empty() {
                    return None;
                }

                let score = (100.0 * matched.len() as f64 / denominator).round().min(100.0);
                let reason = format!("Matches keywords: {}", matched.join(", "));
                let factor = ScoreFactor::new(
                    "keyword_overlap",
                    100.0,
                    score,
                    format!("{} of {} request keywords found", matched.len(), query.len()),
                );
                Some(ScoredCandidate::new(
                    supplier.id.clone(),
                    score,
                    reason,
                    vec![factor],
                    KEYWORD_RECOMMENDED_THRESHOLD,
                ))
            })
            .collect();

        rank_descending(&mut scored, |candidate| (candidate.score, &candidate.supplier_id));
        scored.truncate(limit);
        scored
    }
}

#[async_trait]
impl ScoringStrategy for KeywordMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BasicCategory
    }

    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        Ok(self.rank(context, limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::rfq::{Rfq, RfqId};
    use crate::domain::supplier::{Supplier, SupplierId};

    fn context(title: &str, suppliers: Vec<Supplier>) -> MatchContext {
        MatchContext {
            rfq: Rfq {
                id: RfqId::new("rfq-1"),
                title: title.to_string(),
                description: String::new(),
                category: String::new(),
                quantity: None,
                budget: None,
                deadline: None,
                location: None,
                created_at: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
            },
            suppliers,
            now: Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap(),
        }
    }

    fn supplier(id: &str, description: &str) -> Supplier {
        Supplier {
            id: SupplierId::new(id),
            company_name: "Acme".to_string(),
            description: description.to_string(),
            categories: vec![],
            location: String::new(),
            verified: false,
            metrics: None,
            attributes: None,
        }
    }

    #[test]
    fn scores_by_fraction_of_request_keywords_found() {
        let context = context(
            "steel pipes valves flanges",
            vec![supplier("s1", "We make steel pipes"), supplier("s2", "steel pipes valves flanges")],
        );

        let ranked = KeywordMatcher::new().rank(&context, 5);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].supplier_id, SupplierId::new("s2"));
        assert_eq!(ranked[0].score, 100.0);
        assert!(ranked[0].recommended);
        assert_eq!(ranked[1].score, 50.0);
        assert!(ranked[1].recommended);
    }

    #[test]
    fn suppliers_without_overlap_are_not_returned() {
        let context = context("industrial valves", vec![supplier("s1", "office furniture")]);
        assert!(KeywordMatcher::new().rank(&context, 5).is_empty());
    }

    #[test]
    fn empty_query_yields_no_candidates() {
        let context = context("a an of", vec![supplier("s1", "anything at all")]);
        assert!(KeywordMatcher::new().rank(&context, 5).is_empty());
    }

    #[test]
    fn denominator_is_capped_at_ten_keywords() {
        let title = "alpha bravo charlie delta echoes foxtrot golf1 hotel india juliet kilos limas";
        let context = context(title, vec![supplier("s1", "alpha bravo charlie delta echoes")]);

        let ranked = KeywordMatcher::new().rank(&context, 5);

        assert_eq!(ranked[0].score, 50.0);
        assert!(ranked.iter().all(|candidate| (0.0..=100.0).contains(&candidate.score)));
    }
}
