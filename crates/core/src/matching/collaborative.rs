//! Collaborative filtering over past outcomes
//!
//! Finds earlier RFQs that resemble the current one and had at least one successful
//! match, then favours the suppliers that won those requests, weighted by request
//! similarity and the buyer's rating.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::store::{HistoryFilter, MatchStore};
use super::text::{keyword_set, keywords};
use super::{MatchContext, ScoringStrategy, StrategyKind, StrategyResult};
use crate::domain::history::HistoricalMatch;
use crate::domain::recommendation::{
    rank_descending, ScoreFactor, ScoredCandidate, RECOMMENDED_THRESHOLD,
};
use crate::domain::rfq::{Rfq, RfqId};
use crate::domain::supplier::SupplierId;

/// Neighbours must be strictly more similar than this.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

pub const MAX_NEIGHBOURS: usize = 10;

const SAME_CATEGORY_BONUS: f64 = 0.3;

/// Used when the buyer left no rating.
const DEFAULT_FEEDBACK_WEIGHT: f64 = 0.6;

/// Similarity of `other` to `current`, 0.0-1.0.
///
/// Fraction of the current request's title and description keywords found in the
/// other request, plus a bonus when both share a category.
pub fn request_similarity(current: &Rfq, other: &Rfq) -> f64 {
    let query = keywords(&format!("{} {}", current.title, current.description));
    let overlap = if query.is_empty() {
        0.0
    } else {
        let theirs = keyword_set(&format!("{} {}", other.title, other.description));
        let matching = query.iter().filter(|word| theirs.contains(*word)).count();
        matching as f64 / query.len() as f64
    };

    let bonus = if current.same_category(&other.category) { SAME_CATEGORY_BONUS } else { 0.0 };
    (overlap + bonus).min(1.0)
}

/// Keeps candidates above the threshold, most similar first, at most `MAX_NEIGHBOURS`.
pub fn select_neighbours(mut candidates: Vec<(RfqId, f64)>) -> Vec<(RfqId, f64)> {
    candidates.retain(|(_, similarity)| *similarity > SIMILARITY_THRESHOLD);
    candidates.sort_by(|(id_a, a), (id_b, b)| {
        b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
    });
    candidates.truncate(MAX_NEIGHBOURS);
    candidates
}

#[derive(Default)]
struct SupplierEvidence {
    accumulated: f64,
    similarity_sum: f64,
    feedback_sum: f64,
    matches: usize,
}

pub struct CollaborativeFilter {
    store: Arc<dyn MatchStore>,
}

impl CollaborativeFilter {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScoringStrategy for CollaborativeFilter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Collaborative
    }

    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        let history = self.store.list_historical_matches(&HistoryFilter::successful()).await?;

        let mut by_rfq: BTreeMap<RfqId, Vec<HistoricalMatch>> = BTreeMap::new();
        for record in history.into_iter().filter(|record| record.rfq_id != context.rfq.id) {
            by_rfq.entry(record.rfq_id.clone()).or_default().push(record);
        }
        if by_rfq.is_empty() {
            return Ok(Vec::new());
        }

        let rfq_ids: Vec<RfqId> = by_rfq.keys().cloned().collect();
        let past_rfqs = self.store.find_rfqs(&rfq_ids).await?;
        let neighbours = select_neighbours(
            past_rfqs
                .iter()
                .map(|past| (past.id.clone(), request_similarity(&context.rfq, past)))
                .collect(),
        );

        let pool: HashSet<&SupplierId> = context.suppliers.iter().map(|supplier| &supplier.id).collect();
        let mut evidence: BTreeMap<SupplierId, SupplierEvidence> = BTreeMap::new();
        for (rfq_id, similarity) in &neighbours {
            let Some(records) = by_rfq.get(rfq_id) else {
                continue;
            };
            for record in records.iter().filter(|record| pool.contains(&record.supplier_id)) {
                let feedback_weight = record
                    .buyer_feedback
                    .map(|rating| f64::from(rating) / 5.0)
                    .unwrap_or(DEFAULT_FEEDBACK_WEIGHT);
                let entry = evidence.entry(record.supplier_id.clone()).or_default();
                entry.accumulated += similarity * feedback_weight;
                entry.similarity_sum += similarity;
                entry.feedback_sum += feedback_weight;
                entry.matches += 1;
            }
        }

        let mut scored: Vec<ScoredCandidate> = evidence
            .into_iter()
            .map(|(supplier_id, evidence)| {
                let count = evidence.matches as f64;
                let score = (evidence.accumulated / count * 100.0).min(100.0);
                let factors = vec![
                    ScoreFactor::new(
                        "neighbour_similarity",
                        50.0,
                        evidence.similarity_sum / count * 100.0,
                        "Average similarity of past requests this supplier won",
                    ),
                    ScoreFactor::new(
                        "buyer_feedback",
                        50.0,
                        evidence.feedback_sum / count * 100.0,
                        "Average buyer rating on those requests",
                    ),
                ];
                let reason = format!(
                    "Successfully served {} similar past request{}",
                    evidence.matches,
                    if evidence.matches == 1 { "" } else { "s" }
                );
                ScoredCandidate::new(supplier_id, score, reason, factors, RECOMMENDED_THRESHOLD)
            })
            .collect();

        rank_descending(&mut scored, |candidate| (candidate.score, &candidate.supplier_id));
        scored.truncate(limit);
        Ok(scored)
    }
}
