use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rfq::RfqId;
use crate::domain::supplier::{Supplier, SupplierId};

/// Score at or above which a strategy or the blend flags a supplier as recommended.
pub const RECOMMENDED_THRESHOLD: f64 = 70.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub String);

/// One named contribution to a score. Both `weight` and `score` are on a 0-100 scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub explanation: String,
}

impl ScoreFactor {
    pub fn new(name: impl Into<String>, weight: f64, score: f64, explanation: impl Into<String>) -> Self {
        Self { name: name.into(), weight, score, explanation: explanation.into() }
    }
}

/// Output of a single scoring strategy for one supplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub supplier_id: SupplierId,
    pub score: f64,
    pub reason: String,
    pub factors: Vec<ScoreFactor>,
    pub recommended: bool,
}

impl ScoredCandidate {
    /// Builds a candidate whose recommended flag is derived from `threshold`.
    pub fn new(
        supplier_id: SupplierId,
        score: f64,
        reason: impl Into<String>,
        factors: Vec<ScoreFactor>,
        threshold: f64,
    ) -> Self {
        Self { supplier_id, score, reason: reason.into(), factors, recommended: score >= threshold }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendedRecommendation {
    pub supplier_id: SupplierId,
    pub score: f64,
    pub reason: String,
    pub factors: Vec<ScoreFactor>,
    pub recommended: bool,
}

/// A blended recommendation as persisted for an RFQ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub score: f64,
    pub reason: String,
    pub factors: Vec<ScoreFactor>,
    pub recommended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub supplier: Supplier,
}

/// Sorts by score descending; ties are broken by supplier id so output is stable.
pub fn rank_descending<T>(items: &mut [T], key: impl Fn(&T) -> (f64, &SupplierId)) {
    items.sort_by(|a, b| {
        let (score_a, id_a) = key(a);
        let (score_b, id_b) = key(b);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
    });
}
