//! Feature-weighted scoring
//!
//! Combines five sub-scores (0-100 each) into a weighted total:
//! - Category fit (40%)
//! - Operational performance (20%)
//! - Similar experience (20%)
//! - Location proximity (10%)
//! - Verification (10%)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::store::{HistoryFilter, MatchStore};
use super::text::{location_tokens, word_overlap_fraction};
use super::{MatchContext, ScoringStrategy, StrategyError, StrategyKind, StrategyResult};
use crate::domain::recommendation::{
    rank_descending, ScoreFactor, ScoredCandidate, RECOMMENDED_THRESHOLD,
};
use crate::domain::rfq::Rfq;
use crate::domain::supplier::{Supplier, SupplierId, SupplierMetrics};

pub const CATEGORY_WEIGHT: f64 = 40.0;
pub const PERFORMANCE_WEIGHT: f64 = 20.0;
pub const EXPERIENCE_WEIGHT: f64 = 20.0;
pub const LOCATION_WEIGHT: f64 = 10.0;
pub const VERIFICATION_WEIGHT: f64 = 10.0;

/// Partial matches never score as high as an exact one.
const PARTIAL_MATCH_CEILING: f64 = 80.0;

/// Points per successful match or similar request, capped at 100.
const EXPERIENCE_POINTS_PER_MATCH: f64 = 10.0;

/// Sub-scores for one supplier, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBreakdown {
    pub category: f64,
    pub performance: f64,
    pub experience: f64,
    pub location: f64,
    pub verification: f64,
}

impl FeatureBreakdown {
    pub fn total(&self) -> f64 {
        (self.category * CATEGORY_WEIGHT
            + self.performance * PERFORMANCE_WEIGHT
            + self.experience * EXPERIENCE_WEIGHT
            + self.location * LOCATION_WEIGHT
            + self.verification * VERIFICATION_WEIGHT)
            / 100.0
    }

    fn factors(&self) -> Vec<ScoreFactor> {
        vec![
            ScoreFactor::new(
                "category_match",
                CATEGORY_WEIGHT,
                self.category,
                "Overlap between the request category and supplier categories",
            ),
            ScoreFactor::new(
                "performance",
                PERFORMANCE_WEIGHT,
                self.performance,
                "Response time, acceptance, on-time delivery and quality",
            ),
            ScoreFactor::new(
                "similar_experience",
                EXPERIENCE_WEIGHT,
                self.experience,
                "Successful matches and prior requests in this category",
            ),
            ScoreFactor::new(
                "location",
                LOCATION_WEIGHT,
                self.location,
                "Proximity of supplier to the delivery location",
            ),
            ScoreFactor::new(
                "verification",
                VERIFICATION_WEIGHT,
                self.verification,
                "Marketplace verification status",
            ),
        ]
    }

    fn reasoning(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if self.category >= 100.0 {
            reasons.push("Serves this category".to_string());
        } else if self.category > 0.0 {
            reasons.push("Serves a related category".to_string());
        }
        if self.performance >= 80.0 {
            reasons.push("Strong delivery track record".to_string());
        }
        if self.experience >= 50.0 {
            reasons.push("Experienced with similar requests".to_string());
        }
        if self.location >= 100.0 {
            reasons.push("Located at the delivery site".to_string());
        } else if self.location > 0.0 {
            reasons.push("Located nearby".to_string());
        }
        if self.verification > 0.0 {
            reasons.push("Verified supplier".to_string());
        }

        reasons
    }
}

pub struct FeatureScorer {
    store: Arc<dyn MatchStore>,
}

impl FeatureScorer {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Sub-scores for one supplier given how many successful matches it has in the
    /// request's category.
    pub fn breakdown(
        rfq: &Rfq,
        supplier: &Supplier,
        successful_in_category: usize,
    ) -> StrategyResult<FeatureBreakdown> {
        if let Some(metrics) = &supplier.metrics {
            if !metrics.is_well_formed() {
                return Err(StrategyError::MalformedSupplier {
                    supplier_id: supplier.id.clone(),
                    reason: "metrics contain negative or non-finite values".to_string(),
                });
            }
        }

        Ok(FeatureBreakdown {
            category: category_score(rfq, supplier),
            performance: supplier.metrics.as_ref().map(performance_score).unwrap_or(0.0),
            experience: experience_score(supplier, successful_in_category),
            location: rfq
                .location
                .as_deref()
                .map(|location| location_score(location, &supplier.location))
                .unwrap_or(0.0),
            verification: if supplier.verified { 100.0 } else { 0.0 },
        })
    }

    async fn successful_matches_by_supplier(
        &self,
        rfq: &Rfq,
    ) -> StrategyResult<HashMap<SupplierId, usize>> {
        let history = self
            .store
            .list_historical_matches(&HistoryFilter::successful().in_category(rfq.category.clone()))
            .await?;

        let mut counts = HashMap::new();
        for record in history {
            *counts.entry(record.supplier_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl ScoringStrategy for FeatureScorer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FeatureBased
    }

    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        let counts = self.successful_matches_by_supplier(&context.rfq).await?;

        let mut scored = Vec::with_capacity(context.suppliers.len());
        for supplier in &context.suppliers {
            let successful = counts.get(&supplier.id).copied().unwrap_or(0);
            let breakdown = Self::breakdown(&context.rfq, supplier, successful)?;
            let reasons = breakdown.reasoning();
            let reason = if reasons.is_empty() {
                "Limited fit on scored features".to_string()
            } else {
                reasons.join(", ")
            };

            scored.push(ScoredCandidate::new(
                supplier.id.clone(),
                breakdown.total(),
                reason,
                breakdown.factors(),
                RECOMMENDED_THRESHOLD,
            ));
        }

        rank_descending(&mut scored, |candidate| (candidate.score, &candidate.supplier_id));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn category_score(rfq: &Rfq, supplier: &Supplier) -> f64 {
    if supplier.category_labels().any(|label| rfq.same_category(label)) {
        return 100.0;
    }

    supplier
        .category_labels()
        .map(|label| word_overlap_fraction(&rfq.category, label) * PARTIAL_MATCH_CEILING)
        .fold(0.0, f64::max)
}

fn response_time_score(hours: f64) -> f64 {
    match hours {
        h if h < 24.0 => 100.0,
        h if h < 48.0 => 80.0,
        h if h < 72.0 => 60.0,
        h if h < 96.0 => 40.0,
        _ => 20.0,
    }
}

fn performance_score(metrics: &SupplierMetrics) -> f64 {
    let components: Vec<f64> = [
        metrics.response_time_hours.map(response_time_score),
        metrics.acceptance_rate,
        metrics.on_time_delivery,
        metrics.quality_rating.map(|rating| rating / 5.0 * 100.0),
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        return 0.0;
    }
    components.iter().sum::<f64>() / components.len() as f64
}

fn experience_score(supplier: &Supplier, successful_in_category: usize) -> f64 {
    let from_history = (successful_in_category as f64 * EXPERIENCE_POINTS_PER_MATCH).min(100.0);
    let from_metrics = supplier
        .metrics
        .as_ref()
        .map(|metrics| (metrics.similar_request_count as f64 * EXPERIENCE_POINTS_PER_MATCH).min(100.0))
        .unwrap_or(0.0);
    from_history.max(from_metrics)
}

fn location_score(rfq_location: &str, supplier_location: &str) -> f64 {
    if rfq_location.trim().is_empty() || supplier_location.trim().is_empty() {
        return 0.0;
    }
    if rfq_location.trim().eq_ignore_ascii_case(supplier_location.trim()) {
        return 100.0;
    }

    let ours = location_tokens(rfq_location);
    let theirs = location_tokens(supplier_location);
    let smaller = ours.len().min(theirs.len());
    if smaller == 0 {
        return 0.0;
    }
    let common = ours.intersection(&theirs).count();
    common as f64 / smaller as f64 * PARTIAL_MATCH_CEILING
}
