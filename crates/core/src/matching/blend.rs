//! Weighted ensemble of strategy outputs
//!
//! A supplier's blended score is the weighted mean of the scores it received,
//! normalised by the weights of only those strategies that returned it. A supplier
//! missing from a strategy is not penalised for that strategy's weight.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::StrategyKind;
use crate::domain::recommendation::{
    rank_descending, BlendedRecommendation, ScoreFactor, ScoredCandidate, RECOMMENDED_THRESHOLD,
};
use crate::domain::supplier::SupplierId;

/// Name of the summary factor appended to every blended recommendation.
pub const ENSEMBLE_FACTOR: &str = "ensemble_blend";

/// Strategies weighted below this do not contribute reason text.
pub const MIN_REASON_WEIGHT: f64 = 0.20;

/// Relative weight of each strategy. Non-positive weights disable a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub ai_semantic: f64,
    pub collaborative: f64,
    pub feature_based: f64,
    pub time_series: f64,
    pub basic_category: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            ai_semantic: 0.40,
            collaborative: 0.25,
            feature_based: 0.20,
            time_series: 0.10,
            basic_category: 0.05,
        }
    }
}

impl BlendWeights {
    pub fn weight(&self, kind: StrategyKind) -> f64 {
        match kind {
            StrategyKind::AiSemantic => self.ai_semantic,
            StrategyKind::Collaborative => self.collaborative,
            StrategyKind::FeatureBased => self.feature_based,
            StrategyKind::TimeSeries => self.time_series,
            StrategyKind::BasicCategory => self.basic_category,
        }
    }

    pub fn total(&self) -> f64 {
        StrategyKind::ALL.iter().map(|kind| self.weight(*kind)).sum()
    }
}

struct Contribution<'a> {
    kind: StrategyKind,
    weight: f64,
    candidate: &'a ScoredCandidate,
}

#[derive(Debug, Clone, Default)]
pub struct EnsembleBlender {
    weights: BlendWeights,
}

impl EnsembleBlender {
    pub fn new(weights: BlendWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &BlendWeights {
        &self.weights
    }

    /// Blends per-strategy results into one ranked list of at most `limit` entries.
    pub fn blend(
        &self,
        results: &HashMap<StrategyKind, Vec<ScoredCandidate>>,
        limit: usize,
    ) -> Vec<BlendedRecommendation> {
        let mut by_supplier: BTreeMap<&SupplierId, Vec<Contribution<'_>>> = BTreeMap::new();
        for kind in StrategyKind::ALL {
            let weight = self.weights.weight(kind);
            if weight <= 0.0 {
                continue;
            }
            let Some(candidates) = results.get(&kind) else {
                continue;
            };
            for candidate in candidates {
                by_supplier
                    .entry(&candidate.supplier_id)
                    .or_default()
                    .push(Contribution { kind, weight, candidate });
            }
        }

        let mut blended: Vec<BlendedRecommendation> = by_supplier
            .into_iter()
            .map(|(supplier_id, contributions)| blend_supplier(supplier_id, &contributions))
            .collect();

        rank_descending(&mut blended, |item| (item.score, &item.supplier_id));
        blended.truncate(limit);
        blended
    }
}

fn blend_supplier(supplier_id: &SupplierId, contributions: &[Contribution<'_>]) -> BlendedRecommendation {
    let weight_sum: f64 = contributions.iter().map(|part| part.weight).sum();
    let weighted: f64 = contributions.iter().map(|part| part.candidate.score * part.weight).sum();
    let score = if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 };

    let mut factors: Vec<ScoreFactor> = contributions
        .iter()
        .map(|part| {
            ScoreFactor::new(
                part.kind.name(),
                part.weight * 100.0,
                part.candidate.score,
                part.candidate.reason.clone(),
            )
        })
        .collect();
    factors.push(ScoreFactor::new(
        ENSEMBLE_FACTOR,
        100.0,
        score,
        format!("Weighted blend of {} strategies", contributions.len()),
    ));

    let reasons: Vec<&str> = contributions
        .iter()
        .filter(|part| part.weight >= MIN_REASON_WEIGHT)
        .map(|part| part.candidate.reason.as_str())
        .filter(|reason| !reason.is_empty())
        .collect();
    let reason = if reasons.is_empty() {
        let labels: Vec<&str> = contributions.iter().map(|part| part.kind.label()).collect();
        format!("Recommended by {}", labels.join(", "))
    } else {
        reasons.join("; ")
    };

    BlendedRecommendation {
        supplier_id: supplier_id.clone(),
        score,
        reason,
        factors,
        recommended: score >= RECOMMENDED_THRESHOLD,
    }
}
