//! Supplier Matching Engine
//!
//! Scores suppliers against an RFQ with several independent strategies (keyword
//! overlap, weighted supplier features, collaborative filtering over past outcomes,
//! feedback trend forecasting and, when configured, an LLM-backed semantic matcher),
//! blends the strategy outputs into one ranked list and persists it.
//!
//! Strategies are isolated from each other: a failing or slow strategy contributes an
//! empty result and never aborts the match.

mod blend;
mod collaborative;
mod feature;
mod feedback;
mod keyword;
mod service;
pub mod store;
pub mod text;
mod trend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::recommendation::ScoredCandidate;
use crate::domain::rfq::Rfq;
use crate::domain::supplier::{Supplier, SupplierId};
use crate::errors::ApplicationError;

pub use blend::{BlendWeights, EnsembleBlender, ENSEMBLE_FACTOR, MIN_REASON_WEIGHT};
pub use collaborative::{
    request_similarity, select_neighbours, CollaborativeFilter, MAX_NEIGHBOURS,
    SIMILARITY_THRESHOLD,
};
pub use feature::{FeatureBreakdown, FeatureScorer};
pub use feedback::FeedbackRecorder;
pub use keyword::KeywordMatcher;
pub use service::{MatchOptions, MatchStage, MatchingService};
pub use store::{HistoryFilter, InMemoryMatchStore, MatchStore, RecommendationUpsert};
pub use trend::{forecast, TrendForecast, TrendForecaster, MIN_TREND_MATCHES, TREND_WINDOW_MONTHS};

/// Default number of blended recommendations returned by a match.
pub const DEFAULT_MATCH_LIMIT: usize = 5;

/// Default number of stored recommendations returned by the read path.
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

/// The scoring strategies known to the blender, in weight-table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AiSemantic,
    Collaborative,
    FeatureBased,
    TimeSeries,
    BasicCategory,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::AiSemantic,
        StrategyKind::Collaborative,
        StrategyKind::FeatureBased,
        StrategyKind::TimeSeries,
        StrategyKind::BasicCategory,
    ];

    /// Stable identifier used in factor names and logs.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::AiSemantic => "aiSemantic",
            StrategyKind::Collaborative => "collaborative",
            StrategyKind::FeatureBased => "featureBased",
            StrategyKind::TimeSeries => "timeSeries",
            StrategyKind::BasicCategory => "basicCategory",
        }
    }

    /// Human-readable label used in blended reasons.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::AiSemantic => "AI semantic analysis",
            StrategyKind::Collaborative => "similar past requests",
            StrategyKind::FeatureBased => "supplier feature scoring",
            StrategyKind::TimeSeries => "feedback trends",
            StrategyKind::BasicCategory => "keyword matching",
        }
    }

    /// Strategies that only run when the caller opts into advanced matching.
    pub fn is_advanced(&self) -> bool {
        matches!(self, StrategyKind::Collaborative | StrategyKind::TimeSeries)
    }
}

/// Everything a strategy reads for one match. Shared read-only across strategy tasks.
#[derive(Clone, Debug)]
pub struct MatchContext {
    pub rfq: Rfq,
    pub suppliers: Vec<Supplier>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Store(#[from] ApplicationError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("supplier `{supplier_id}` has malformed data: {reason}")]
    MalformedSupplier { supplier_id: SupplierId, reason: String },
    #[error("strategy timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
}

pub type StrategyResult<T> = Result<T, StrategyError>;

/// One independent scoring algorithm.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Scores the context's supplier pool, best first, at most `limit` entries.
    async fn score(&self, context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>>;
}

#[cfg(test)]
mod tests {
    use super::StrategyKind;

    #[test]
    fn only_collaborative_and_time_series_are_advanced() {
        let advanced: Vec<StrategyKind> =
            StrategyKind::ALL.into_iter().filter(StrategyKind::is_advanced).collect();
        assert_eq!(advanced, vec![StrategyKind::Collaborative, StrategyKind::TimeSeries]);
    }

    #[test]
    fn strategy_names_are_unique() {
        let mut names: Vec<&str> = StrategyKind::ALL.iter().map(StrategyKind::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StrategyKind::ALL.len());
    }
}
