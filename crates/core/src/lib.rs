pub mod config;
pub mod domain;
pub mod errors;
pub mod matching;

pub use config::{AppConfig, LoadOptions, MatchingConfig, PersistenceFailurePolicy};
pub use domain::history::{HistoricalMatch, HistoricalMatchId, MatchFeedback};
pub use domain::recommendation::{
    BlendedRecommendation, EnrichedRecommendation, Recommendation, RecommendationId, ScoreFactor,
    ScoredCandidate, RECOMMENDED_THRESHOLD,
};
pub use domain::rfq::{Rfq, RfqId};
pub use domain::supplier::{Supplier, SupplierAttributes, SupplierId, SupplierMetrics};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use matching::{
    MatchContext, MatchOptions, MatchStore, MatchingService, ScoringStrategy, StrategyError,
    StrategyKind, StrategyResult,
};
