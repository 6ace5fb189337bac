use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::blend::EnsembleBlender;
use super::collaborative::CollaborativeFilter;
use super::feature::FeatureScorer;
use super::feedback::FeedbackRecorder;
use super::keyword::KeywordMatcher;
use super::store::{MatchStore, RecommendationUpsert};
use super::trend::TrendForecaster;
use super::{MatchContext, ScoringStrategy, StrategyError, StrategyKind, DEFAULT_MATCH_LIMIT};
use crate::config::{MatchingConfig, PersistenceFailurePolicy};
use crate::domain::history::{HistoricalMatch, MatchFeedback};
use crate::domain::recommendation::{
    BlendedRecommendation, EnrichedRecommendation, Recommendation, ScoredCandidate,
};
use crate::domain::rfq::RfqId;
use crate::domain::supplier::{Supplier, SupplierId};
use crate::errors::{ApplicationError, DomainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub limit: usize,
    /// Also run the history-driven strategies (collaborative and trend).
    pub use_advanced: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { limit: DEFAULT_MATCH_LIMIT, use_advanced: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Fetching,
    RunningStrategies,
    Blending,
    Persisting,
    Done,
    Failed,
}

impl MatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStage::Fetching => "fetching",
            MatchStage::RunningStrategies => "running_strategies",
            MatchStage::Blending => "blending",
            MatchStage::Persisting => "persisting",
            MatchStage::Done => "done",
            MatchStage::Failed => "failed",
        }
    }
}

/// Entry point of the engine: matches suppliers to RFQs, serves stored
/// recommendations and records outcomes.
pub struct MatchingService {
    store: Arc<dyn MatchStore>,
    strategies: Vec<Arc<dyn ScoringStrategy>>,
    blender: EnsembleBlender,
    feedback: FeedbackRecorder,
    strategy_timeout: Duration,
    persistence_failure: PersistenceFailurePolicy,
}

impl MatchingService {
    /// A service with no strategies registered.
    pub fn new(store: Arc<dyn MatchStore>, config: &MatchingConfig) -> Self {
        Self {
            feedback: FeedbackRecorder::new(store.clone()),
            store,
            strategies: Vec::new(),
            blender: EnsembleBlender::new(config.weights),
            strategy_timeout: config.strategy_timeout(),
            persistence_failure: config.persistence_failure,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Registers the strategies that need nothing beyond the store.
    pub fn with_default_strategies(self) -> Self {
        let store = self.store.clone();
        self.with_strategy(Arc::new(KeywordMatcher::new()))
            .with_strategy(Arc::new(FeatureScorer::new(store.clone())))
            .with_strategy(Arc::new(CollaborativeFilter::new(store.clone())))
            .with_strategy(Arc::new(TrendForecaster::new(store)))
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|strategy| strategy.kind()).collect()
    }

    pub async fn find_matching_suppliers(
        &self,
        rfq_id: &RfqId,
        options: MatchOptions,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        self.find_matching_suppliers_at(rfq_id, options, Utc::now()).await
    }

    /// Same as `find_matching_suppliers` with an explicit clock.
    pub async fn find_matching_suppliers_at(
        &self,
        rfq_id: &RfqId,
        options: MatchOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        info!(
            event_name = "matching.run.started",
            rfq_id = %rfq_id,
            stage = MatchStage::Fetching.as_str(),
            limit = options.limit,
            use_advanced = options.use_advanced,
            "supplier matching started"
        );

        let context = match self.fetch_context(rfq_id, now).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                info!(
                    event_name = "matching.run.empty_pool",
                    rfq_id = %rfq_id,
                    stage = MatchStage::Done.as_str(),
                    "no suppliers available to match"
                );
                return Ok(Vec::new());
            }
            Err(error) => {
                warn!(
                    event_name = "matching.run.failed",
                    rfq_id = %rfq_id,
                    stage = MatchStage::Failed.as_str(),
                    error = %error,
                    "supplier matching failed while fetching inputs"
                );
                return Err(error);
            }
        };

        let results = self.run_strategies(Arc::new(context), options).await;
        let blended = self.blender.blend(&results, options.limit);
        info!(
            event_name = "matching.run.blended",
            rfq_id = %rfq_id,
            stage = MatchStage::Blending.as_str(),
            candidates = blended.len(),
            "strategy results blended"
        );

        let recommendations = self.persist(rfq_id, blended, now).await;
        info!(
            event_name = "matching.run.completed",
            rfq_id = %rfq_id,
            stage = MatchStage::Done.as_str(),
            recommendations = recommendations.len(),
            "supplier matching completed"
        );
        Ok(recommendations)
    }

    /// Stored recommendations for an RFQ joined with current supplier details.
    pub async fn get_recommendations_with_suppliers(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<EnrichedRecommendation>, ApplicationError> {
        let recommendations = self.store.list_recommendations(rfq_id, limit).await?;
        if recommendations.is_empty() {
            return Ok(Vec::new());
        }

        let supplier_ids: Vec<SupplierId> =
            recommendations.iter().map(|row| row.supplier_id.clone()).collect();
        let suppliers: HashMap<SupplierId, Supplier> = self
            .store
            .find_suppliers(&supplier_ids)
            .await?
            .into_iter()
            .map(|supplier| (supplier.id.clone(), supplier))
            .collect();

        Ok(recommendations
            .into_iter()
            .filter_map(|recommendation| {
                let supplier = suppliers.get(&recommendation.supplier_id)?.clone();
                Some(EnrichedRecommendation { recommendation, supplier })
            })
            .collect())
    }

    pub async fn record_match_feedback(
        &self,
        feedback: MatchFeedback,
    ) -> Result<HistoricalMatch, ApplicationError> {
        self.feedback.record(feedback).await
    }

    async fn fetch_context(
        &self,
        rfq_id: &RfqId,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchContext>, ApplicationError> {
        let rfq = self
            .store
            .find_rfq(rfq_id)
            .await?
            .ok_or_else(|| DomainError::RequestNotFound { rfq_id: rfq_id.to_string() })?;

        let suppliers = self.store.list_suppliers().await?;
        if suppliers.is_empty() {
            return Ok(None);
        }

        Ok(Some(MatchContext { rfq, suppliers, now }))
    }

    async fn run_strategies(
        &self,
        context: Arc<MatchContext>,
        options: MatchOptions,
    ) -> HashMap<StrategyKind, Vec<ScoredCandidate>> {
        let per_strategy_limit = options.limit.saturating_mul(2);
        let timeout = self.strategy_timeout;

        let handles: Vec<_> = self
            .strategies
            .iter()
            .filter(|strategy| options.use_advanced || !strategy.kind().is_advanced())
            .map(|strategy| {
                let strategy = strategy.clone();
                let context = context.clone();
                let kind = strategy.kind();
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, strategy.score(&context, per_strategy_limit))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(StrategyError::Timeout { after_secs: timeout.as_secs() }),
                    }
                });
                (kind, handle)
            })
            .collect();

        let mut results = HashMap::with_capacity(handles.len());
        for (kind, handle) in handles {
            let candidates = match handle.await {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(error)) => {
                    warn!(
                        event_name = "matching.strategy.failed",
                        rfq_id = %context.rfq.id,
                        strategy = kind.name(),
                        stage = MatchStage::RunningStrategies.as_str(),
                        error = %error,
                        "strategy failed; continuing without it"
                    );
                    Vec::new()
                }
                Err(join_error) => {
                    warn!(
                        event_name = "matching.strategy.failed",
                        rfq_id = %context.rfq.id,
                        strategy = kind.name(),
                        stage = MatchStage::RunningStrategies.as_str(),
                        error = %join_error,
                        "strategy task aborted; continuing without it"
                    );
                    Vec::new()
                }
            };
            results.insert(kind, candidates);
        }

        results
    }

    async fn persist(
        &self,
        rfq_id: &RfqId,
        blended: Vec<BlendedRecommendation>,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let upserts: Vec<RecommendationUpsert> = blended
            .into_iter()
            .map(|item| RecommendationUpsert {
                rfq_id: rfq_id.clone(),
                supplier_id: item.supplier_id,
                score: item.score,
                reason: item.reason,
                factors: item.factors,
                recommended: item.recommended,
                written_at: now,
            })
            .collect();

        let mut persisted = Vec::with_capacity(upserts.len());
        let mut failure = None;
        for upsert in &upserts {
            match self.store.upsert_recommendation(upsert.clone()).await {
                Ok(row) => persisted.push(row),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        match failure {
            Some(error) => self.on_persistence_failure(rfq_id, upserts, error),
            None => persisted,
        }
    }

    fn on_persistence_failure(
        &self,
        rfq_id: &RfqId,
        upserts: Vec<RecommendationUpsert>,
        error: ApplicationError,
    ) -> Vec<Recommendation> {
        match self.persistence_failure {
            PersistenceFailurePolicy::Discard => {
                error!(
                    event_name = "matching.persist.failed",
                    rfq_id = %rfq_id,
                    stage = MatchStage::Persisting.as_str(),
                    policy = "discard",
                    error = %error,
                    "failed to save recommendations; discarding results"
                );
                Vec::new()
            }
            PersistenceFailurePolicy::ReturnUnpersisted => {
                warn!(
                    event_name = "matching.persist.failed",
                    rfq_id = %rfq_id,
                    stage = MatchStage::Persisting.as_str(),
                    policy = "return_unpersisted",
                    error = %error,
                    "failed to save recommendations; returning unsaved results"
                );
                upserts.into_iter().map(RecommendationUpsert::into_new_recommendation).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::recommendation::{ScoreFactor, RECOMMENDED_THRESHOLD};
    use crate::domain::rfq::Rfq;
    use crate::matching::store::{HistoryFilter, InMemoryMatchStore};
    use crate::matching::StrategyResult;

    struct Scripted {
        kind: StrategyKind,
        scores: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl ScoringStrategy for Scripted {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        async fn score(&self, _context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
            Ok(self
                .scores
                .iter()
                .take(limit)
                .map(|(id, score)| {
                    ScoredCandidate::new(
                        SupplierId::new(*id),
                        *score,
                        format!("{} likes {id}", self.kind.name()),
                        vec![ScoreFactor::new("scripted", 100.0, *score, "scripted")],
                        RECOMMENDED_THRESHOLD,
                    )
                })
                .collect())
        }
    }

    struct Failing(StrategyKind);

    #[async_trait]
    impl ScoringStrategy for Failing {
        fn kind(&self) -> StrategyKind {
            self.0
        }

        async fn score(&self, _context: &MatchContext, _limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
            Err(StrategyError::Integration("upstream unavailable".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ScoringStrategy for Panicking {
        fn kind(&self) -> StrategyKind {
            StrategyKind::TimeSeries
        }

        async fn score(&self, _context: &MatchContext, _limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
            panic!("scripted panic")
        }
    }

    struct Slow;

    #[async_trait]
    impl ScoringStrategy for Slow {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Collaborative
        }

        async fn score(&self, _context: &MatchContext, _limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct Recording {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ScoringStrategy for Recording {
        fn kind(&self) -> StrategyKind {
            StrategyKind::FeatureBased
        }

        async fn score(&self, _context: &MatchContext, limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
            self.seen.store(limit, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    /// Store whose recommendation writes always fail.
    struct ReadOnlyStore(InMemoryMatchStore);

    #[async_trait]
    impl MatchStore for ReadOnlyStore {
        async fn find_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, ApplicationError> {
            self.0.find_rfq(id).await
        }

        async fn find_rfqs(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, ApplicationError> {
            self.0.find_rfqs(ids).await
        }

        async fn list_suppliers(&self) -> Result<Vec<Supplier>, ApplicationError> {
            self.0.list_suppliers().await
        }

        async fn find_suppliers(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, ApplicationError> {
            self.0.find_suppliers(ids).await
        }

        async fn list_historical_matches(
            &self,
            filter: &HistoryFilter,
        ) -> Result<Vec<HistoricalMatch>, ApplicationError> {
            self.0.list_historical_matches(filter).await
        }

        async fn upsert_recommendation(
            &self,
            _upsert: RecommendationUpsert,
        ) -> Result<Recommendation, ApplicationError> {
            Err(ApplicationError::Persistence("database is read-only".to_string()))
        }

        async fn list_recommendations(
            &self,
            rfq_id: &RfqId,
            limit: usize,
        ) -> Result<Vec<Recommendation>, ApplicationError> {
            self.0.list_recommendations(rfq_id, limit).await
        }

        async fn upsert_historical_match(
            &self,
            feedback: &MatchFeedback,
            recorded_at: DateTime<Utc>,
        ) -> Result<HistoricalMatch, ApplicationError> {
            self.0.upsert_historical_match(feedback, recorded_at).await
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap()
    }

    fn seeded_store() -> InMemoryMatchStore {
        let store = InMemoryMatchStore::new();
        store.insert_rfq(Rfq {
            id: RfqId::new("rfq-1"),
            title: "Industrial sensors".to_string(),
            description: "Temperature sensors for cold storage".to_string(),
            category: "Electronics".to_string(),
            quantity: Some(200),
            budget: None,
            deadline: None,
            location: Some("Pune".to_string()),
            created_at: now(),
        });
        for id in ["s1", "s2", "s3"] {
            store.insert_supplier(Supplier {
                id: SupplierId::new(id),
                company_name: format!("Supplier {id}"),
                description: String::new(),
                categories: vec!["Electronics".to_string()],
                location: "Pune".to_string(),
                verified: true,
                metrics: None,
                attributes: None,
            });
        }
        store
    }

    fn scripted(kind: StrategyKind, scores: &[(&'static str, f64)]) -> Arc<dyn ScoringStrategy> {
        Arc::new(Scripted { kind, scores: scores.to_vec() })
    }

    #[tokio::test]
    async fn unknown_rfq_is_reported_as_not_found() {
        let service = MatchingService::new(Arc::new(seeded_store()), &MatchingConfig::default())
            .with_default_strategies();

        let error = service
            .find_matching_suppliers(&RfqId::new("missing"), MatchOptions::default())
            .await
            .expect_err("missing rfq");

        assert!(matches!(error, ApplicationError::Domain(DomainError::RequestNotFound { .. })));
    }

    #[tokio::test]
    async fn failing_and_panicking_strategies_are_isolated() {
        let store = Arc::new(seeded_store());
        let service = MatchingService::new(store.clone(), &MatchingConfig::default())
            .with_strategy(Arc::new(Failing(StrategyKind::AiSemantic)))
            .with_strategy(Arc::new(Panicking))
            .with_strategy(scripted(StrategyKind::FeatureBased, &[("s1", 80.0), ("s2", 60.0)]));

        let recommendations = service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("match");

        let ids: Vec<&str> = recommendations.iter().map(|row| row.supplier_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!((recommendations[0].score - 80.0).abs() < 1e-9);
        assert_eq!(store.recommendations().len(), 2);
    }

    #[tokio::test]
    async fn slow_strategy_times_out_without_blocking_the_match() {
        let config = MatchingConfig { strategy_timeout_secs: 1, ..MatchingConfig::default() };
        let service = MatchingService::new(Arc::new(seeded_store()), &config)
            .with_strategy(Arc::new(Slow))
            .with_strategy(scripted(StrategyKind::BasicCategory, &[("s3", 40.0)]));

        let recommendations = service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("match");

        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].supplier_id.as_str(), "s3");
    }

    #[tokio::test]
    async fn basic_mode_skips_advanced_strategies() {
        let service = MatchingService::new(Arc::new(seeded_store()), &MatchingConfig::default())
            .with_strategy(scripted(StrategyKind::Collaborative, &[("s1", 100.0)]))
            .with_strategy(scripted(StrategyKind::BasicCategory, &[("s2", 30.0)]));

        let recommendations = service
            .find_matching_suppliers_at(
                &RfqId::new("rfq-1"),
                MatchOptions { limit: 5, use_advanced: false },
                now(),
            )
            .await
            .expect("match");

        let ids: Vec<&str> = recommendations.iter().map(|row| row.supplier_id.as_str()).collect();
        assert_eq!(ids, vec!["s2"]);
    }

    #[tokio::test]
    async fn strategies_are_asked_for_twice_the_limit() {
        let seen = Arc::new(AtomicUsize::new(0));
        let service = MatchingService::new(Arc::new(seeded_store()), &MatchingConfig::default())
            .with_strategy(Arc::new(Recording { seen: seen.clone() }));

        service
            .find_matching_suppliers_at(
                &RfqId::new("rfq-1"),
                MatchOptions { limit: 3, use_advanced: true },
                now(),
            )
            .await
            .expect("match");

        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn supplier_missing_from_heavier_strategy_is_not_penalised() {
        let service = MatchingService::new(Arc::new(seeded_store()), &MatchingConfig::default())
            .with_strategy(scripted(StrategyKind::FeatureBased, &[("s1", 90.0), ("s2", 80.0)]))
            .with_strategy(scripted(StrategyKind::BasicCategory, &[("s3", 100.0)]));

        let recommendations = service
            .find_matching_suppliers_at(
                &RfqId::new("rfq-1"),
                MatchOptions { limit: 2, use_advanced: true },
                now(),
            )
            .await
            .expect("match");

        let ids: Vec<&str> = recommendations.iter().map(|row| row.supplier_id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s1"]);
        assert!((recommendations[0].score - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn persistence_failure_discards_results_by_default() {
        let service =
            MatchingService::new(Arc::new(ReadOnlyStore(seeded_store())), &MatchingConfig::default())
                .with_strategy(scripted(StrategyKind::FeatureBased, &[("s1", 80.0)]));

        let recommendations = service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("match");

        assert!(recommendations.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_can_return_unsaved_results() {
        let config = MatchingConfig {
            persistence_failure: PersistenceFailurePolicy::ReturnUnpersisted,
            ..MatchingConfig::default()
        };
        let service = MatchingService::new(Arc::new(ReadOnlyStore(seeded_store())), &config)
            .with_strategy(scripted(StrategyKind::FeatureBased, &[("s1", 80.0)]));

        let recommendations = service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("match");

        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].rfq_id, RfqId::new("rfq-1"));
        assert!(recommendations[0].recommended);
    }

    #[tokio::test]
    async fn repeated_matches_update_rows_in_place() {
        let store = Arc::new(seeded_store());
        let service = MatchingService::new(store.clone(), &MatchingConfig::default())
            .with_strategy(scripted(StrategyKind::FeatureBased, &[("s1", 80.0), ("s2", 50.0)]));

        let first = service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("first");
        let second = service
            .find_matching_suppliers_at(
                &RfqId::new("rfq-1"),
                MatchOptions::default(),
                now() + chrono::Duration::hours(1),
            )
            .await
            .expect("second");

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].created_at, now());
        assert_eq!(second[0].updated_at, now() + chrono::Duration::hours(1));
        assert_eq!(store.recommendations().len(), 2);
    }

    #[tokio::test]
    async fn recommendations_are_joined_with_current_suppliers() {
        let store = Arc::new(seeded_store());
        let service = MatchingService::new(store.clone(), &MatchingConfig::default())
            .with_strategy(scripted(
                StrategyKind::FeatureBased,
                &[("s1", 80.0), ("s2", 60.0), ("ghost", 99.0)],
            ));
        service
            .find_matching_suppliers_at(&RfqId::new("rfq-1"), MatchOptions::default(), now())
            .await
            .expect("match");

        let enriched = service
            .get_recommendations_with_suppliers(&RfqId::new("rfq-1"), 10)
            .await
            .expect("read");

        let ids: Vec<&str> =
            enriched.iter().map(|row| row.recommendation.supplier_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(enriched[0].supplier.company_name, "Supplier s1");

        let none = service
            .get_recommendations_with_suppliers(&RfqId::new("rfq-unknown"), 10)
            .await
            .expect("read");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn default_strategies_cover_the_store_backed_kinds() {
        let service = MatchingService::new(Arc::new(seeded_store()), &MatchingConfig::default())
            .with_default_strategies();

        assert_eq!(
            service.strategy_kinds(),
            vec![
                StrategyKind::BasicCategory,
                StrategyKind::FeatureBased,
                StrategyKind::Collaborative,
                StrategyKind::TimeSeries,
            ]
        );
    }
}
