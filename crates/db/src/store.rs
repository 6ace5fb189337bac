//! `MatchStore` backed by the SQLite repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;

use procura_core::domain::history::{HistoricalMatch, MatchFeedback};
use procura_core::domain::recommendation::Recommendation;
use procura_core::domain::rfq::{Rfq, RfqId};
use procura_core::domain::supplier::{Supplier, SupplierId};
use procura_core::errors::ApplicationError;
use procura_core::matching::{HistoryFilter, MatchStore, RecommendationUpsert};

use crate::repositories::{
    HistoricalMatchRepository, RecommendationRepository, RepositoryError, RfqRepository,
    SqlHistoricalMatchRepository, SqlRecommendationRepository, SqlRfqRepository,
    SqlSupplierRepository, SupplierRepository,
};
use crate::DbPool;

pub struct SqlMatchStore {
    rfqs: SqlRfqRepository,
    suppliers: SqlSupplierRepository,
    recommendations: SqlRecommendationRepository,
    history: SqlHistoricalMatchRepository,
}

impl SqlMatchStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            rfqs: SqlRfqRepository::new(pool.clone()),
            suppliers: SqlSupplierRepository::new(pool.clone()),
            recommendations: SqlRecommendationRepository::new(pool.clone()),
            history: SqlHistoricalMatchRepository::new(pool),
        }
    }
}

fn persistence(operation: &'static str) -> impl FnOnce(RepositoryError) -> ApplicationError {
    move |source| {
        error!(
            event_name = "store.sql.failed",
            operation,
            error = %source,
            "sql match store operation failed"
        );
        ApplicationError::from(source)
    }
}

#[async_trait]
impl MatchStore for SqlMatchStore {
    async fn find_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, ApplicationError> {
        self.rfqs.find_by_id(id).await.map_err(persistence("find_rfq"))
    }

    async fn find_rfqs(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, ApplicationError> {
        self.rfqs.find_many(ids).await.map_err(persistence("find_rfqs"))
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, ApplicationError> {
        self.suppliers.list().await.map_err(persistence("list_suppliers"))
    }

    async fn find_suppliers(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, ApplicationError> {
        self.suppliers.find_many(ids).await.map_err(persistence("find_suppliers"))
    }

    async fn list_historical_matches(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoricalMatch>, ApplicationError> {
        self.history.list(filter).await.map_err(persistence("list_historical_matches"))
    }

    async fn upsert_recommendation(
        &self,
        upsert: RecommendationUpsert,
    ) -> Result<Recommendation, ApplicationError> {
        self.recommendations.upsert(upsert).await.map_err(persistence("upsert_recommendation"))
    }

    async fn list_recommendations(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        self.recommendations
            .list_for_rfq(rfq_id, limit)
            .await
            .map_err(persistence("list_recommendations"))
    }

    async fn upsert_historical_match(
        &self,
        feedback: &MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, ApplicationError> {
        self.history
            .upsert(feedback, recorded_at)
            .await
            .map_err(persistence("upsert_historical_match"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::SqlMatchStore;
    use crate::repositories::test_support::setup;
    use crate::repositories::{RfqRepository, SqlRfqRepository, SqlSupplierRepository, SupplierRepository};
    use procura_core::config::MatchingConfig;
    use procura_core::domain::rfq::{Rfq, RfqId};
    use procura_core::domain::supplier::{Supplier, SupplierId, SupplierMetrics};
    use procura_core::errors::{ApplicationError, DomainError};
    use procura_core::matching::{FeatureScorer, KeywordMatcher, MatchOptions, MatchingService};

    fn rfq() -> Rfq {
        Rfq {
            id: RfqId::new("rfq-led"),
            title: "LED panel lights".to_string(),
            description: "Ceiling panel lights for warehouse retrofit".to_string(),
            category: "Electrical".to_string(),
            quantity: Some(800),
            budget: None,
            deadline: None,
            location: Some("Nashik, Maharashtra".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 9, 20, 11, 0, 0).unwrap(),
        }
    }

    fn supplier(id: &str, category: &str, verified: bool) -> Supplier {
        Supplier {
            id: SupplierId::new(id),
            company_name: format!("{id} Lighting"),
            description: "LED panel lights and drivers".to_string(),
            categories: vec![category.to_string()],
            location: "Pune, Maharashtra".to_string(),
            verified,
            metrics: Some(SupplierMetrics {
                response_time_hours: Some(12.0),
                acceptance_rate: Some(80.0),
                on_time_delivery: Some(90.0),
                quality_rating: Some(4.0),
                similar_request_count: 3,
            }),
            attributes: None,
        }
    }

    async fn seeded_store() -> (sqlx::SqlitePool, Arc<SqlMatchStore>) {
        let pool = setup().await;
        SqlRfqRepository::new(pool.clone()).save(&rfq()).await.expect("rfq");
        let suppliers = SqlSupplierRepository::new(pool.clone());
        suppliers.save(&supplier("sup-lumen", "Electrical", true)).await.expect("lumen");
        suppliers.save(&supplier("sup-glow", "Textiles", false)).await.expect("glow");
        (pool.clone(), Arc::new(SqlMatchStore::new(pool)))
    }

    fn service(store: Arc<SqlMatchStore>) -> MatchingService {
        MatchingService::new(store.clone(), &MatchingConfig::default())
            .with_strategy(Arc::new(KeywordMatcher::new()))
            .with_strategy(Arc::new(FeatureScorer::new(store)))
    }

    #[tokio::test]
    async fn matching_persists_and_reads_back_enriched_rows() {
        let (_pool, store) = seeded_store().await;
        let service = service(store);

        let matched = service
            .find_matching_suppliers(&RfqId::new("rfq-led"), MatchOptions { limit: 5, use_advanced: false })
            .await
            .expect("match");
        assert_eq!(matched[0].supplier_id.as_str(), "sup-lumen");

        let again = service
            .find_matching_suppliers(&RfqId::new("rfq-led"), MatchOptions { limit: 5, use_advanced: false })
            .await
            .expect("rematch");
        assert_eq!(again[0].id, matched[0].id);

        let enriched = service
            .get_recommendations_with_suppliers(&RfqId::new("rfq-led"), 10)
            .await
            .expect("read path");
        assert_eq!(enriched.len(), matched.len());
        assert_eq!(enriched[0].supplier.company_name, "sup-lumen Lighting");
    }

    #[tokio::test]
    async fn vanished_supplier_is_skipped_on_read() {
        let (pool, store) = seeded_store().await;
        let service = service(store);
        service
            .find_matching_suppliers(&RfqId::new("rfq-led"), MatchOptions { limit: 5, use_advanced: false })
            .await
            .expect("match");

        SqlSupplierRepository::new(pool)
            .delete(&SupplierId::new("sup-lumen"))
            .await
            .expect("delete");

        let enriched = service
            .get_recommendations_with_suppliers(&RfqId::new("rfq-led"), 10)
            .await
            .expect("read path");
        assert!(enriched.iter().all(|row| row.supplier.id.as_str() != "sup-lumen"));
    }

    #[tokio::test]
    async fn unknown_rfq_is_not_found() {
        let (_pool, store) = seeded_store().await;

        let error = service(store)
            .find_matching_suppliers(&RfqId::new("rfq-missing"), MatchOptions::default())
            .await
            .expect_err("missing rfq");

        assert!(matches!(error, ApplicationError::Domain(DomainError::RequestNotFound { .. })));
    }

    #[tokio::test]
    async fn closed_pool_surfaces_as_persistence_error() {
        let (pool, store) = seeded_store().await;
        pool.close().await;

        let error = service(store)
            .find_matching_suppliers(&RfqId::new("rfq-led"), MatchOptions::default())
            .await
            .expect_err("closed pool");

        assert!(matches!(error, ApplicationError::Persistence(_)));
    }
}
