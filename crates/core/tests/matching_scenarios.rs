use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use procura_core::config::MatchingConfig;
use procura_core::domain::history::{HistoricalMatch, HistoricalMatchId, MatchFeedback};
use procura_core::domain::recommendation::ScoredCandidate;
use procura_core::domain::rfq::{Rfq, RfqId};
use procura_core::domain::supplier::{Supplier, SupplierId, SupplierMetrics};
use procura_core::matching::{
    forecast, FeatureScorer, InMemoryMatchStore, MatchContext, MatchOptions, MatchStore,
    MatchingService, ScoringStrategy, StrategyError, StrategyKind, StrategyResult,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 9, 30, 0).unwrap()
}

fn electronics_rfq() -> Rfq {
    Rfq {
        id: RfqId::new("rfq-electronics"),
        title: "Microcontroller boards".to_string(),
        description: "Development boards for an IoT pilot".to_string(),
        category: "Electronics".to_string(),
        quantity: Some(250),
        budget: None,
        deadline: None,
        location: None,
        created_at: now(),
    }
}

fn supplier_a() -> Supplier {
    Supplier {
        id: SupplierId::new("supplier-a"),
        company_name: "Arcadia Circuits".to_string(),
        description: "Contract electronics manufacturing".to_string(),
        categories: vec!["Electronics".to_string()],
        location: "Bengaluru, Karnataka".to_string(),
        verified: true,
        metrics: Some(SupplierMetrics {
            response_time_hours: Some(10.0),
            acceptance_rate: Some(90.0),
            on_time_delivery: Some(95.0),
            quality_rating: Some(5.0),
            similar_request_count: 0,
        }),
        attributes: None,
    }
}

fn supplier_b() -> Supplier {
    Supplier {
        id: SupplierId::new("supplier-b"),
        company_name: "Birch Interiors".to_string(),
        description: "Office and home furniture".to_string(),
        categories: vec!["Furniture".to_string()],
        location: "Jaipur, Rajasthan".to_string(),
        verified: false,
        metrics: None,
        attributes: None,
    }
}

fn supplier_c() -> Supplier {
    Supplier {
        id: SupplierId::new("supplier-c"),
        company_name: "Cobalt Devices".to_string(),
        description: "Sensors and gateways".to_string(),
        categories: vec!["Electronics".to_string(), "IoT".to_string()],
        location: "Chennai, Tamil Nadu".to_string(),
        verified: true,
        metrics: None,
        attributes: None,
    }
}

fn marketplace() -> Arc<InMemoryMatchStore> {
    let store = Arc::new(InMemoryMatchStore::new());
    store.insert_rfq(electronics_rfq());
    store.insert_supplier(supplier_a());
    store.insert_supplier(supplier_b());
    store.insert_supplier(supplier_c());
    store
}

struct UnreachableLlm;

#[async_trait]
impl ScoringStrategy for UnreachableLlm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AiSemantic
    }

    async fn score(&self, _context: &MatchContext, _limit: usize) -> StrategyResult<Vec<ScoredCandidate>> {
        Err(StrategyError::Integration("connection refused".to_string()))
    }
}

#[tokio::test]
async fn feature_scorer_ranks_electronics_suppliers() {
    let store = marketplace();
    let service = MatchingService::new(store.clone(), &MatchingConfig::default())
        .with_strategy(Arc::new(FeatureScorer::new(store)));

    let recommendations = service
        .find_matching_suppliers_at(
            &RfqId::new("rfq-electronics"),
            MatchOptions { limit: 2, use_advanced: true },
            now(),
        )
        .await
        .expect("match");

    let ids: Vec<&str> = recommendations.iter().map(|row| row.supplier_id.as_str()).collect();
    assert_eq!(ids, vec!["supplier-a", "supplier-c"]);

    let feature_score = recommendations[0]
        .factors
        .iter()
        .find(|factor| factor.name == "featureBased")
        .map(|factor| factor.score);
    assert!(feature_score.is_some_and(|score| (score - 69.25).abs() < 1e-9));
    assert!((recommendations[0].score - 69.25).abs() < 1e-9);
    assert!(!recommendations[0].recommended);
    assert!((recommendations[1].score - 50.0).abs() < 1e-9);
}

#[test]
fn feature_breakdown_for_supplier_a() {
    let breakdown =
        FeatureScorer::breakdown(&electronics_rfq(), &supplier_a(), 0).expect("well-formed supplier");

    assert_eq!(breakdown.category, 100.0);
    assert!((breakdown.performance - 96.25).abs() < 1e-9);
    assert_eq!(breakdown.verification, 100.0);
    assert_eq!(breakdown.location, 0.0);
}

#[tokio::test]
async fn empty_supplier_pool_returns_no_recommendations() {
    let store = Arc::new(InMemoryMatchStore::new());
    store.insert_rfq(electronics_rfq());
    let service =
        MatchingService::new(store, &MatchingConfig::default()).with_default_strategies();

    let recommendations = service
        .find_matching_suppliers_at(&RfqId::new("rfq-electronics"), MatchOptions::default(), now())
        .await
        .expect("empty pool is not an error");

    assert!(recommendations.is_empty());
}

#[tokio::test]
async fn llm_failure_renormalises_blend_over_remaining_strategies() {
    let store = marketplace();
    let history_at = now() - Duration::days(20);
    for (index, supplier) in ["supplier-a", "supplier-a", "supplier-a"].iter().enumerate() {
        let past_id = RfqId::new(format!("rfq-past-{index}"));
        store.insert_rfq(Rfq {
            id: past_id.clone(),
            title: "Microcontroller boards".to_string(),
            description: "Development boards for sensors".to_string(),
            category: "Electronics".to_string(),
            quantity: None,
            budget: None,
            deadline: None,
            location: None,
            created_at: history_at,
        });
        let at = history_at + Duration::days(index as i64);
        store.insert_historical_match(HistoricalMatch {
            id: HistoricalMatchId(format!("hm-{index}")),
            rfq_id: past_id,
            supplier_id: SupplierId::new(*supplier),
            success: true,
            buyer_feedback: Some(5),
            supplier_feedback: None,
            notes: None,
            created_at: at,
            updated_at: at,
        });
    }

    let service = MatchingService::new(store, &MatchingConfig::default())
        .with_strategy(Arc::new(UnreachableLlm))
        .with_default_strategies();

    let recommendations = service
        .find_matching_suppliers_at(&RfqId::new("rfq-electronics"), MatchOptions::default(), now())
        .await
        .expect("match");

    assert!(!recommendations.is_empty());
    let top = &recommendations[0];
    assert_eq!(top.supplier_id.as_str(), "supplier-a");
    assert!(top.factors.iter().all(|factor| factor.name != "aiSemantic"));

    let contributing: Vec<(f64, f64)> = top
        .factors
        .iter()
        .filter(|factor| factor.name != "ensemble_blend")
        .map(|factor| (factor.weight / 100.0, factor.score))
        .collect();
    let weight_sum: f64 = contributing.iter().map(|(weight, _)| weight).sum();
    let expected: f64 =
        contributing.iter().map(|(weight, score)| weight * score).sum::<f64>() / weight_sum;
    assert!((top.score - expected).abs() < 1e-9);
    assert!(weight_sum <= 0.60 + 1e-9);
}

#[tokio::test]
async fn feedback_is_idempotent_per_rfq_and_supplier() {
    let store = marketplace();
    let service = MatchingService::new(store.clone(), &MatchingConfig::default());
    let feedback = MatchFeedback {
        rfq_id: RfqId::new("rfq-electronics"),
        supplier_id: SupplierId::new("supplier-a"),
        success: true,
        buyer_feedback: Some(5),
        supplier_feedback: Some(4),
        notes: None,
    };

    let first = service.record_match_feedback(feedback.clone()).await.expect("first");
    let second = service.record_match_feedback(feedback).await.expect("second");

    assert_eq!(first.id, second.id);
    let stored = store
        .list_historical_matches(&procura_core::matching::HistoryFilter::default())
        .await
        .expect("history");
    assert_eq!(stored.len(), 1);
}

#[test]
fn two_matches_are_not_enough_for_a_trend() {
    let records: Vec<HistoricalMatch> = (0..2)
        .map(|index| HistoricalMatch {
            id: HistoricalMatchId(format!("hm-{index}")),
            rfq_id: RfqId::new(format!("rfq-{index}")),
            supplier_id: SupplierId::new("supplier-a"),
            success: true,
            buyer_feedback: Some(5),
            supplier_feedback: None,
            notes: None,
            created_at: now() + Duration::days(index),
            updated_at: now() + Duration::days(index),
        })
        .collect();

    assert!(forecast(&records).is_none());
}
