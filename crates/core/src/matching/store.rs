//! Storage port consumed by the matching engine, plus an in-memory implementation
//! used by tests and the CLI dry-run paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::history::{HistoricalMatch, HistoricalMatchId, MatchFeedback};
use crate::domain::recommendation::{Recommendation, RecommendationId, ScoreFactor};
use crate::domain::rfq::{Rfq, RfqId};
use crate::domain::supplier::{Supplier, SupplierId};
use crate::errors::ApplicationError;

/// Selects historical matches. Empty fields do not filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryFilter {
    pub supplier_id: Option<SupplierId>,
    pub successful_only: bool,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Category of the RFQ the match belongs to, compared case-insensitively.
    pub category: Option<String>,
}

impl HistoryFilter {
    pub fn successful() -> Self {
        Self { successful_only: true, ..Self::default() }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn for_supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    /// Whether `record` passes every filter except `category`, which needs the RFQ.
    pub fn admits(&self, record: &HistoricalMatch) -> bool {
        if self.successful_only && !record.success {
            return false;
        }
        if let Some(supplier_id) = &self.supplier_id {
            if record.supplier_id != *supplier_id {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        true
    }
}

/// Values written for one (rfq, supplier) recommendation.
#[derive(Clone, Debug, PartialEq)]
pub struct RecommendationUpsert {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub score: f64,
    pub reason: String,
    pub factors: Vec<ScoreFactor>,
    pub recommended: bool,
    pub written_at: DateTime<Utc>,
}

impl RecommendationUpsert {
    /// The row this upsert would produce when no row exists yet.
    pub fn into_new_recommendation(self) -> Recommendation {
        Recommendation {
            id: RecommendationId(Uuid::new_v4().to_string()),
            rfq_id: self.rfq_id,
            supplier_id: self.supplier_id,
            score: self.score,
            reason: self.reason,
            factors: self.factors,
            recommended: self.recommended,
            created_at: self.written_at,
            updated_at: self.written_at,
        }
    }
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, ApplicationError>;

    async fn find_rfqs(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, ApplicationError>;

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, ApplicationError>;

    async fn find_suppliers(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, ApplicationError>;

    /// Matching records ordered by `created_at` ascending.
    async fn list_historical_matches(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoricalMatch>, ApplicationError>;

    /// Updates the row for (rfq, supplier) in place, or inserts it.
    async fn upsert_recommendation(
        &self,
        upsert: RecommendationUpsert,
    ) -> Result<Recommendation, ApplicationError>;

    /// Stored recommendations for an RFQ, best score first.
    async fn list_recommendations(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError>;

    /// Updates the outcome for (rfq, supplier) in place, or inserts it.
    async fn upsert_historical_match(
        &self,
        feedback: &MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, ApplicationError>;
}

#[derive(Default)]
struct InMemoryState {
    rfqs: HashMap<RfqId, Rfq>,
    suppliers: Vec<Supplier>,
    history: Vec<HistoricalMatch>,
    recommendations: Vec<Recommendation>,
}

#[derive(Default)]
pub struct InMemoryMatchStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert_rfq(&self, rfq: Rfq) {
        self.state().rfqs.insert(rfq.id.clone(), rfq);
    }

    pub fn insert_supplier(&self, supplier: Supplier) {
        let mut state = self.state();
        state.suppliers.retain(|existing| existing.id != supplier.id);
        state.suppliers.push(supplier);
    }

    /// Seeds a historical record as-is, bypassing upsert timestamps.
    pub fn insert_historical_match(&self, record: HistoricalMatch) {
        let mut state = self.state();
        state
            .history
            .retain(|existing| !(existing.rfq_id == record.rfq_id && existing.supplier_id == record.supplier_id));
        state.history.push(record);
    }

    pub fn historical_matches(&self) -> Vec<HistoricalMatch> {
        self.state().history.clone()
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.state().recommendations.clone()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn find_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, ApplicationError> {
        Ok(self.state().rfqs.get(id).cloned())
    }

    async fn find_rfqs(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, ApplicationError> {
        let state = self.state();
        Ok(ids.iter().filter_map(|id| state.rfqs.get(id).cloned()).collect())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, ApplicationError> {
        Ok(self.state().suppliers.clone())
    }

    async fn find_suppliers(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, ApplicationError> {
        let state = self.state();
        Ok(state.suppliers.iter().filter(|supplier| ids.contains(&supplier.id)).cloned().collect())
    }

    async fn list_historical_matches(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoricalMatch>, ApplicationError> {
        let state = self.state();
        let mut records: Vec<HistoricalMatch> = state
            .history
            .iter()
            .filter(|record| filter.admits(record))
            .filter(|record| match &filter.category {
                Some(category) => {
                    state.rfqs.get(&record.rfq_id).is_some_and(|rfq| rfq.same_category(category))
                }
                None => true,
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn upsert_recommendation(
        &self,
        upsert: RecommendationUpsert,
    ) -> Result<Recommendation, ApplicationError> {
        let mut state = self.state();
        let existing = state.recommendations.iter_mut().find(|row| {
            row.rfq_id == upsert.rfq_id && row.supplier_id == upsert.supplier_id
        });

        if let Some(row) = existing {
            row.score = upsert.score;
            row.reason = upsert.reason;
            row.factors = upsert.factors;
            row.recommended = upsert.recommended;
            row.updated_at = upsert.written_at;
            return Ok(row.clone());
        }

        let row = upsert.into_new_recommendation();
        state.recommendations.push(row.clone());
        Ok(row)
    }

    async fn list_recommendations(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let state = self.state();
        let mut rows: Vec<Recommendation> =
            state.recommendations.iter().filter(|row| row.rfq_id == *rfq_id).cloned().collect();
        crate::domain::recommendation::rank_descending(&mut rows, |row| (row.score, &row.supplier_id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn upsert_historical_match(
        &self,
        feedback: &MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, ApplicationError> {
        let mut state = self.state();
        let existing = state.history.iter_mut().find(|record| {
            record.rfq_id == feedback.rfq_id && record.supplier_id == feedback.supplier_id
        });

        if let Some(record) = existing {
            record.success = feedback.success;
            record.buyer_feedback = feedback.buyer_feedback;
            record.supplier_feedback = feedback.supplier_feedback;
            record.notes = feedback.notes.clone();
            record.updated_at = recorded_at;
            return Ok(record.clone());
        }

        let record = HistoricalMatch {
            id: HistoricalMatchId(Uuid::new_v4().to_string()),
            rfq_id: feedback.rfq_id.clone(),
            supplier_id: feedback.supplier_id.clone(),
            success: feedback.success,
            buyer_feedback: feedback.buyer_feedback,
            supplier_feedback: feedback.supplier_feedback,
            notes: feedback.notes.clone(),
            created_at: recorded_at,
            updated_at: recorded_at,
        };
        state.history.push(record.clone());
        Ok(record)
    }
}
