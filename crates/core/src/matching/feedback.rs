use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::store::MatchStore;
use crate::domain::history::{HistoricalMatch, MatchFeedback};
use crate::errors::{ApplicationError, DomainError};

/// Records match outcomes as historical training signal, one row per (rfq, supplier).
pub struct FeedbackRecorder {
    store: Arc<dyn MatchStore>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, feedback: MatchFeedback) -> Result<HistoricalMatch, ApplicationError> {
        self.record_at(feedback, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        feedback: MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, ApplicationError> {
        validate(&feedback)?;

        let record = self.store.upsert_historical_match(&feedback, recorded_at).await?;
        info!(
            event_name = "matching.feedback.recorded",
            rfq_id = %record.rfq_id,
            supplier_id = %record.supplier_id,
            success = record.success,
            buyer_feedback = record.buyer_feedback,
            "match feedback recorded"
        );
        Ok(record)
    }
}

fn validate(feedback: &MatchFeedback) -> Result<(), DomainError> {
    if feedback.rfq_id.as_str().trim().is_empty() {
        return Err(DomainError::Validation("rfq_id is required".to_string()));
    }
    if feedback.supplier_id.as_str().trim().is_empty() {
        return Err(DomainError::Validation("supplier_id is required".to_string()));
    }
    for (field, rating) in [("buyer_feedback", feedback.buyer_feedback), ("supplier_feedback", feedback.supplier_feedback)] {
        if let Some(rating) = rating {
            if !(1..=5).contains(&rating) {
                return Err(DomainError::Validation(format!("{field} must be between 1 and 5")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::domain::rfq::RfqId;
    use crate::domain::supplier::SupplierId;
    use crate::matching::store::InMemoryMatchStore;

    fn feedback(success: bool, buyer: Option<u8>) -> MatchFeedback {
        MatchFeedback {
            rfq_id: RfqId::new("rfq-1"),
            supplier_id: SupplierId::new("sup-1"),
            success,
            buyer_feedback: buyer,
            supplier_feedback: None,
            notes: Some("delivered".to_string()),
        }
    }

    #[tokio::test]
    async fn repeated_feedback_updates_the_same_record() {
        let store = Arc::new(InMemoryMatchStore::new());
        let recorder = FeedbackRecorder::new(store.clone());
        let first_at = Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap();

        let first = recorder.record_at(feedback(true, Some(4)), first_at).await.expect("first");
        let second = recorder
            .record_at(feedback(false, Some(2)), first_at + Duration::days(1))
            .await
            .expect("second");

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, first_at);
        assert_eq!(second.updated_at, first_at + Duration::days(1));
        assert!(!second.success);
        assert_eq!(second.buyer_feedback, Some(2));
        assert_eq!(store.historical_matches().len(), 1);
    }

    #[tokio::test]
    async fn blank_ids_are_rejected() {
        let recorder = FeedbackRecorder::new(Arc::new(InMemoryMatchStore::new()));
        let mut blank = feedback(true, None);
        blank.supplier_id = SupplierId::new("  ");

        let error = recorder.record(blank).await.expect_err("blank supplier");

        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let recorder = FeedbackRecorder::new(Arc::new(InMemoryMatchStore::new()));

        let error = recorder.record(feedback(true, Some(6))).await.expect_err("rating");

        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));
    }
}
