use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use procura_core::domain::history::{HistoricalMatch, MatchFeedback};
use procura_core::domain::recommendation::Recommendation;
use procura_core::domain::rfq::{Rfq, RfqId};
use procura_core::domain::supplier::{Supplier, SupplierId};
use procura_core::errors::ApplicationError;
use procura_core::matching::{HistoryFilter, RecommendationUpsert};

pub mod history;
pub mod recommendation;
pub mod rfq;
pub mod supplier;

pub use history::SqlHistoricalMatchRepository;
pub use recommendation::SqlRecommendationRepository;
pub use rfq::SqlRfqRepository;
pub use supplier::SqlSupplierRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait RfqRepository: Send + Sync {
    async fn find_by_id(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError>;
    async fn find_many(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, RepositoryError>;
    async fn save(&self, rfq: &Rfq) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Supplier>, RepositoryError>;
    async fn find_many(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, RepositoryError>;
    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &SupplierId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    async fn upsert(&self, upsert: RecommendationUpsert) -> Result<Recommendation, RepositoryError>;
    async fn list_for_rfq(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, RepositoryError>;
}

#[async_trait]
pub trait HistoricalMatchRepository: Send + Sync {
    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoricalMatch>, RepositoryError>;
    async fn upsert(
        &self,
        feedback: &MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, RepositoryError>;
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so they sort lexically.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Decode(error.to_string()))
}

/// `(?, ?, ...)` with one placeholder per bound value.
pub(crate) fn placeholders(count: usize) -> String {
    let marks = vec!["?"; count];
    format!("({})", marks.join(", "))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);

        assert!(encode_timestamp(early) < encode_timestamp(late));
        assert_eq!(encode_timestamp(early), "2026-03-09T08:00:00.000000Z");
        assert_eq!(decode_timestamp("created_at", &encode_timestamp(late)).expect("decode"), late);
    }

    #[test]
    fn invalid_timestamp_is_a_decode_error() {
        let error = decode_timestamp("created_at", "yesterday").expect_err("invalid");
        assert!(matches!(error, RepositoryError::Decode(message) if message.starts_with("created_at")));
    }

    #[test]
    fn placeholders_match_value_count() {
        assert_eq!(placeholders(1), "(?)");
        assert_eq!(placeholders(3), "(?, ?, ?)");
    }
}
