use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use procura_core::domain::history::{HistoricalMatch, HistoricalMatchId, MatchFeedback};
use procura_core::domain::rfq::RfqId;
use procura_core::domain::supplier::SupplierId;
use procura_core::matching::HistoryFilter;

use super::{decode_timestamp, encode_timestamp, HistoricalMatchRepository, RepositoryError};
use crate::DbPool;

pub struct SqlHistoricalMatchRepository {
    pool: DbPool,
}

impl SqlHistoricalMatchRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_rating(column: &str, value: Option<i64>) -> Result<Option<u8>, RepositoryError> {
    value
        .map(u8::try_from)
        .transpose()
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_match(row: &sqlx::sqlite::SqliteRow) -> Result<HistoricalMatch, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rfq_id: String =
        row.try_get("rfq_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let success: bool =
        row.try_get("success").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_feedback: Option<i64> =
        row.try_get("buyer_feedback").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_feedback: Option<i64> =
        row.try_get("supplier_feedback").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(HistoricalMatch {
        id: HistoricalMatchId(id),
        rfq_id: RfqId(rfq_id),
        supplier_id: SupplierId(supplier_id),
        success,
        buyer_feedback: decode_rating("buyer_feedback", buyer_feedback)?,
        supplier_feedback: decode_rating("supplier_feedback", supplier_feedback)?,
        notes,
        created_at: decode_timestamp("created_at", &created_at_str)?,
        updated_at: decode_timestamp("updated_at", &updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl HistoricalMatchRepository for SqlHistoricalMatchRepository {
    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoricalMatch>, RepositoryError> {
        let mut sql = String::from(
            "SELECT hm.id, hm.rfq_id, hm.supplier_id, hm.success, hm.buyer_feedback,
                    hm.supplier_feedback, hm.notes, hm.created_at, hm.updated_at
             FROM historical_match hm",
        );
        if filter.category.is_some() {
            sql.push_str(" JOIN rfq ON rfq.id = hm.rfq_id");
        }
        sql.push_str(" WHERE 1 = 1");
        if filter.successful_only {
            sql.push_str(" AND hm.success = 1");
        }
        if filter.supplier_id.is_some() {
            sql.push_str(" AND hm.supplier_id = ?");
        }
        if filter.since.is_some() {
            sql.push_str(" AND hm.created_at >= ?");
        }
        if filter.category.is_some() {
            sql.push_str(" AND LOWER(TRIM(rfq.category)) = LOWER(TRIM(?))");
        }
        sql.push_str(" ORDER BY hm.created_at ASC, hm.id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(supplier_id) = &filter.supplier_id {
            query = query.bind(&supplier_id.0);
        }
        if let Some(since) = filter.since {
            query = query.bind(encode_timestamp(since));
        }
        if let Some(category) = &filter.category {
            query = query.bind(category);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_match).collect()
    }

    async fn upsert(
        &self,
        feedback: &MatchFeedback,
        recorded_at: DateTime<Utc>,
    ) -> Result<HistoricalMatch, RepositoryError> {
        let recorded_at = encode_timestamp(recorded_at);

        let row = sqlx::query(
            "INSERT INTO historical_match (id, rfq_id, supplier_id, success, buyer_feedback,
                                           supplier_feedback, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(rfq_id, supplier_id) DO UPDATE SET
                 success = excluded.success,
                 buyer_feedback = excluded.buyer_feedback,
                 supplier_feedback = excluded.supplier_feedback,
                 notes = excluded.notes,
                 updated_at = excluded.updated_at
             RETURNING id, rfq_id, supplier_id, success, buyer_feedback, supplier_feedback,
                       notes, created_at, updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&feedback.rfq_id.0)
        .bind(&feedback.supplier_id.0)
        .bind(feedback.success)
        .bind(feedback.buyer_feedback.map(i64::from))
        .bind(feedback.supplier_feedback.map(i64::from))
        .bind(&feedback.notes)
        .bind(&recorded_at)
        .bind(&recorded_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_match(&row)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::SqlHistoricalMatchRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::{HistoricalMatchRepository, RfqRepository, SqlRfqRepository};
    use procura_core::domain::history::MatchFeedback;
    use procura_core::domain::rfq::{Rfq, RfqId};
    use procura_core::domain::supplier::SupplierId;
    use procura_core::matching::HistoryFilter;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn feedback(rfq: &str, supplier: &str, success: bool, rating: Option<u8>) -> MatchFeedback {
        MatchFeedback {
            rfq_id: RfqId::new(rfq),
            supplier_id: SupplierId::new(supplier),
            success,
            buyer_feedback: rating,
            supplier_feedback: None,
            notes: None,
        }
    }

    async fn save_rfq(pool: &sqlx::SqlitePool, id: &str, category: &str) {
        SqlRfqRepository::new(pool.clone())
            .save(&Rfq {
                id: RfqId::new(id),
                title: "Order".to_string(),
                description: String::new(),
                category: category.to_string(),
                quantity: None,
                budget: None,
                deadline: None,
                location: None,
                created_at: base(),
            })
            .await
            .expect("save rfq");
    }

    #[tokio::test]
    async fn upsert_updates_outcome_in_place() {
        let repo = SqlHistoricalMatchRepository::new(setup().await);

        let first = repo.upsert(&feedback("rfq-1", "sup-1", true, Some(5)), base()).await.expect("insert");
        let second = repo
            .upsert(&feedback("rfq-1", "sup-1", false, Some(2)), base() + Duration::days(3))
            .await
            .expect("update");

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, base());
        assert_eq!(second.updated_at, base() + Duration::days(3));
        assert!(!second.success);
        assert_eq!(second.buyer_feedback, Some(2));
        assert_eq!(repo.list(&HistoryFilter::default()).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn filters_combine_success_window_and_category() {
        let pool = setup().await;
        save_rfq(&pool, "rfq-e1", "Electronics").await;
        save_rfq(&pool, "rfq-e2", " electronics ").await;
        save_rfq(&pool, "rfq-f1", "Furniture").await;
        let repo = SqlHistoricalMatchRepository::new(pool);

        repo.upsert(&feedback("rfq-e1", "sup-1", true, Some(4)), base()).await.expect("e1");
        repo.upsert(&feedback("rfq-e2", "sup-1", true, Some(5)), base() + Duration::days(10))
            .await
            .expect("e2");
        repo.upsert(&feedback("rfq-e2", "sup-2", false, Some(1)), base() + Duration::days(11))
            .await
            .expect("e2 fail");
        repo.upsert(&feedback("rfq-f1", "sup-1", true, Some(3)), base() + Duration::days(12))
            .await
            .expect("f1");

        let electronics = repo
            .list(&HistoryFilter::successful().in_category("Electronics"))
            .await
            .expect("electronics");
        let rfqs: Vec<&str> = electronics.iter().map(|record| record.rfq_id.as_str()).collect();
        assert_eq!(rfqs, vec!["rfq-e1", "rfq-e2"]);

        let recent = repo
            .list(&HistoryFilter::default().since(base() + Duration::days(10)))
            .await
            .expect("recent");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].created_at, base() + Duration::days(10));

        let supplier_two = repo
            .list(&HistoryFilter::default().for_supplier(SupplierId::new("sup-2")))
            .await
            .expect("supplier");
        assert_eq!(supplier_two.len(), 1);
        assert!(!supplier_two[0].success);
    }
}
