use sqlx::Row;
use uuid::Uuid;

use procura_core::domain::recommendation::{Recommendation, RecommendationId};
use procura_core::domain::rfq::RfqId;
use procura_core::domain::supplier::SupplierId;
use procura_core::matching::RecommendationUpsert;

use super::{
    decode_json, decode_timestamp, encode_json, encode_timestamp, RecommendationRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlRecommendationRepository {
    pool: DbPool,
}

impl SqlRecommendationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_recommendation(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Recommendation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rfq_id: String =
        row.try_get("rfq_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let score: f64 = row.try_get("score").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reason: String =
        row.try_get("reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let factors_json: String =
        row.try_get("factors_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recommended: bool =
        row.try_get("recommended").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Recommendation {
        id: RecommendationId(id),
        rfq_id: RfqId(rfq_id),
        supplier_id: SupplierId(supplier_id),
        score,
        reason,
        factors: decode_json("factors_json", &factors_json)?,
        recommended,
        created_at: decode_timestamp("created_at", &created_at_str)?,
        updated_at: decode_timestamp("updated_at", &updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl RecommendationRepository for SqlRecommendationRepository {
    async fn upsert(&self, upsert: RecommendationUpsert) -> Result<Recommendation, RepositoryError> {
        let written_at = encode_timestamp(upsert.written_at);

        let row = sqlx::query(
            "INSERT INTO recommendation (id, rfq_id, supplier_id, score, reason, factors_json,
                                         recommended, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(rfq_id, supplier_id) DO UPDATE SET
                 score = excluded.score,
                 reason = excluded.reason,
                 factors_json = excluded.factors_json,
                 recommended = excluded.recommended,
                 updated_at = excluded.updated_at
             RETURNING id, rfq_id, supplier_id, score, reason, factors_json, recommended,
                       created_at, updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&upsert.rfq_id.0)
        .bind(&upsert.supplier_id.0)
        .bind(upsert.score)
        .bind(&upsert.reason)
        .bind(encode_json(&upsert.factors)?)
        .bind(upsert.recommended)
        .bind(&written_at)
        .bind(&written_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_recommendation(&row)
    }

    async fn list_for_rfq(
        &self,
        rfq_id: &RfqId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, rfq_id, supplier_id, score, reason, factors_json, recommended,
                    created_at, updated_at
             FROM recommendation
             WHERE rfq_id = ?
             ORDER BY score DESC, supplier_id ASC
             LIMIT ?",
        )
        .bind(&rfq_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_recommendation).collect()
    }
}
