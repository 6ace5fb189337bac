use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use procura_core::domain::rfq::{Rfq, RfqId};

use super::{
    decode_timestamp, encode_timestamp, placeholders, RepositoryError, RfqRepository,
};
use crate::DbPool;

const RFQ_COLUMNS: &str =
    "id, title, description, category, quantity, budget, deadline, location, created_at";

pub struct SqlRfqRepository {
    pool: DbPool,
}

impl SqlRfqRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_rfq(row: &sqlx::sqlite::SqliteRow) -> Result<Rfq, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: Option<i64> =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let budget_str: Option<String> =
        row.try_get("budget").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deadline_str: Option<String> =
        row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: Option<String> =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quantity = quantity
        .map(u32::try_from)
        .transpose()
        .map_err(|e| RepositoryError::Decode(format!("quantity: {e}")))?;
    let budget = budget_str
        .as_deref()
        .map(Decimal::from_str)
        .transpose()
        .map_err(|e| RepositoryError::Decode(format!("budget: {e}")))?;
    let deadline =
        deadline_str.as_deref().map(|value| decode_timestamp("deadline", value)).transpose()?;

    Ok(Rfq {
        id: RfqId(id),
        title,
        description,
        category,
        quantity,
        budget,
        deadline,
        location,
        created_at: decode_timestamp("created_at", &created_at_str)?,
    })
}

#[async_trait::async_trait]
impl RfqRepository for SqlRfqRepository {
    async fn find_by_id(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RFQ_COLUMNS} FROM rfq WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_rfq(r)?)),
            None => Ok(None),
        }
    }

    async fn find_many(&self, ids: &[RfqId]) -> Result<Vec<Rfq>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {RFQ_COLUMNS} FROM rfq WHERE id IN {} ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_rfq).collect()
    }

    async fn save(&self, rfq: &Rfq) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rfq (id, title, description, category, quantity, budget, deadline,
                              location, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 category = excluded.category,
                 quantity = excluded.quantity,
                 budget = excluded.budget,
                 deadline = excluded.deadline,
                 location = excluded.location",
        )
        .bind(&rfq.id.0)
        .bind(&rfq.title)
        .bind(&rfq.description)
        .bind(&rfq.category)
        .bind(rfq.quantity.map(i64::from))
        .bind(rfq.budget.map(|budget| budget.to_string()))
        .bind(rfq.deadline.map(encode_timestamp))
        .bind(&rfq.location)
        .bind(encode_timestamp(rfq.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
