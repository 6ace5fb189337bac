use chrono::Utc;
use sqlx::Row;

use procura_core::domain::supplier::{Supplier, SupplierAttributes, SupplierId, SupplierMetrics};

use super::{
    decode_json, encode_json, encode_timestamp, placeholders, RepositoryError, SupplierRepository,
};
use crate::DbPool;

const SUPPLIER_COLUMNS: &str = "id, company_name, description, categories_json, location, verified,
     has_metrics, response_time_hours, acceptance_rate, on_time_delivery, quality_rating,
     similar_request_count, preferred_categories_json";

pub struct SqlSupplierRepository {
    pool: DbPool,
}

impl SqlSupplierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_supplier(row: &sqlx::sqlite::SqliteRow) -> Result<Supplier, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company_name: String =
        row.try_get("company_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let categories_json: String =
        row.try_get("categories_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: String =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let verified: bool =
        row.try_get("verified").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let has_metrics: bool =
        row.try_get("has_metrics").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response_time_hours: Option<f64> =
        row.try_get("response_time_hours").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let acceptance_rate: Option<f64> =
        row.try_get("acceptance_rate").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let on_time_delivery: Option<f64> =
        row.try_get("on_time_delivery").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quality_rating: Option<f64> =
        row.try_get("quality_rating").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let similar_request_count: i64 = row
        .try_get("similar_request_count")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_categories_json: Option<String> = row
        .try_get("preferred_categories_json")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let metrics = if has_metrics {
        Some(SupplierMetrics {
            response_time_hours,
            acceptance_rate,
            on_time_delivery,
            quality_rating,
            similar_request_count: u32::try_from(similar_request_count)
                .map_err(|e| RepositoryError::Decode(format!("similar_request_count: {e}")))?,
        })
    } else {
        None
    };
    let attributes = preferred_categories_json
        .as_deref()
        .map(|json| decode_json::<Vec<String>>("preferred_categories_json", json))
        .transpose()?
        .map(|preferred_categories| SupplierAttributes { preferred_categories });

    Ok(Supplier {
        id: SupplierId(id),
        company_name,
        description,
        categories: decode_json("categories_json", &categories_json)?,
        location,
        verified,
        metrics,
        attributes,
    })
}

#[async_trait::async_trait]
impl SupplierRepository for SqlSupplierRepository {
    async fn list(&self) -> Result<Vec<Supplier>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM supplier ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_supplier).collect()
    }

    async fn find_many(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE id IN {} ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_supplier).collect()
    }

    async fn save(&self, supplier: &Supplier) -> Result<(), RepositoryError> {
        let metrics = supplier.metrics.clone().unwrap_or_default();
        let preferred_categories_json = supplier
            .attributes
            .as_ref()
            .map(|attributes| encode_json(&attributes.preferred_categories))
            .transpose()?;
        let now = encode_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO supplier (id, company_name, description, categories_json, location,
                                   verified, has_metrics, response_time_hours, acceptance_rate,
                                   on_time_delivery, quality_rating, similar_request_count,
                                   preferred_categories_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 company_name = excluded.company_name,
                 description = excluded.description,
                 categories_json = excluded.categories_json,
                 location = excluded.location,
                 verified = excluded.verified,
                 has_metrics = excluded.has_metrics,
                 response_time_hours = excluded.response_time_hours,
                 acceptance_rate = excluded.acceptance_rate,
                 on_time_delivery = excluded.on_time_delivery,
                 quality_rating = excluded.quality_rating,
                 similar_request_count = excluded.similar_request_count,
                 preferred_categories_json = excluded.preferred_categories_json,
                 updated_at = excluded.updated_at",
        )
        .bind(&supplier.id.0)
        .bind(&supplier.company_name)
        .bind(&supplier.description)
        .bind(encode_json(&supplier.categories)?)
        .bind(&supplier.location)
        .bind(supplier.verified)
        .bind(supplier.metrics.is_some())
        .bind(metrics.response_time_hours)
        .bind(metrics.acceptance_rate)
        .bind(metrics.on_time_delivery)
        .bind(metrics.quality_rating)
        .bind(i64::from(metrics.similar_request_count))
        .bind(&preferred_categories_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &SupplierId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM supplier WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
