use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Canonical seed contract for the marketplace fixture.
const SEED_RFQS: &[SeedRfq] = &[
    SeedRfq { id: "rfq-seed-iot-boards", category: "Electronics" },
    SeedRfq { id: "rfq-seed-sensor-kits", category: "Electronics" },
    SeedRfq { id: "rfq-seed-gateway-units", category: "Electronics" },
    SeedRfq { id: "rfq-seed-office-chairs", category: "Furniture" },
];

const SEED_SUPPLIERS: &[SeedSupplier] = &[
    SeedSupplier { id: "sup-seed-arcadia", verified: true, has_metrics: true },
    SeedSupplier { id: "sup-seed-birch", verified: false, has_metrics: false },
    SeedSupplier { id: "sup-seed-cobalt", verified: true, has_metrics: false },
    SeedSupplier { id: "sup-seed-delta", verified: false, has_metrics: true },
];

const SEED_HISTORY: &[SeedHistory] = &[
    SeedHistory {
        id: "hm-seed-sensor-arcadia",
        rfq_id: "rfq-seed-sensor-kits",
        supplier_id: "sup-seed-arcadia",
        success: true,
    },
    SeedHistory {
        id: "hm-seed-sensor-delta",
        rfq_id: "rfq-seed-sensor-kits",
        supplier_id: "sup-seed-delta",
        success: false,
    },
    SeedHistory {
        id: "hm-seed-gateway-arcadia",
        rfq_id: "rfq-seed-gateway-units",
        supplier_id: "sup-seed-arcadia",
        success: true,
    },
    SeedHistory {
        id: "hm-seed-chairs-birch",
        rfq_id: "rfq-seed-office-chairs",
        supplier_id: "sup-seed-birch",
        success: true,
    },
];

/// Open RFQ the seeded history is built around.
pub const SEED_OPEN_RFQ_ID: &str = "rfq-seed-iot-boards";

/// Marketplace seed dataset: RFQs, a supplier pool and past match outcomes.
pub struct MarketplaceSeedDataset;

impl MarketplaceSeedDataset {
    /// SQL fixture content for the marketplace seed.
    pub const SQL: &str = include_str!("../../../config/fixtures/marketplace_seed.sql");

    /// Load the seed dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            open_rfq_id: SEED_OPEN_RFQ_ID,
            rfqs_seeded: SEED_RFQS.len(),
            suppliers_seeded: SEED_SUPPLIERS.len(),
            historical_matches_seeded: SEED_HISTORY.len(),
        })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for rfq in SEED_RFQS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM rfq WHERE id = ?1 AND category = ?2)",
            )
            .bind(rfq.id)
            .bind(rfq.category)
            .fetch_one(pool)
            .await?;
            checks.push((rfq.id, exists == 1));
        }

        for supplier in SEED_SUPPLIERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM supplier WHERE id = ?1 AND verified = ?2 AND has_metrics = ?3)",
            )
            .bind(supplier.id)
            .bind(supplier.verified)
            .bind(supplier.has_metrics)
            .fetch_one(pool)
            .await?;
            checks.push((supplier.id, exists == 1));
        }

        for record in SEED_HISTORY {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM historical_match
                               WHERE id = ?1 AND rfq_id = ?2 AND supplier_id = ?3 AND success = ?4)",
            )
            .bind(record.id)
            .bind(record.rfq_id)
            .bind(record.supplier_id)
            .bind(record.success)
            .fetch_one(pool)
            .await?;
            checks.push((record.id, exists == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Clean up seeded fixtures, including recommendations written for seeded RFQs.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_history = sql_array_from_ids(SEED_HISTORY.iter().map(|record| record.id));
        let quoted_rfqs = sql_array_from_ids(SEED_RFQS.iter().map(|rfq| rfq.id));
        let quoted_suppliers = sql_array_from_ids(SEED_SUPPLIERS.iter().map(|supplier| supplier.id));

        sqlx::query(&format!("DELETE FROM historical_match WHERE id IN {quoted_history}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM recommendation WHERE rfq_id IN {quoted_rfqs}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM rfq WHERE id IN {quoted_rfqs}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM supplier WHERE id IN {quoted_suppliers}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRfq {
    id: &'static str,
    category: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedSupplier {
    id: &'static str,
    verified: bool,
    has_metrics: bool,
}

#[derive(Debug, Clone, Copy)]
struct SeedHistory {
    id: &'static str,
    rfq_id: &'static str,
    supplier_id: &'static str,
    success: bool,
}

fn sql_array_from_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = ids.map(|id| format!("'{id}'")).collect();
    format!("({})", quoted.join(", "))
}

/// Result of loading seed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub open_rfq_id: &'static str,
    pub rfqs_seeded: usize,
    pub suppliers_seeded: usize,
    pub historical_matches_seeded: usize,
}

/// Result of verifying seed data.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
