use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use procura_core::matching::MatchingService;
use procura_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    matching: Arc<MatchingService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub matching: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, matching: Arc<MatchingService>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, matching })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let matching = matching_check(&state.matching);
    let ready = database.status == "ready" && matching.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "procura-server runtime initialized".to_string(),
        },
        database,
        matching,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn matching_check(matching: &MatchingService) -> HealthCheck {
    let kinds = matching.strategy_kinds();
    if kinds.is_empty() {
        return HealthCheck { status: "degraded", detail: "no strategies registered".to_string() };
    }
    let names: Vec<&str> = kinds.iter().map(|kind| kind.name()).collect();
    HealthCheck { status: "ready", detail: format!("strategies: {}", names.join(", ")) }
}
