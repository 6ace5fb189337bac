use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use procura_core::config::MatchingConfig;
use procura_core::domain::history::{HistoricalMatch, MatchFeedback};
use procura_core::domain::recommendation::{EnrichedRecommendation, Recommendation};
use procura_core::domain::rfq::RfqId;
use procura_core::errors::{ApplicationError, DomainError, InterfaceError};
use procura_core::matching::{MatchOptions, MatchingService, DEFAULT_RECOMMENDATION_LIMIT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const MAX_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiState {
    matching: Arc<MatchingService>,
    defaults: MatchOptions,
}

impl ApiState {
    pub fn new(matching: Arc<MatchingService>, config: &MatchingConfig) -> Self {
        Self {
            matching,
            defaults: MatchOptions {
                limit: config.default_limit,
                use_advanced: config.use_advanced,
            },
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/rfqs/{rfq_id}/matches", post(find_matches))
        .route("/api/v1/rfqs/{rfq_id}/recommendations", get(list_recommendations))
        .route("/api/v1/match-feedback", post(record_feedback))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRequest {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub use_advanced: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'static str,
    correlation_id: &'a str,
}

/// An `InterfaceError` rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let correlation_id = self.0.correlation_id();
        warn!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            error = %self.0,
            "request failed"
        );

        let body = ErrorEnvelope {
            error: ErrorBody { code, message: self.0.user_message(), correlation_id },
        };
        let mut response = (status, Json(body)).into_response();
        insert_correlation_header(response.headers_mut(), correlation_id);
        response
    }
}

pub async fn find_matches(
    State(state): State<ApiState>,
    Path(rfq_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = parse_match_request(&body, &correlation_id)?;
    let options = MatchOptions {
        limit: validate_limit(request.limit.unwrap_or(state.defaults.limit), &correlation_id)?,
        use_advanced: request.use_advanced.unwrap_or(state.defaults.use_advanced),
    };
    let rfq_id = parse_rfq_id(&rfq_id, &correlation_id)?;

    info!(
        event_name = "api.matches.requested",
        correlation_id = %correlation_id,
        rfq_id = %rfq_id,
        limit = options.limit,
        use_advanced = options.use_advanced,
        "match requested"
    );

    let recommendations: Vec<Recommendation> = state
        .matching
        .find_matching_suppliers(&rfq_id, options)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(with_correlation(Json(recommendations), &correlation_id))
}

pub async fn list_recommendations(
    State(state): State<ApiState>,
    Path(rfq_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let limit =
        validate_limit(query.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT), &correlation_id)?;
    let rfq_id = parse_rfq_id(&rfq_id, &correlation_id)?;

    let recommendations: Vec<EnrichedRecommendation> = state
        .matching
        .get_recommendations_with_suppliers(&rfq_id, limit)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(with_correlation(Json(recommendations), &correlation_id))
}

pub async fn record_feedback(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let feedback: MatchFeedback = serde_json::from_slice(&body).map_err(|error| {
        ApiError::bad_request(format!("invalid feedback body: {error}"), &correlation_id)
    })?;

    info!(
        event_name = "api.feedback.received",
        correlation_id = %correlation_id,
        rfq_id = %feedback.rfq_id,
        supplier_id = %feedback.supplier_id,
        success = feedback.success,
        "match feedback received"
    );

    let record: HistoricalMatch = state
        .matching
        .record_match_feedback(feedback)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(with_correlation(Json(record), &correlation_id))
}

fn parse_match_request(body: &[u8], correlation_id: &str) -> Result<MatchRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(MatchRequest::default());
    }
    serde_json::from_slice(body).map_err(|error| {
        ApiError::bad_request(format!("invalid match body: {error}"), correlation_id)
    })
}

fn parse_rfq_id(raw: &str, correlation_id: &str) -> Result<RfqId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::from_application(
            DomainError::Validation("rfq_id is required".to_string()).into(),
            correlation_id,
        ));
    }
    Ok(RfqId::new(trimmed))
}

fn validate_limit(limit: usize, correlation_id: &str) -> Result<usize, ApiError> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(ApiError::bad_request(
            format!("limit must be between 1 and {MAX_LIMIT}, got {limit}"),
            correlation_id,
        ))
    }
}

/// Caller-supplied correlation id, or a fresh one.
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn with_correlation(body: impl IntoResponse, correlation_id: &str) -> Response {
    let mut response = body.into_response();
    insert_correlation_header(response.headers_mut(), correlation_id);
    response
}

fn insert_correlation_header(headers: &mut HeaderMap, correlation_id: &str) {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
}
