//! Tenant-scoped AI control endpoints: handoff mode inspection and
//! switching, plus the per-day observability trail.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use leadflow_agent::{HandoffController, StepEmitter};
use leadflow_core::{
    ConversationId, HandoffMode, HandoffTransition, OrchestratorStep, OrgId, RequestError,
};
use serde::{Deserialize, Serialize};

use crate::auth::{api_key_from_headers, OrgResolver};

const DEFAULT_OBSERVABILITY_LIMIT: usize = 50;
const MAX_OBSERVABILITY_LIMIT: usize = 200;

#[derive(Clone)]
pub struct AiState {
    pub handoff: Arc<HandoffController>,
    pub emitter: Arc<StepEmitter>,
    pub resolver: Arc<dyn OrgResolver>,
}

pub fn router(state: AiState) -> Router {
    Router::new()
        .route("/api/v1/ai/handoff", get(get_handoff).post(post_handoff))
        .route("/api/v1/ai/observability", get(get_observability))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ErrorResponse = (StatusCode, Json<ApiError>);

fn reject(error: RequestError) -> ErrorResponse {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError { error: error.to_string() }))
}

async fn resolve_org(state: &AiState, headers: &HeaderMap) -> Result<OrgId, ErrorResponse> {
    let api_key = api_key_from_headers(headers);
    state
        .resolver
        .resolve(api_key.as_deref())
        .await
        .ok_or_else(|| reject(RequestError::AuthResolution))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffQuery {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffModeResponse {
    pub conversation_id: String,
    pub mode: HandoffMode,
}

pub async fn get_handoff(
    State(state): State<AiState>,
    headers: HeaderMap,
    Query(query): Query<HandoffQuery>,
) -> Result<Json<HandoffModeResponse>, ErrorResponse> {
    // Malformed requests are rejected before credentials are looked at.
    let conversation_id = require_conversation_id(query.conversation_id)?;
    let org = resolve_org(&state, &headers).await?;

    let mode = state.handoff.current_mode(&org, &conversation_id).await;
    Ok(Json(HandoffModeResponse { conversation_id: conversation_id.0, mode }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRequest {
    pub conversation_id: Option<String>,
    pub mode: Option<String>,
}

pub async fn post_handoff(
    State(state): State<AiState>,
    headers: HeaderMap,
    Json(body): Json<HandoffRequest>,
) -> Result<Json<HandoffTransition>, ErrorResponse> {
    let conversation_id = require_conversation_id(body.conversation_id)?;
    let raw_mode = body
        .mode
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| reject(RequestError::Validation("mode is required".to_string())))?;
    let mode: HandoffMode = raw_mode
        .parse()
        .map_err(|error| reject(RequestError::Validation(format!("{error}"))))?;

    let org = resolve_org(&state, &headers).await?;

    let transition =
        state.handoff.transition(&org, &conversation_id, mode).await.map_err(reject)?;
    Ok(Json(transition))
}

fn require_conversation_id(raw: Option<String>) -> Result<ConversationId, ErrorResponse> {
    raw.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(ConversationId)
        .ok_or_else(|| reject(RequestError::Validation("conversationId is required".to_string())))
}

#[derive(Debug, Deserialize)]
pub struct ObservabilityQuery {
    pub date: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityResponse {
    pub date: String,
    pub total: usize,
    pub steps: Vec<OrchestratorStep>,
}

pub async fn get_observability(
    State(state): State<AiState>,
    headers: HeaderMap,
    Query(query): Query<ObservabilityQuery>,
) -> Result<Json<ObservabilityResponse>, ErrorResponse> {
    let org = resolve_org(&state, &headers).await?;

    let date = match query.date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            reject(RequestError::Validation(format!(
                "invalid date `{raw}` (expected YYYY-MM-DD)"
            )))
        })?,
        None => Utc::now().date_naive(),
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_OBSERVABILITY_LIMIT)
        .clamp(1, MAX_OBSERVABILITY_LIMIT);

    let steps = state
        .emitter
        .read_day(&org, date, limit)
        .await
        .map_err(|error| reject(RequestError::Persistence(error.to_string())))?;

    Ok(Json(ObservabilityResponse {
        date: date.format("%Y-%m-%d").to_string(),
        total: steps.len(),
        steps,
    }))
}
