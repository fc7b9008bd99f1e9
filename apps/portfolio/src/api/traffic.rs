//! `/api/traffic` handlers.

use super::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use portfolio_core::TrafficLog;
use serde::Deserialize;
use serde_json::Value;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/click", post(click))
        .route("/logs", get(logs))
        .route("/logs/port/{port_id}", get(logs_by_port))
        .route("/logs/{id}", delete(remove))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    #[serde(default)]
    port_id: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// `?limit=`; anything that is not a positive integer means "no limit".
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    limit: Option<String>,
}

impl LimitQuery {
    fn limit(&self) -> Option<u32> {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .filter(|&n| n > 0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    port_id: Option<String>,
}

async fn click(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ClickRequest>,
) -> ApiResult<impl IntoResponse> {
    let port_id = body.port_id.filter(|p| !p.is_empty());
    if let Some(port_id) = &port_id {
        if state.store.ports().get(port_id)?.is_none() {
            return Err(ApiError::not_found("Port not found"));
        }
    }
    let metadata = match body.metadata {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    let log = state
        .store
        .traffic()
        .record_click(port_id.as_deref(), metadata)?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<TrafficLog>>> {
    Ok(Json(state.store.traffic().list(query.limit())?))
}

async fn logs_by_port(
    State(state): State<AppState>,
    Path(port_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<TrafficLog>>> {
    Ok(Json(state.store.traffic().by_port(&port_id, query.limit())?))
}

async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Response> {
    let traffic = state.store.traffic();
    let response = match query.port_id.filter(|p| !p.is_empty()) {
        Some(port_id) => Json(traffic.stats_for(Some(&port_id))?).into_response(),
        None => Json(traffic.all_stats()?).into_response(),
    };
    Ok(response)
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if !state.store.traffic().delete(&id)? {
        return Err(ApiError::not_found("Traffic log not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
