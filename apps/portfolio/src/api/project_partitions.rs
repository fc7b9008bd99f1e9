//! `/api/project-partitions` handlers.

use super::partitions::present;
use super::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use portfolio_core::{Association, AssociationPatch, NewAssociation};
use serde::Deserialize;

const NOT_FOUND: &str = "Project-partition relationship not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/project/{project_id}", get(by_project))
        .route("/partition/{partition_id}", get(by_partition))
        .route(
            "/{project_id}/{partition_id}",
            get(show).put(update).delete(remove),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssociation {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    partition_id: Option<String>,
    #[serde(default)]
    is_featured: Option<bool>,
    #[serde(default)]
    sort_order: Option<i64>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Association>>> {
    Ok(Json(state.store.associations().list()?))
}

async fn by_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<Association>>> {
    Ok(Json(state.store.associations().by_project(&project_id)?))
}

async fn by_partition(
    State(state): State<AppState>,
    Path(partition_id): Path<String>,
) -> ApiResult<Json<Vec<Association>>> {
    Ok(Json(state.store.associations().by_partition(&partition_id)?))
}

async fn show(
    State(state): State<AppState>,
    Path((project_id, partition_id)): Path<(String, String)>,
) -> ApiResult<Json<Association>> {
    state
        .store
        .associations()
        .get(&project_id, &partition_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateAssociation>,
) -> ApiResult<impl IntoResponse> {
    let (Some(project_id), Some(partition_id)) =
        (present(body.project_id), present(body.partition_id))
    else {
        return Err(ApiError::bad_request(
            "Missing required fields: projectId, partitionId",
        ));
    };

    if state.store.projects().get(&project_id)?.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }
    if state.store.partitions().get(&partition_id)?.is_none() {
        return Err(ApiError::not_found("Partition not found"));
    }
    let associations = state.store.associations();
    if associations.get(&project_id, &partition_id)?.is_some() {
        return Err(ApiError::conflict(
            "Project-partition relationship already exists",
        ));
    }

    let association = associations
        .create(&NewAssociation {
            project_id,
            partition_id,
            is_featured: body.is_featured,
            sort_order: body.sort_order.unwrap_or(0),
        })
        .map_err(|e| {
            if e.is_constraint_violation() {
                ApiError::conflict("Project-partition relationship already exists")
            } else {
                e.into()
            }
        })?;
    Ok((StatusCode::CREATED, Json(association)))
}

async fn update(
    State(state): State<AppState>,
    Path((project_id, partition_id)): Path<(String, String)>,
    ApiJson(patch): ApiJson<AssociationPatch>,
) -> ApiResult<Json<Association>> {
    let associations = state.store.associations();
    if associations.get(&project_id, &partition_id)?.is_none() {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    let updated = associations
        .update(&project_id, &partition_id, patch)?
        .ok_or_else(|| ApiError::Internal("Failed to update project partition".into()))?;
    Ok(Json(updated))
}

async fn remove(
    State(state): State<AppState>,
    Path((project_id, partition_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if !state.store.associations().delete(&project_id, &partition_id)? {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    Ok(StatusCode::NO_CONTENT)
}
