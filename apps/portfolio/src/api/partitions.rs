//! `/api/partitions` handlers.

use super::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use portfolio_core::{Association, NewPartition, Partition, PartitionPatch, Project};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{key}", get(detail).put(update).delete(remove))
}

/// A partition with its projects in association order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionDetail {
    #[serde(flatten)]
    pub partition: Partition,
    pub projects: Vec<Project>,
    pub project_partitions: Vec<Association>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartition {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
}

/// Treat an empty string like a missing field.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Partition>>> {
    Ok(Json(state.store.partitions().list()?))
}

async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PartitionDetail>> {
    let partition = state
        .store
        .partitions()
        .get_by_slug(&slug)?
        .ok_or_else(|| ApiError::not_found("Partition not found"))?;

    let project_partitions = state.store.associations().by_partition(&partition.id)?;
    let mut projects = Vec::with_capacity(project_partitions.len());
    for link in &project_partitions {
        if let Some(project) = state.store.projects().get(&link.project_id)? {
            projects.push(project);
        }
    }

    Ok(Json(PartitionDetail {
        partition,
        projects,
        project_partitions,
    }))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreatePartition>,
) -> ApiResult<impl IntoResponse> {
    let (Some(id), Some(slug), Some(name)) =
        (present(body.id), present(body.slug), present(body.name))
    else {
        return Err(ApiError::bad_request("Missing required fields: id, slug, name"));
    };

    let partitions = state.store.partitions();
    if partitions.get(&id)?.is_some() {
        return Err(ApiError::conflict("Partition with this id already exists"));
    }
    if partitions.get_by_slug(&slug)?.is_some() {
        return Err(ApiError::conflict("Partition with this slug already exists"));
    }

    let partition = partitions
        .create(&NewPartition {
            id,
            slug,
            name,
            description: body.description,
            sort_order: body.sort_order.unwrap_or(0),
        })
        .map_err(|e| {
            if e.is_constraint_violation() {
                ApiError::conflict("Partition already exists")
            } else {
                e.into()
            }
        })?;
    tracing::info!(id = %partition.id, "partition created");
    Ok((StatusCode::CREATED, Json(partition)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PartitionPatch>,
) -> ApiResult<Json<Partition>> {
    let partitions = state.store.partitions();
    if partitions.get(&id)?.is_none() {
        return Err(ApiError::not_found("Partition not found"));
    }
    let updated = partitions
        .update(&id, patch)?
        .ok_or_else(|| ApiError::Internal("Failed to update partition".into()))?;
    Ok(Json(updated))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if state.store.partitions().get(&id)?.is_none() {
        return Err(ApiError::not_found("Partition not found"));
    }
    state.store.associations().delete_by_partition(&id)?;
    if !state.store.partitions().delete(&id)? {
        return Err(ApiError::Internal("Failed to delete partition".into()));
    }
    tracing::info!(id = %id, "partition deleted");
    Ok(StatusCode::NO_CONTENT)
}
