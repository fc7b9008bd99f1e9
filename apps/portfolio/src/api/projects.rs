//! `/api/projects` handlers.

use super::partitions::present;
use super::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use portfolio_core::{Association, NewProject, Partition, Project, ProjectPatch};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{key}", get(detail).put(update).delete(remove))
}

/// A project with the partitions it belongs to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub partitions: Vec<Partition>,
    pub project_partitions: Vec<Association>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    long_description: Option<String>,
    #[serde(default)]
    primary_repo_url: Option<String>,
    #[serde(default)]
    live_url: Option<String>,
    #[serde(default)]
    github_repo_full_name: Option<String>,
    #[serde(default)]
    logo_url: Option<String>,
    #[serde(default)]
    in_portfolio: Option<bool>,
    #[serde(default)]
    nsfw: Option<bool>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.store.projects().list()?))
}

async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = state
        .store
        .projects()
        .get_by_slug(&slug)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    let project_partitions = state.store.associations().by_project(&project.id)?;
    let mut partitions = Vec::with_capacity(project_partitions.len());
    for link in &project_partitions {
        if let Some(partition) = state.store.partitions().get(&link.partition_id)? {
            partitions.push(partition);
        }
    }

    Ok(Json(ProjectDetail {
        project,
        partitions,
        project_partitions,
    }))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateProject>,
) -> ApiResult<impl IntoResponse> {
    let (Some(id), Some(slug), Some(name), Some(status)) = (
        present(body.id),
        present(body.slug),
        present(body.name),
        present(body.status),
    ) else {
        return Err(ApiError::bad_request(
            "Missing required fields: id, slug, name, status",
        ));
    };

    let projects = state.store.projects();
    if projects.get(&id)?.is_some() {
        return Err(ApiError::conflict("Project with this id already exists"));
    }
    if projects.get_by_slug(&slug)?.is_some() {
        return Err(ApiError::conflict("Project with this slug already exists"));
    }

    let project = projects
        .create(&NewProject {
            id,
            slug,
            name,
            status,
            tagline: body.tagline,
            short_description: body.short_description,
            long_description: body.long_description,
            primary_repo_url: body.primary_repo_url,
            live_url: body.live_url,
            github_repo_full_name: body.github_repo_full_name,
            logo_url: body.logo_url,
            in_portfolio: body.in_portfolio,
            nsfw: body.nsfw,
            created_at: None,
            updated_at: None,
        })
        .map_err(|e| {
            if e.is_constraint_violation() {
                ApiError::conflict("Project already exists")
            } else {
                e.into()
            }
        })?;
    tracing::info!(id = %project.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    let projects = state.store.projects();
    if projects.get(&id)?.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }
    let updated = projects
        .update(&id, patch)?
        .ok_or_else(|| ApiError::Internal("Failed to update project".into()))?;
    Ok(Json(updated))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if state.store.projects().get(&id)?.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }
    state.store.associations().delete_by_project(&id)?;
    if !state.store.projects().delete(&id)? {
        return Err(ApiError::Internal("Failed to delete project".into()));
    }
    tracing::info!(id = %id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}
