//! `/api/ports` handlers.
//!
//! Every port in a response is annotated with its live listener status.

use super::partitions::present;
use super::{ApiError, ApiJson, ApiResult, AppState};
use crate::probe::{self, PortCheck};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use portfolio_core::patch::double_option;
use portfolio_core::{NewPort, Port, PortPatch, ServerType, validate_port_number};
use serde::{Deserialize, Serialize};

const NOT_FOUND: &str = "Port not found";
const INVALID_SERVER_TYPE: &str = "Invalid serverType. Must be frontend, backend, or api";
const INVALID_PORT_NUMBER: &str = "Port number must be between 1 and 65535";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/check/{port_number}", get(check))
        .route("/type/{server_type}", get(by_server_type))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// A reservation plus whether something is listening on it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortView {
    #[serde(flatten)]
    pub port: Port,
    pub in_use: bool,
    pub pid: Option<u32>,
}

async fn with_status(state: &AppState, port: Port) -> PortView {
    let status = probe::status_of(state.probe.as_ref(), port.port_number).await;
    PortView {
        port,
        in_use: status.in_use,
        pid: status.pid,
    }
}

async fn with_statuses(state: &AppState, ports: Vec<Port>) -> Vec<PortView> {
    let numbers: Vec<i64> = ports.iter().map(|p| p.port_number).collect();
    let statuses = probe::statuses(&state.probe, &numbers).await;
    ports
        .into_iter()
        .zip(statuses)
        .map(|(port, status)| PortView {
            port,
            in_use: status.in_use,
            pid: status.pid,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePort {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    port_number: Option<i64>,
    #[serde(default)]
    server_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePort {
    #[serde(default)]
    port_number: Option<i64>,
    #[serde(default)]
    server_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
}

fn parse_server_type(raw: &str) -> ApiResult<ServerType> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(INVALID_SERVER_TYPE))
}

fn check_port_number(n: i64) -> ApiResult<()> {
    if validate_port_number(n) {
        Ok(())
    } else {
        Err(ApiError::bad_request(INVALID_PORT_NUMBER))
    }
}

/// A non-blank port name must be the id of an existing project.
fn check_name(state: &AppState, name: Option<&str>) -> ApiResult<()> {
    let Some(name) = name else {
        return Ok(());
    };
    let trimmed = name.trim();
    if trimmed.is_empty() || state.store.projects().get(trimmed)?.is_some() {
        return Ok(());
    }
    Err(ApiError::bad_request(format!(
        "NAME must be an existing project ID. Project with ID \"{name}\" not found."
    )))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<PortView>>> {
    let ports = state.store.ports().list()?;
    Ok(Json(with_statuses(&state, ports).await))
}

async fn check(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<PortCheck>> {
    let port_number: i64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request(INVALID_PORT_NUMBER))?;
    check_port_number(port_number)?;
    Ok(Json(
        probe::check_port(&state.store, state.probe.as_ref(), port_number).await?,
    ))
}

async fn by_server_type(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Vec<PortView>>> {
    let server_type: ServerType = raw.parse().map_err(|_| {
        ApiError::bad_request("Invalid server type. Must be frontend, backend, or api")
    })?;
    let ports = state.store.ports().by_server_type(server_type)?;
    Ok(Json(with_statuses(&state, ports).await))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<PortView>> {
    let port = state
        .store
        .ports()
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(with_status(&state, port).await))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreatePort>,
) -> ApiResult<impl IntoResponse> {
    let (Some(id), Some(port_number), Some(server_type)) =
        (present(body.id), body.port_number, present(body.server_type))
    else {
        return Err(ApiError::bad_request(
            "Missing required fields: id, portNumber, serverType",
        ));
    };
    let server_type = parse_server_type(&server_type)?;
    check_port_number(port_number)?;

    let ports = state.store.ports();
    if ports.get(&id)?.is_some() {
        return Err(ApiError::conflict("Port with this id already exists"));
    }
    if ports.get_by_number(port_number)?.is_some() {
        return Err(ApiError::conflict("Port number already in use"));
    }
    check_name(&state, body.name.as_deref())?;

    let port = ports
        .create(&NewPort {
            id,
            port_number,
            server_type,
            name: body.name,
            description: body.description,
        })
        .map_err(|e| {
            if e.is_constraint_violation() {
                ApiError::conflict("Port number already in use")
            } else {
                e.into()
            }
        })?;
    tracing::info!(id = %port.id, port = port.port_number, "port reserved");
    Ok((StatusCode::CREATED, Json(with_status(&state, port).await)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdatePort>,
) -> ApiResult<Json<PortView>> {
    let ports = state.store.ports();
    if ports.get(&id)?.is_none() {
        return Err(ApiError::not_found(NOT_FOUND));
    }

    let server_type = body
        .server_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_server_type)
        .transpose()?;
    if let Some(port_number) = body.port_number {
        check_port_number(port_number)?;
        if let Some(existing) = ports.get_by_number(port_number)? {
            if existing.id != id {
                return Err(ApiError::conflict("Port number already in use"));
            }
        }
    }
    check_name(&state, body.name.as_ref().and_then(Option::as_deref))?;

    let patch = PortPatch {
        port_number: body.port_number,
        server_type,
        name: body.name,
        description: body.description,
    };
    let updated = ports
        .update(&id, patch)?
        .ok_or_else(|| ApiError::Internal("Failed to update port".into()))?;
    Ok(Json(with_status(&state, updated).await))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if !state.store.ports().delete(&id)? {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    tracing::info!(id = %id, "port released");
    Ok(StatusCode::NO_CONTENT)
}
