//! Request middleware: rate limiting, API-key checks and transfer tracking.

use super::{API_KEY_HEADER, ApiError, AppState, PORT_ID_HEADER};
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use std::time::Instant;
use subtle::ConstantTimeEq;

/// Reject requests once the global quota for this second is spent.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = state.limiter() {
        if limiter.check().is_err() {
            tracing::debug!(path = %request.uri().path(), "rate limit exceeded");
            return ApiError::RateLimited.into_response();
        }
    }
    next.run(request).await
}

// =============================================================================
// API KEY
// =============================================================================

/// Whether a request changes state and therefore needs the key.
///
/// Click logging stays open so the public site can report clicks.
fn needs_key(method: &Method, path: &str) -> bool {
    let mutating = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    mutating && !(*method == Method::POST && path == "/api/traffic/click")
}

/// The key presented via `Authorization: Bearer` or `X-API-Key`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
}

fn keys_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// When an API key is configured, require it on mutating requests.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.api_key() {
        if needs_key(request.method(), request.uri().path()) {
            let authorized = presented_key(request.headers())
                .is_some_and(|presented| keys_match(expected, presented));
            if !authorized {
                tracing::warn!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    "rejected request without valid API key"
                );
                return ApiError::Unauthorized.into_response();
            }
        }
    }
    next.run(request).await
}

// =============================================================================
// TRANSFER TRACKING
// =============================================================================

/// Whether responses to `path` count as data transfer.
fn is_tracked(method: &Method, path: &str) -> bool {
    *method != Method::OPTIONS && path.starts_with("/api/") && !path.starts_with("/api/traffic")
}

/// Record successful, non-empty API responses as `data_transfer` events.
///
/// The port comes from the `X-Port-Id` header. Recording failures are logged
/// and never change the response.
pub async fn track_transfer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    if !is_tracked(&method, &path) {
        return next.run(request).await;
    }

    let port_id = request
        .headers()
        .get(PORT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "failed to buffer response body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    if !bytes.is_empty() {
        let mut metadata = Map::new();
        metadata.insert("method".into(), Value::from(method.as_str()));
        metadata.insert("path".into(), Value::from(path.as_str()));
        metadata.insert("statusCode".into(), Value::from(status.as_u16()));
        metadata.insert(
            "contentType".into(),
            parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map_or(Value::Null, Value::from),
        );
        metadata.insert(
            "duration".into(),
            Value::from(started.elapsed().as_millis() as u64),
        );

        if let Err(e) = state.store.traffic().record_transfer(
            port_id.as_deref(),
            bytes.len() as u64,
            Some(metadata),
        ) {
            tracing::warn!(error = %e, path = %path, "failed to record data transfer");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
