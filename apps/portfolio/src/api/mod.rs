//! # HTTP API
//!
//! REST endpoints under `/api` plus the static `/screenshots` directory.
//!
//! ## Routes
//!
//! | Prefix | Module |
//! |---|---|
//! | `/api/partitions` | [`partitions`] |
//! | `/api/projects` | [`projects`] |
//! | `/api/project-partitions` | [`project_partitions`] |
//! | `/api/ports` | [`ports`] |
//! | `/api/traffic` | [`traffic`] |
//! | `/api/upload` | [`uploads`] |
//!
//! Handlers call the synchronous store directly; each call is a single short
//! SQLite statement.

pub mod error;
pub mod middleware;
pub mod partitions;
pub mod ports;
pub mod project_partitions;
pub mod projects;
pub mod traffic;
pub mod uploads;

pub use error::{ApiError, ApiJson, ApiResult};

use crate::probe::PortProbe;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use portfolio_core::Store;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Header carrying the port a request is attributed to.
pub const PORT_ID_HEADER: HeaderName = HeaderName::from_static("x-port-id");

/// Alternative to `Authorization: Bearer`.
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

// =============================================================================
// STATE
// =============================================================================

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub probe: Arc<dyn PortProbe>,
    public_dir: PathBuf,
    cors_origins: Vec<HeaderValue>,
    api_key: Option<Arc<str>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("public_dir", &self.public_dir)
            .field("cors_origins", &self.cors_origins)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(store: Store, probe: Arc<dyn PortProbe>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            probe,
            public_dir: public_dir.into(),
            cors_origins: Vec::new(),
            api_key: None,
            limiter: None,
        }
    }

    /// Allow cross-origin requests (with credentials) from `origins`.
    ///
    /// Origins that are not valid header values are skipped with a warning.
    #[must_use]
    pub fn with_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cors_origins = origins
            .into_iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.as_ref()) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = origin.as_ref(), "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        self
    }

    /// Require `key` on mutating requests.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    /// Limit the whole API to `per_second` requests per second.
    #[must_use]
    pub fn with_rate_limit(mut self, per_second: Option<NonZeroU32>) -> Self {
        self.limiter =
            per_second.map(|n| Arc::new(RateLimiter::direct(Quota::per_second(n))));
        self
    }

    /// Root of the static files served to the frontend.
    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Where uploaded screenshots live.
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.public_dir.join("screenshots")
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub(crate) fn limiter(&self) -> Option<&DefaultDirectRateLimiter> {
        self.limiter.as_deref()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.cors_origins.clone()))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            API_KEY_HEADER,
            PORT_ID_HEADER,
        ]);

    let api = Router::new()
        .nest("/partitions", partitions::router())
        .nest("/projects", projects::router())
        .nest("/project-partitions", project_partitions::router())
        .nest("/ports", ports::router())
        .nest("/traffic", traffic::router())
        .nest("/upload", uploads::router());

    Router::new()
        .nest("/api", api)
        .nest_service("/screenshots", ServeDir::new(state.screenshots_dir()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
                .layer(from_fn_with_state(state.clone(), middleware::require_api_key))
                .layer(from_fn_with_state(state.clone(), middleware::track_transfer)),
        )
        .with_state(state)
}
