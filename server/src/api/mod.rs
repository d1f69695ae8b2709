//! API Router and Application State
//!
//! Central routing configuration and shared state.

mod handlers;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    auth::identify_user,
    config::Config,
    ratelimit::{rate_limit, with_endpoint_class, EndpointClass, RateLimiter},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Rate limiter for the authentication endpoints
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(config: Config, rate_limiter: RateLimiter) -> Self {
        Self {
            config: Arc::new(config),
            rate_limiter,
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_router(state.clone()))
        // Middleware
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        // State
        .with_state(state)
}

/// Authentication routes, each behind its own endpoint class.
///
/// `identify_user` wraps every route so the limiter sees the caller before
/// the per-route `rate_limit` runs.
fn auth_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(limited(
            &state,
            "/login",
            post(handlers::login),
            EndpointClass::AuthLogin,
        ))
        .merge(limited(
            &state,
            "/refresh",
            post(handlers::refresh),
            EndpointClass::AuthRefresh,
        ))
        .merge(limited(
            &state,
            "/auth0/url",
            get(handlers::auth0_url),
            EndpointClass::Auth0Url,
        ))
        .layer(from_fn_with_state(state, identify_user))
}

fn limited(
    state: &AppState,
    path: &str,
    handler: MethodRouter<AppState>,
    endpoint_class: EndpointClass,
) -> Router<AppState> {
    Router::new()
        .route(path, handler)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn(with_endpoint_class(endpoint_class)))
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Health check endpoint.
///
/// Reports `503` while the counter store is unreachable, since every
/// rate-limited route is refusing requests at that point.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.rate_limiter.store_health().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            warn!(error = %e, "Health check failed: counter store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded" }),
            )
        }
    }
}
