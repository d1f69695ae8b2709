//! Axum middleware for rate limiting.
//!
//! Runs after `identify_user` (so the authenticated user, if any, is known)
//! and before the protected handler.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::error;

use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::ratelimit::{AdmissionRequest, EndpointClass, RateLimitDecision, RateLimitError};

/// Middleware enforcing the per-IP and per-user limits of an endpoint class.
///
/// # Usage
///
/// ```ignore
/// use axum::middleware::{from_fn, from_fn_with_state};
///
/// Router::new()
///     .route("/login", post(login_handler))
///     .layer(from_fn_with_state(state.clone(), rate_limit))
///     .layer(from_fn(with_endpoint_class(EndpointClass::AuthLogin)))
/// ```
///
/// # Behavior
///
/// - Limit exceeded: `429 Too Many Requests` with `Retry-After`.
/// - Counter store unavailable: `503 Service Unavailable`, no `Retry-After`.
/// - Route wired without an endpoint class, or server started without
///   connect info: `500`, never a pass-through.
#[tracing::instrument(skip_all)]
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let Some(endpoint_class) = request.extensions().get::<EndpointClass>().copied() else {
        error!("Rate limited route has no endpoint class");
        return Err(RateLimitError::Misconfigured("missing endpoint class"));
    };

    let Some(socket_peer) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
    else {
        error!("No peer address on request; serve with connect info");
        return Err(RateLimitError::Misconfigured("missing peer address"));
    };

    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.id.clone());

    let admission = AdmissionRequest {
        socket_peer,
        headers: request.headers(),
        endpoint_class,
        authenticated_user_id: user_id.as_deref(),
    };

    let decision = state
        .rate_limiter
        .check_request(&admission)
        .await
        .map_err(|_| RateLimitError::StoreUnavailable)?;

    match decision {
        RateLimitDecision::Allowed => Ok(next.run(request).await),
        RateLimitDecision::Denied {
            retry_after_seconds,
            ..
        } => Err(RateLimitError::LimitExceeded {
            retry_after: retry_after_seconds,
        }),
    }
}

/// Sets the endpoint class for the downstream `rate_limit` middleware.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .route("/refresh", post(refresh_handler))
///     .layer(from_fn_with_state(state.clone(), rate_limit))
///     .layer(from_fn(with_endpoint_class(EndpointClass::AuthRefresh)));
/// ```
pub fn with_endpoint_class(
    endpoint_class: EndpointClass,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send
       + 'static {
    move |mut request: Request, next: Next| {
        request.extensions_mut().insert(endpoint_class);
        Box::pin(async move { next.run(request).await })
    }
}
