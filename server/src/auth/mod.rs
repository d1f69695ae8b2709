//! Caller Identification
//!
//! Turns a bearer token into an [`AuthenticatedUser`] request extension so
//! the rate limiter can apply per-user quotas. Nothing is enforced here.

mod error;
pub mod jwt;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::AppState;

pub use error::{AuthError, AuthResult};

/// Caller identified from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// User ID (token subject).
    pub id: String,
}

/// Middleware inserting `AuthenticatedUser` when the request carries a valid
/// access token.
///
/// Requests without a token, or with an unusable one, continue anonymously
/// and are limited per address only. Without a configured `JWT_SECRET` no
/// request is ever identified.
pub async fn identify_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(secret) = state.config.jwt_secret.as_deref() {
        match authenticated_user(request.headers(), secret) {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(AuthError::MissingAuthHeader) => {}
            Err(e) => debug!(error = %e, "Ignoring unusable bearer token"),
        }
    }

    next.run(request).await
}

/// Extracts and validates the bearer token of a request.
pub fn authenticated_user(headers: &HeaderMap, secret: &str) -> AuthResult<AuthenticatedUser> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = jwt::validate_access_token(token.trim(), secret)?;
    Ok(AuthenticatedUser { id: claims.sub })
}
