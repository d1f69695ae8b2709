//! Placeholder authentication handlers.
//!
//! Credential checks, token minting and the Auth0 flow live elsewhere; these
//! stand in so the rate-limited routes have something to admit requests to.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub endpoint: &'static str,
}

fn accepted(endpoint: &'static str) -> (StatusCode, Json<AcceptedResponse>) {
    (
        StatusCode::OK,
        Json(AcceptedResponse {
            status: "accepted",
            endpoint,
        }),
    )
}

/// POST /auth/login
pub async fn login() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("login")
}

/// POST /auth/refresh
pub async fn refresh() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("refresh")
}

/// GET /auth/auth0/url
pub async fn auth0_url() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("auth0-url")
}
