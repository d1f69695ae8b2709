//! Rate limiting error types.

use std::time::Duration;

use axum::http::header::{HeaderValue, RETRY_AFTER};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ratelimit::{EndpointClass, Environment};

/// Startup configuration errors. Any of these must stop the process before it
/// accepts traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown environment '{0}' (expected development, staging or production)")]
    UnknownEnvironment(String),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },

    #[error("Invalid limit for {var}: '{value}' (expected \"requests,window_secs\")")]
    InvalidLimit { var: String, value: String },

    #[error("Invalid trusted proxy entry '{0}' (expected CIDR or IP address)")]
    InvalidTrustedProxy(String),

    #[error("Trusted proxy range {cidr} trusts every address, refusing it in {environment}")]
    PermissiveTrustedProxy {
        cidr: String,
        environment: Environment,
    },

    #[error("Missing rate limit policy for: {0}")]
    MissingPolicy(String),

    #[error("Duplicate rate limit policy for {endpoint_class}/{environment}")]
    DuplicatePolicy {
        endpoint_class: EndpointClass,
        environment: Environment,
    },

    #[error("Rate limit policy for {endpoint_class}/{environment} has a zero limit or window")]
    ZeroLimit {
        endpoint_class: EndpointClass,
        environment: Environment,
    },
}

/// The counter store could not produce a count.
///
/// Callers must deny the request when they see this; there is no default
/// count to fall back to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreUnavailable {
    #[error("Counter store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Counter store error: {0}")]
    Backend(String),

    #[error("Malformed counter store reply: {0}")]
    MalformedReply(String),
}

/// Errors returned by the admission middleware.
#[derive(Debug)]
pub enum RateLimitError {
    /// Counter store is unavailable (fail-closed).
    StoreUnavailable,
    /// Request exceeded the rate limit.
    LimitExceeded { retry_after: u64 },
    /// The route was wired without the inputs the middleware needs.
    Misconfigured(&'static str),
}

/// JSON response body for rate limit errors.
#[derive(Serialize)]
pub struct RateLimitErrorResponse {
    /// Error code identifier.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: &'static str,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            Self::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(RateLimitErrorResponse {
                    error: "service_unavailable",
                    message: "Service temporarily unavailable. Try again shortly.",
                }),
            )
                .into_response(),
            Self::LimitExceeded { retry_after } => {
                let body = RateLimitErrorResponse {
                    error: "rate_limited",
                    message: "Too many requests. Try again later.",
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            Self::Misconfigured(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RateLimitErrorResponse {
                    error: "internal_error",
                    message: "Internal server error.",
                }),
            )
                .into_response(),
        }
    }
}
