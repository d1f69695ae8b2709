//! Authentication Error Types

use thiserror::Error;

/// Reasons a request carries no usable caller identity.
///
/// These never reach the client from here: identification is best effort and
/// authorization is enforced by the handlers behind the rate limiter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing Authorization header.
    #[error("Missing authorization header")]
    MissingAuthHeader,

    /// Invalid authorization header format.
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// Invalid token.
    #[error("Invalid token")]
    InvalidToken,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
