//! JWT Validation
//!
//! Access tokens are HS256-signed by the identity service; only the subject
//! and expiry matter here.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::error::{AuthError, AuthResult};

/// JWT claims read from access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// Validate and decode an access token.
pub fn validate_access_token(token: &str, secret: &str) -> AuthResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp: u64, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_access_token() {
        let claims =
            validate_access_token(&token("user-7", get_current_timestamp() + 600, SECRET), SECRET)
                .unwrap();
        assert_eq!(claims.sub, "user-7");
    }

    #[test]
    fn test_expired_token() {
        let result =
            validate_access_token(&token("user-7", get_current_timestamp() - 600, SECRET), SECRET);
        assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_wrong_secret() {
        let result = validate_access_token(
            &token("user-7", get_current_timestamp() + 600, "other-secret"),
            SECRET,
        );
        assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_empty_subject() {
        let result =
            validate_access_token(&token("  ", get_current_timestamp() + 600, SECRET), SECRET);
        assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_garbage_token() {
        assert_eq!(
            validate_access_token("not.a.jwt", SECRET).unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
