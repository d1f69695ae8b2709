//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

/// Server configuration loaded from environment variables.
///
/// Rate limiting has its own loader, [`crate::ratelimit::RateLimitConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: SocketAddr,

    /// Redis connection URL for the shared counters
    pub redis_url: String,

    /// HS256 secret for access tokens (optional; without it no caller is
    /// identified and only per-address limits apply)
    pub jwt_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into());

        Ok(Self {
            bind_address: bind_address
                .parse()
                .with_context(|| format!("BIND_ADDRESS is not a socket address: {bind_address}"))?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses a Docker test container:
    /// - Redis: `docker run -d --name authgate-test-redis -p 6380:6379 redis:7`
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            redis_url: "redis://localhost:6380".into(),
            jwt_secret: Some("test-secret".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        temp_env::with_vars_unset(["BIND_ADDRESS", "REDIS_URL", "JWT_SECRET"], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_address, SocketAddr::from(([0, 0, 0, 0], 8080)));
            assert_eq!(config.redis_url, "redis://localhost:6379");
            assert!(config.jwt_secret.is_none());
        });
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_bind_address() {
        temp_env::with_var("BIND_ADDRESS", Some("not-an-address"), || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_empty_jwt_secret_is_ignored() {
        temp_env::with_vars(
            [("JWT_SECRET", Some("")), ("BIND_ADDRESS", None::<&str>)],
            || {
                assert!(Config::from_env().unwrap().jwt_secret.is_none());
            },
        );
    }
}
