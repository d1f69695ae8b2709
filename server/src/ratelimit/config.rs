//! Rate limiting configuration.

use std::time::Duration;

use crate::ratelimit::constants::DEFAULT_STORE_TIMEOUT_MS;
use crate::ratelimit::{
    ConfigError, EndpointClass, Environment, PolicyEngine, RateLimitPolicy, SubjectType,
    TrustedProxyConfig,
};

/// Configuration for the rate limiting system.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Deployment environment, also the counter namespace
    pub environment: Environment,
    /// Upper bound on one counter store round trip
    pub store_timeout: Duration,
    /// Proxies allowed to set X-Forwarded-For
    pub trusted_proxies: TrustedProxyConfig,
    /// Per endpoint class and environment limits
    pub policies: PolicyEngine,
}

/// Configuration for a single rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests allowed in the window
    pub requests: u32,
    /// Window duration in seconds
    pub window_secs: u64,
}

impl LimitConfig {
    pub const fn is_zero(&self) -> bool {
        self.requests == 0 || self.window_secs == 0
    }
}

impl RateLimitConfig {
    /// Built-in configuration for an environment.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            enabled: true,
            environment,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            trusted_proxies: TrustedProxyConfig::default_for(environment),
            policies: PolicyEngine::defaults(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `APP_ENV`: `development`, `staging` or `production` (default: development)
    /// - `RATE_LIMIT_ENABLED`: Enable/disable rate limiting (default: true)
    /// - `RATE_LIMIT_STORE_TIMEOUT_MS`: Counter store timeout (default: 250)
    /// - `RATE_LIMIT_TRUSTED_PROXIES`: Comma-separated CIDRs or addresses
    ///   (default: loopback in development, none elsewhere)
    /// - `RATE_LIMIT_<CLASS>_<ENV>_IP`, `RATE_LIMIT_<CLASS>_<ENV>_USER`: limits as
    ///   "requests,window_secs", e.g. `RATE_LIMIT_AUTH_LOGIN_PRODUCTION_IP=10,300`
    ///
    /// Unlike most settings here, a malformed value is never replaced by its
    /// default: it aborts startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match var("APP_ENV") {
            Some(val) => val.parse()?,
            None => Environment::Development,
        };
        let mut config = Self::for_environment(environment);

        if let Some(val) = var("RATE_LIMIT_ENABLED") {
            config.enabled = parse_value("RATE_LIMIT_ENABLED", &val)?;
        }
        if let Some(val) = var("RATE_LIMIT_STORE_TIMEOUT_MS") {
            let millis: u64 = parse_value("RATE_LIMIT_STORE_TIMEOUT_MS", &val)?;
            if millis == 0 {
                return Err(invalid_value("RATE_LIMIT_STORE_TIMEOUT_MS", &val));
            }
            config.store_timeout = Duration::from_millis(millis);
        }
        if let Some(val) = var("RATE_LIMIT_TRUSTED_PROXIES") {
            config.trusted_proxies = TrustedProxyConfig::parse(&val)?;
        }
        config.trusted_proxies.audit(environment)?;

        let mut policies = Vec::with_capacity(config.policies.policies().len());
        for policy in config.policies.policies() {
            let mut policy = *policy;
            for subject in [SubjectType::Ip, SubjectType::User] {
                let name = limit_var_name(policy.endpoint_class, policy.environment, subject);
                if let Some(val) = var(&name) {
                    let limit = parse_limit_config(&val).ok_or_else(|| ConfigError::InvalidLimit {
                        var: name.clone(),
                        value: val.clone(),
                    })?;
                    match subject {
                        SubjectType::Ip => policy.ip_limit = limit,
                        SubjectType::User => policy.user_limit = limit,
                    }
                }
            }
            policies.push(policy);
        }
        config.policies = PolicyEngine::new(policies)?;

        Ok(config)
    }

    /// Policy for an endpoint class in the configured environment.
    pub fn policy(&self, endpoint_class: EndpointClass) -> &RateLimitPolicy {
        self.policies.resolve(endpoint_class, self.environment)
    }
}

/// Variable name overriding one limit, e.g. `RATE_LIMIT_AUTH_LOGIN_PRODUCTION_IP`.
pub fn limit_var_name(
    endpoint_class: EndpointClass,
    environment: Environment,
    subject: SubjectType,
) -> String {
    let suffix = match subject {
        SubjectType::Ip => "IP",
        SubjectType::User => "USER",
    };
    format!(
        "RATE_LIMIT_{}_{}_{suffix}",
        endpoint_class.env_fragment(),
        environment.env_fragment()
    )
}

fn parse_value<T: std::str::FromStr>(var: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse().map_err(|_| invalid_value(var, val))
}

fn invalid_value(var: &str, val: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: val.to_string(),
    }
}

/// Parses a limit config from "requests,window_secs" format.
fn parse_limit_config(val: &str) -> Option<LimitConfig> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() == 2 {
        let requests = parts[0].trim().parse().ok()?;
        let window_secs = parts[1].trim().parse().ok()?;
        Some(LimitConfig {
            requests,
            window_secs,
        })
    } else {
        None
    }
}
