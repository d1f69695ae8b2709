//! Per-endpoint, per-environment rate limit policies.

use crate::ratelimit::{ConfigError, EndpointClass, Environment, LimitConfig, SubjectType};

/// Limits applied to one endpoint class in one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub endpoint_class: EndpointClass,
    pub environment: Environment,
    /// Applied to every caller, keyed by client address
    pub ip_limit: LimitConfig,
    /// Applied only to authenticated callers, keyed by user id
    pub user_limit: LimitConfig,
}

impl RateLimitPolicy {
    /// Returns the limit for a subject dimension.
    pub const fn limit_for(&self, subject_type: SubjectType) -> LimitConfig {
        match subject_type {
            SubjectType::Ip => self.ip_limit,
            SubjectType::User => self.user_limit,
        }
    }

    /// Built-in limits. Development is generous so it never gets in the way;
    /// production keeps the per-address login ceiling low while authenticated
    /// callers, who already cleared one barrier, get more room.
    pub const fn default_for(endpoint_class: EndpointClass, environment: Environment) -> Self {
        let (ip_limit, user_limit) = match (environment, endpoint_class) {
            (Environment::Development, _) => (limit(100, 60), limit(200, 60)),
            (Environment::Staging, EndpointClass::AuthLogin) => (limit(20, 300), limit(50, 300)),
            (Environment::Staging, EndpointClass::AuthRefresh) => {
                (limit(60, 300), limit(120, 300))
            }
            (Environment::Staging, EndpointClass::Auth0Url) => (limit(30, 300), limit(60, 300)),
            (Environment::Production, EndpointClass::AuthLogin) => {
                (limit(10, 300), limit(50, 300))
            }
            (Environment::Production, EndpointClass::AuthRefresh) => {
                (limit(30, 300), limit(60, 300))
            }
            (Environment::Production, EndpointClass::Auth0Url) => {
                (limit(20, 300), limit(50, 300))
            }
        };
        Self {
            endpoint_class,
            environment,
            ip_limit,
            user_limit,
        }
    }
}

const fn limit(requests: u32, window_secs: u64) -> LimitConfig {
    LimitConfig {
        requests,
        window_secs,
    }
}

/// Built-in policy for every endpoint class and environment.
pub fn default_policies() -> Vec<RateLimitPolicy> {
    EndpointClass::ALL
        .iter()
        .flat_map(|&class| {
            Environment::ALL
                .iter()
                .map(move |&env| RateLimitPolicy::default_for(class, env))
        })
        .collect()
}

/// Immutable policy table, complete by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEngine {
    /// Indexed by `class.index() * Environment::ALL.len() + environment.index()`
    table: Vec<RateLimitPolicy>,
}

impl PolicyEngine {
    /// Validates and freezes a policy set.
    ///
    /// Every endpoint class needs exactly one policy per environment, and no
    /// limit or window may be zero.
    pub fn new(policies: impl IntoIterator<Item = RateLimitPolicy>) -> Result<Self, ConfigError> {
        let mut slots: [[Option<RateLimitPolicy>; 3]; 3] = [[None; 3]; 3];

        for policy in policies {
            let (class, env) = (policy.endpoint_class, policy.environment);
            if policy.ip_limit.is_zero() || policy.user_limit.is_zero() {
                return Err(ConfigError::ZeroLimit {
                    endpoint_class: class,
                    environment: env,
                });
            }
            let slot = &mut slots[class.index()][env.index()];
            if slot.is_some() {
                return Err(ConfigError::DuplicatePolicy {
                    endpoint_class: class,
                    environment: env,
                });
            }
            *slot = Some(policy);
        }

        let mut table = Vec::with_capacity(EndpointClass::ALL.len() * Environment::ALL.len());
        let mut missing = Vec::new();
        for class in EndpointClass::ALL {
            for env in Environment::ALL {
                match slots[class.index()][env.index()] {
                    Some(policy) => table.push(policy),
                    None => missing.push(format!("{class}/{env}")),
                }
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingPolicy(missing.join(", ")));
        }

        Ok(Self { table })
    }

    /// Engine holding the built-in policies.
    pub fn defaults() -> Self {
        Self {
            table: default_policies(),
        }
    }

    /// Looks up the policy for an endpoint class in an environment.
    pub fn resolve(&self, endpoint_class: EndpointClass, environment: Environment) -> &RateLimitPolicy {
        &self.table[endpoint_class.index() * Environment::ALL.len() + environment.index()]
    }

    pub fn policies(&self) -> &[RateLimitPolicy] {
        &self.table
    }
}
