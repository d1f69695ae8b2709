//! Rate limiting types.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ratelimit::ConfigError;

/// Authentication endpoint classes with their own quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// Username/password login
    AuthLogin,
    /// Access token refresh
    AuthRefresh,
    /// Auth0 authorization URL issuance
    Auth0Url,
}

impl EndpointClass {
    /// Every protected class. Each one needs a policy per environment.
    pub const ALL: [Self; 3] = [Self::AuthLogin, Self::AuthRefresh, Self::Auth0Url];

    /// Returns the string identifier for this class (used in counter keys).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthLogin => "auth-login",
            Self::AuthRefresh => "auth-refresh",
            Self::Auth0Url => "auth0-url",
        }
    }

    /// Environment variable fragment, e.g. `AUTH_LOGIN` in `RATE_LIMIT_AUTH_LOGIN_PRODUCTION_IP`.
    pub const fn env_fragment(self) -> &'static str {
        match self {
            Self::AuthLogin => "AUTH_LOGIN",
            Self::AuthRefresh => "AUTH_REFRESH",
            Self::Auth0Url => "AUTH0_URL",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::AuthLogin => 0,
            Self::AuthRefresh => 1,
            Self::Auth0Url => 2,
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment environment. Doubles as the counter key namespace so that
/// environments sharing one Redis never share counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Self; 3] = [Self::Development, Self::Staging, Self::Production];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub const fn env_fragment(self) -> &'static str {
        match self {
            Self::Development => "DEVELOPMENT",
            Self::Staging => "STAGING",
            Self::Production => "PRODUCTION",
        }
    }

    /// Staging and production get the strict configuration checks.
    pub const fn is_hardened(self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Development => 0,
            Self::Staging => 1,
            Self::Production => 2,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// How the client address of a request was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    /// The socket peer address, used as-is.
    Direct,
    /// Taken from a forwarded-for header sent by a trusted proxy (or the
    /// proxy's own address when it sent none).
    TrustedProxy,
}

impl TrustLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::TrustedProxy => "trusted_proxy",
        }
    }
}

/// Resolved network identity of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: IpAddr,
    pub trust_level: TrustLevel,
}

/// Dimension a counter is kept for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectType {
    Ip,
    User,
}

impl SubjectType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::User => "user",
        }
    }
}

/// Which dimension caused a denial. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitingSubject {
    None,
    Ip,
    User,
}

impl LimitingSubject {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ip => "ip",
            Self::User => "user",
        }
    }
}

impl From<SubjectType> for LimitingSubject {
    fn from(subject: SubjectType) -> Self {
        match subject {
            SubjectType::Ip => Self::Ip,
            SubjectType::User => Self::User,
        }
    }
}

/// Result of an admission check against the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Every applicable counter is within its limit.
    Allowed,
    /// At least one counter exceeded its limit.
    Denied {
        /// Seconds until the most restrictive exceeded window resets
        retry_after_seconds: u64,
        /// Dimension of that window
        limiting_subject: SubjectType,
    },
}

impl RateLimitDecision {
    pub const fn allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Seconds to wait before retrying (0 if allowed).
    pub const fn retry_after_seconds(&self) -> u64 {
        match self {
            Self::Allowed => 0,
            Self::Denied {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
        }
    }

    pub fn limiting_subject(&self) -> LimitingSubject {
        match self {
            Self::Allowed => LimitingSubject::None,
            Self::Denied {
                limiting_subject, ..
            } => (*limiting_subject).into(),
        }
    }
}

/// Terminal outcome of one admission check, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Allowed,
    DeniedQuota,
    DeniedStoreUnavailable,
}

impl AdmissionOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::DeniedQuota => "denied_quota",
            Self::DeniedStoreUnavailable => "denied_store_unavailable",
        }
    }
}
