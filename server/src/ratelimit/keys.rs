//! Counter key construction.

use std::fmt;

use crate::ratelimit::constants::REDIS_KEY_CAPACITY;
use crate::ratelimit::{ClientIdentity, EndpointClass, Environment, SubjectType};

/// Namespaced counter key: `namespace:subject_type:subject_id:endpoint_class`.
///
/// Carries no time component; windows are expressed through the key's TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    namespace: Environment,
    subject_type: SubjectType,
    subject_id: String,
    endpoint_class: EndpointClass,
}

impl RateLimitKey {
    pub fn new(
        namespace: Environment,
        subject_type: SubjectType,
        subject_id: impl Into<String>,
        endpoint_class: EndpointClass,
    ) -> Self {
        Self {
            namespace,
            subject_type,
            subject_id: subject_id.into(),
            endpoint_class,
        }
    }

    pub const fn namespace(&self) -> Environment {
        self.namespace
    }

    pub const fn subject_type(&self) -> SubjectType {
        self.subject_type
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub const fn endpoint_class(&self) -> EndpointClass {
        self.endpoint_class
    }

    /// Renders the key as stored in Redis.
    pub fn render(&self) -> String {
        let mut key = String::with_capacity(REDIS_KEY_CAPACITY);
        key.push_str(self.namespace.as_str());
        key.push(':');
        key.push_str(self.subject_type.as_str());
        key.push(':');
        key.push_str(&self.subject_id);
        key.push(':');
        key.push_str(self.endpoint_class.as_str());
        key
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds the counter keys for one request.
///
/// Always returns the IP-scoped key first; a user-scoped key follows when the
/// caller is authenticated, so stolen credentials stay throttled per account
/// no matter how many addresses they are used from.
pub fn build_keys(
    identity: &ClientIdentity,
    endpoint_class: EndpointClass,
    environment: Environment,
    authenticated_user_id: Option<&str>,
) -> Vec<RateLimitKey> {
    let mut keys = Vec::with_capacity(2);
    keys.push(RateLimitKey::new(
        environment,
        SubjectType::Ip,
        identity.ip.to_string(),
        endpoint_class,
    ));
    if let Some(user_id) = authenticated_user_id {
        keys.push(RateLimitKey::new(
            environment,
            SubjectType::User,
            user_id,
            endpoint_class,
        ));
    }
    keys
}
