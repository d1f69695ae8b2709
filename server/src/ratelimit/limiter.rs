//! Admission checks combining identity, keys, policies and the counter store.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::ratelimit::constants::LOG_SUBJECT_HASH_LEN;
use crate::ratelimit::{
    build_keys, resolve_client_identity, AdmissionOutcome, ClientIdentity, CounterState,
    CounterStore, EndpointClass, Environment, RateLimitConfig, RateLimitDecision, RateLimitKey,
    StoreUnavailable, SubjectType,
};

/// What the HTTP layer knows about a request before the handler runs.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    /// Connection-level peer address
    pub socket_peer: IpAddr,
    pub headers: &'a HeaderMap,
    pub endpoint_class: EndpointClass,
    /// Set when upstream token parsing identified the caller
    pub authenticated_user_id: Option<&'a str>,
}

/// Rate limiter shared by all request tasks.
///
/// Holds the immutable configuration and a handle to the shared counter
/// store; cloning is cheap.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: Arc<RateLimitConfig>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Returns the configuration for this rate limiter.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Resolves the client identity using the configured trusted proxies.
    pub fn resolve_identity(&self, socket_peer: IpAddr, headers: &HeaderMap) -> ClientIdentity {
        resolve_client_identity(socket_peer, headers, &self.config.trusted_proxies)
    }

    /// Runs the full admission check for a request in the configured environment.
    ///
    /// `Err(StoreUnavailable)` means the request must be refused: there is no
    /// path from a store failure to an allowed request.
    pub async fn check_request(
        &self,
        request: &AdmissionRequest<'_>,
    ) -> Result<RateLimitDecision, StoreUnavailable> {
        let identity = self.resolve_identity(request.socket_peer, request.headers);
        self.check(
            &identity,
            request.endpoint_class,
            self.config.environment,
            request.authenticated_user_id,
        )
        .await
    }

    /// Counts the request against its IP key and, when authenticated, its
    /// user key. Denies if either is over its limit.
    ///
    /// Both counters are incremented even when the first one is already
    /// exceeded. The namespace is always the configured environment.
    #[tracing::instrument(skip_all, fields(endpoint_class = %endpoint_class, environment = %environment))]
    async fn check(
        &self,
        identity: &ClientIdentity,
        endpoint_class: EndpointClass,
        environment: Environment,
        authenticated_user_id: Option<&str>,
    ) -> Result<RateLimitDecision, StoreUnavailable> {
        // Skip rate limiting if disabled
        if !self.config.enabled {
            debug!("Rate limiting disabled, allowing request");
            return Ok(RateLimitDecision::Allowed);
        }

        let policy = self.config.policies.resolve(endpoint_class, environment);
        let keys = build_keys(identity, endpoint_class, environment, authenticated_user_id);

        let states = join_all(keys.iter().map(|key| {
            self.store
                .increment_and_check(key, policy.limit_for(key.subject_type()))
        }))
        .await;

        let result = combine(&keys, states);
        log_decision(
            identity,
            endpoint_class,
            environment,
            authenticated_user_id,
            &result,
        );
        result
    }

    /// Probes the counter store.
    pub async fn store_health(&self) -> Result<(), StoreUnavailable> {
        self.store.ping().await
    }
}

/// Folds per-key counter states into one decision.
///
/// Any store failure wins. Among exceeded keys the one with the longest
/// remaining window sets `Retry-After`.
fn combine(
    keys: &[RateLimitKey],
    states: Vec<Result<CounterState, StoreUnavailable>>,
) -> Result<RateLimitDecision, StoreUnavailable> {
    let mut decision = RateLimitDecision::Allowed;

    for (key, state) in keys.iter().zip(states) {
        let state = state?;
        if !state.exceeded {
            continue;
        }
        // A window can report 0s left in its last instant; never send Retry-After: 0.
        let retry_after_seconds = state.ttl_remaining.max(1);
        if retry_after_seconds > decision.retry_after_seconds() {
            decision = RateLimitDecision::Denied {
                retry_after_seconds,
                limiting_subject: key.subject_type(),
            };
        }
    }

    Ok(decision)
}

/// Emits the structured record for one decision.
fn log_decision(
    identity: &ClientIdentity,
    endpoint_class: EndpointClass,
    environment: Environment,
    authenticated_user_id: Option<&str>,
    result: &Result<RateLimitDecision, StoreUnavailable>,
) {
    let ip_subject = hash_subject(&identity.ip.to_string());
    let user_subject = authenticated_user_id.map_or_else(|| "-".to_string(), hash_subject);
    let trust_level = identity.trust_level.as_str();
    let scopes = evaluated_scopes(authenticated_user_id);

    match result {
        Ok(RateLimitDecision::Allowed) => info!(
            outcome = AdmissionOutcome::Allowed.as_str(),
            endpoint_class = %endpoint_class,
            environment = %environment,
            subject_type = scopes,
            ip_subject = %ip_subject,
            user_subject = %user_subject,
            trust_level,
            "Rate limit check passed"
        ),
        Ok(decision @ RateLimitDecision::Denied { .. }) => warn!(
            outcome = AdmissionOutcome::DeniedQuota.as_str(),
            endpoint_class = %endpoint_class,
            environment = %environment,
            subject_type = decision.limiting_subject().as_str(),
            ip_subject = %ip_subject,
            user_subject = %user_subject,
            trust_level,
            retry_after = decision.retry_after_seconds(),
            "Rate limit exceeded"
        ),
        Err(e) => error!(
            outcome = AdmissionOutcome::DeniedStoreUnavailable.as_str(),
            endpoint_class = %endpoint_class,
            environment = %environment,
            subject_type = scopes,
            ip_subject = %ip_subject,
            user_subject = %user_subject,
            trust_level,
            error = %e,
            "Counter store unavailable, refusing request"
        ),
    }
}

/// Subject types counted for a request, for records with no single
/// limiting subject.
const fn evaluated_scopes(authenticated_user_id: Option<&str>) -> &'static str {
    if authenticated_user_id.is_some() {
        "ip+user"
    } else {
        SubjectType::Ip.as_str()
    }
}

/// Truncated SHA-256 of a subject id, safe to put in logs.
pub fn hash_subject(subject_id: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(subject_id.as_bytes()));
    digest.truncate(LOG_SUBJECT_HASH_LEN);
    digest
}
