//! Reusable test helpers for admission and HTTP tests.
//!
//! Provides `TestApp` for sending requests through the full axum router with
//! a chosen peer address, plus counter stores and token helpers.
//!
//! Requests go through `tower::ServiceExt::oneshot`; counters live in the
//! shared store, so state persists across calls on the same `TestApp`.
#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use authgate_server::api::{create_router, AppState};
use authgate_server::auth::jwt::Claims;
use authgate_server::config::Config;
use authgate_server::ratelimit::{
    default_policies, CounterState, CounterStore, Environment, LimitConfig, PolicyEngine,
    RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimiter, StoreUnavailable,
    TrustedProxyConfig,
};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use tower::ServiceExt;

// ============================================================================
// Counter stores
// ============================================================================

/// Store whose every call fails, as when Redis is down.
#[derive(Debug, Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment_and_check(
        &self,
        _key: &RateLimitKey,
        _limit: LimitConfig,
    ) -> Result<CounterState, StoreUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreUnavailable::Backend("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreUnavailable> {
        Err(StoreUnavailable::Backend("connection refused".into()))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Rate limit config for `environment` with the policies edited by `adjust`.
pub fn rate_limit_config(
    environment: Environment,
    adjust: impl FnMut(&mut RateLimitPolicy),
) -> RateLimitConfig {
    let mut policies = default_policies();
    policies.iter_mut().for_each(adjust);

    RateLimitConfig {
        policies: PolicyEngine::new(policies).expect("adjusted policies must stay valid"),
        ..RateLimitConfig::for_environment(environment)
    }
}

/// Same as [`rate_limit_config`] with an explicit trusted proxy list.
pub fn rate_limit_config_with_proxies(
    environment: Environment,
    proxies: &str,
    adjust: impl FnMut(&mut RateLimitPolicy),
) -> RateLimitConfig {
    RateLimitConfig {
        trusted_proxies: TrustedProxyConfig::parse(proxies).expect("valid proxy list"),
        ..rate_limit_config(environment, adjust)
    }
}

pub const fn limit(requests: u32, window_secs: u64) -> LimitConfig {
    LimitConfig {
        requests,
        window_secs,
    }
}

// ============================================================================
// TestApp
// ============================================================================

/// Full router over a caller-supplied counter store.
pub struct TestApp {
    pub router: Router,
    pub config: Config,
}

impl TestApp {
    pub fn new(store: Arc<dyn CounterStore>, rl_config: RateLimitConfig) -> Self {
        let config = Config::default_for_test();
        let state = AppState::new(config.clone(), RateLimiter::new(store, rl_config));
        Self {
            router: create_router(state),
            config,
        }
    }

    /// Build a request arriving from `peer`, as `into_make_service_with_connect_info` would.
    pub fn request(method: Method, uri: &str, peer: IpAddr) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(SocketAddr::new(peer, 40_000)))
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// POST /auth/login from `peer`.
    pub async fn login(&self, peer: IpAddr) -> Response<Body> {
        self.oneshot(
            Self::request(Method::POST, "/auth/login", peer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Generate a valid access token for this app's secret.
    pub fn access_token(&self, user_id: &str) -> String {
        generate_access_token(
            self.config.jwt_secret.as_deref().expect("test config has a secret"),
            user_id,
        )
    }

    pub fn bearer(&self, user_id: &str) -> (header::HeaderName, String) {
        (
            header::AUTHORIZATION,
            format!("Bearer {}", self.access_token(user_id)),
        )
    }
}

pub fn generate_access_token(secret: &str, user_id: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: user_id.to_string(),
            exp: get_current_timestamp() + 900,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to generate token")
}

pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
