//! Redis Counter Store Tests
//!
//! Exercise the Lua fixed-window script against a real Redis.
//!
//! Run with: `cargo test --test redis_store_test -- --ignored`
//! Requires Redis at `REDIS_URL` (default `redis://localhost:6380`).

use std::sync::Arc;
use std::time::Duration;

use authgate_server::ratelimit::{
    AdmissionRequest, CounterStore, EndpointClass, Environment, LimitConfig, RateLimitConfig,
    RateLimitDecision, RateLimitKey, RateLimiter, RedisCounterStore, SubjectType,
};
use axum::http::HeaderMap;
use fred::prelude::*;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6380".into())
}

async fn connect() -> RedisCounterStore {
    RedisCounterStore::connect(&redis_url(), Duration::from_millis(500))
        .await
        .expect("Failed to connect to test Redis")
}

/// Key with a unique subject so parallel runs never collide.
fn unique_key(environment: Environment) -> RateLimitKey {
    RateLimitKey::new(
        environment,
        SubjectType::User,
        format!("test-{}", Uuid::new_v4()),
        EndpointClass::AuthLogin,
    )
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_counts_and_expires() {
    let store = connect().await;
    let key = unique_key(Environment::Development);
    let limit = LimitConfig {
        requests: 2,
        window_secs: 60,
    };

    let first = store.increment_and_check(&key, limit).await.unwrap();
    assert_eq!(first.current_count, 1);
    assert!(!first.exceeded);
    assert!(first.ttl_remaining > 0 && first.ttl_remaining <= 60);

    store.increment_and_check(&key, limit).await.unwrap();
    let third = store.increment_and_check(&key, limit).await.unwrap();
    assert_eq!(third.current_count, 3);
    assert!(third.exceeded);
    assert!(third.ttl_remaining <= first.ttl_remaining);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_window_resets() {
    let store = connect().await;
    let key = unique_key(Environment::Development);
    let limit = LimitConfig {
        requests: 1,
        window_secs: 1,
    };

    store.increment_and_check(&key, limit).await.unwrap();
    assert!(store.increment_and_check(&key, limit).await.unwrap().exceeded);

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let state = store.increment_and_check(&key, limit).await.unwrap();
    assert_eq!(state.current_count, 1);
    assert!(!state.exceeded);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_concurrent_increments_are_atomic() {
    let store = Arc::new(connect().await);
    let key = unique_key(Environment::Staging);
    let limit = LimitConfig {
        requests: 1_000,
        window_secs: 60,
    };

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.increment_and_check(&key, limit).await })
        })
        .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap().current_count);
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_script_reloaded_after_flush() {
    let store = connect().await;
    let key = unique_key(Environment::Development);
    let limit = LimitConfig {
        requests: 5,
        window_secs: 60,
    };

    store.increment_and_check(&key, limit).await.unwrap();

    // Simulates a Redis restart dropping the script cache.
    let admin = Client::new(Config::from_url(&redis_url()).unwrap(), None, None, None);
    admin.connect();
    admin
        .wait_for_connect()
        .await
        .expect("Failed to connect to Redis");
    let _: () = admin.script_flush(false).await.unwrap();

    let state = store.increment_and_check(&key, limit).await.unwrap();
    assert_eq!(state.current_count, 2);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_limiter_end_to_end() {
    let store = connect().await;
    let limiter = RateLimiter::new(
        Arc::new(store),
        RateLimitConfig::for_environment(Environment::Production),
    );
    let headers = HeaderMap::new();
    let user = format!("test-{}", Uuid::new_v4());

    let decision = limiter
        .check_request(&AdmissionRequest {
            socket_peer: "2001:db8::1".parse().unwrap(),
            headers: &headers,
            endpoint_class: EndpointClass::Auth0Url,
            authenticated_user_id: Some(&user),
        })
        .await
        .unwrap();
    assert_eq!(decision, RateLimitDecision::Allowed);
    assert!(limiter.store_health().await.is_ok());
}
