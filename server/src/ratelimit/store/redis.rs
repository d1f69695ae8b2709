//! Counter store backed by Redis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::config::{ConnectionConfig, PerformanceConfig, ReconnectPolicy};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{CounterState, CounterStore};
use crate::ratelimit::constants::{
    HEALTH_PROBE_KEY, MAX_COMMAND_BUFFER_LEN, SCRIPT_EXCEEDED, SCRIPT_NOT_EXCEEDED,
};
use crate::ratelimit::{LimitConfig, RateLimitKey, StoreUnavailable};

/// Embedded Lua script for the atomic increment-and-expire.
const FIXED_WINDOW_SCRIPT: &str = include_str!("fixed_window.lua");

/// How long startup waits for the first Redis connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed-window counters in Redis, shared by every server instance.
///
/// Each call is bounded by `timeout`, both here and inside the client, so a
/// command that timed out is dropped rather than replayed after a reconnect.
/// Reconnects are left to the client's own reconnect policy.
#[derive(Clone)]
pub struct RedisCounterStore {
    redis: Client,
    timeout: Duration,
    script_sha: Arc<RwLock<String>>,
}

impl RedisCounterStore {
    /// Wraps an existing client. Call `init()` before use.
    pub fn new(redis: Client, timeout: Duration) -> Self {
        Self {
            redis,
            timeout,
            script_sha: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Connects to Redis and loads the counting script.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, StoreUnavailable> {
        let config = Config::from_url(redis_url).map_err(backend_error)?;
        let client = build_client(config, timeout);
        client.connect();
        tokio::time::timeout(CONNECT_TIMEOUT, client.wait_for_connect())
            .await
            .map_err(|_| StoreUnavailable::Timeout(CONNECT_TIMEOUT))?
            .map_err(backend_error)?;

        info!("Connected to Redis");

        let store = Self::new(client, timeout);
        store.init().await.map_err(backend_error)?;
        Ok(store)
    }

    /// Loads the Lua script into Redis.
    pub async fn init(&self) -> Result<(), Error> {
        self.load_script().await
    }

    /// Loads the Lua script and records its SHA.
    async fn load_script(&self) -> Result<(), Error> {
        let sha: String = self.redis.script_load(FIXED_WINDOW_SCRIPT).await?;
        info!(sha = %sha, "Fixed window script loaded into Redis");
        *self.script_sha.write().await = sha;
        Ok(())
    }

    /// Checks if an error is a NOSCRIPT error (script not found in Redis).
    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    /// Executes the counting script.
    ///
    /// When Redis lost its script cache (NOSCRIPT), the request is sent once
    /// more as a plain `EVAL` of the source, which also re-caches the script
    /// under the same SHA. A NOSCRIPT reply means nothing ran, so the counter
    /// is incremented at most once.
    async fn execute_script(
        &self,
        key: &str,
        limit: LimitConfig,
    ) -> Result<Vec<i64>, StoreUnavailable> {
        let sha = self.script_sha.read().await.clone();
        let args = vec![limit.window_secs.to_string(), limit.requests.to_string()];

        let result: Result<Vec<i64>, Error> = self
            .redis
            .evalsha(sha.as_str(), vec![key], args.clone())
            .await;

        match result {
            Ok(reply) => Ok(reply),
            Err(e) if Self::is_noscript_error(&e) => {
                warn!("NOSCRIPT error, evaluating script source");
                self.redis
                    .eval(FIXED_WINDOW_SCRIPT, vec![key], args)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Redis counter update failed after NOSCRIPT");
                        backend_error(e)
                    })
            }
            Err(e) => {
                warn!(error = %e, "Redis counter update failed");
                Err(backend_error(e))
            }
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    #[tracing::instrument(skip_all, fields(endpoint_class = %key.endpoint_class()))]
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        limit: LimitConfig,
    ) -> Result<CounterState, StoreUnavailable> {
        let rendered = key.render();
        let reply = tokio::time::timeout(self.timeout, self.execute_script(&rendered, limit))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Redis counter update timed out");
                StoreUnavailable::Timeout(self.timeout)
            })??;

        parse_reply(&reply)
    }

    async fn ping(&self) -> Result<(), StoreUnavailable> {
        let probe = self.redis.exists::<bool, _>(HEALTH_PROBE_KEY);
        tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| StoreUnavailable::Timeout(self.timeout))?
            .map(|_| ())
            .map_err(backend_error)
    }
}

/// Builds a client that never holds on to work the caller gave up on.
///
/// Commands time out inside the client after `timeout`, are attempted once,
/// and are rejected outright while the reconnect buffer is full.
pub(crate) fn build_client(config: Config, timeout: Duration) -> Client {
    let performance = PerformanceConfig {
        default_command_timeout: timeout,
        ..PerformanceConfig::default()
    };
    let connection = ConnectionConfig {
        max_command_attempts: 1,
        max_command_buffer_len: MAX_COMMAND_BUFFER_LEN,
        ..ConnectionConfig::default()
    };
    let policy = ReconnectPolicy::new_exponential(0, 100, 5_000, 2);
    Client::new(config, Some(performance), Some(connection), Some(policy))
}

fn backend_error(error: Error) -> StoreUnavailable {
    StoreUnavailable::Backend(error.to_string())
}

/// Validates the `{count, exceeded, ttl}` script reply.
fn parse_reply(reply: &[i64]) -> Result<CounterState, StoreUnavailable> {
    match *reply {
        [count, flag, ttl]
            if count >= 1
                && ttl >= 0
                && (flag == SCRIPT_EXCEEDED || flag == SCRIPT_NOT_EXCEEDED) =>
        {
            Ok(CounterState {
                current_count: count as u64,
                exceeded: flag == SCRIPT_EXCEEDED,
                ttl_remaining: ttl as u64,
            })
        }
        _ => Err(StoreUnavailable::MalformedReply(format!("{reply:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{EndpointClass, Environment, SubjectType};

    #[test]
    fn test_parse_reply() {
        let state = parse_reply(&[3, 0, 57]).unwrap();
        assert_eq!(
            state,
            CounterState {
                current_count: 3,
                exceeded: false,
                ttl_remaining: 57,
            }
        );

        let state = parse_reply(&[6, 1, 12]).unwrap();
        assert!(state.exceeded);
        assert_eq!(state.ttl_remaining, 12);
    }

    #[test]
    fn test_parse_reply_rejects_malformed() {
        for reply in [&[][..], &[1, 0], &[1, 0, 5, 9], &[0, 0, 5], &[1, 2, 5], &[1, 0, -2]] {
            assert!(
                matches!(parse_reply(reply), Err(StoreUnavailable::MalformedReply(_))),
                "reply {reply:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_unconnected_client_fails_closed() {
        let config = Config::from_url("redis://127.0.0.1:1").unwrap();
        let store = RedisCounterStore::new(
            Client::new(config, None, None, None),
            Duration::from_millis(50),
        );
        let key = RateLimitKey::new(
            Environment::Production,
            SubjectType::Ip,
            "203.0.113.5",
            EndpointClass::AuthLogin,
        );

        let result = store
            .increment_and_check(
                &key,
                LimitConfig {
                    requests: 5,
                    window_secs: 60,
                },
            )
            .await;
        assert!(result.is_err(), "must never report a count without Redis");
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_timed_out_commands_do_not_pile_up() {
        let timeout = Duration::from_millis(20);
        let client = build_client(Config::from_url("redis://127.0.0.1:1").unwrap(), timeout);
        client.connect();
        let store = RedisCounterStore::new(client.clone(), timeout);
        let key = RateLimitKey::new(
            Environment::Production,
            SubjectType::Ip,
            "203.0.113.5",
            EndpointClass::AuthLogin,
        );
        let limit = LimitConfig {
            requests: 5,
            window_secs: 60,
        };

        for _ in 0..200 {
            assert!(store.increment_and_check(&key, limit).await.is_err());
        }

        let queued = client.command_queue_len();
        assert!(
            queued <= MAX_COMMAND_BUFFER_LEN,
            "{queued} commands still queued after timing out"
        );
    }
}
