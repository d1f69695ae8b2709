//! Single-process counter store for tests and local development.
//!
//! Counts live in this process only, so limits multiply with the number of
//! instances. Deployments use [`super::RedisCounterStore`].

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CounterState, CounterStore};
use crate::ratelimit::{LimitConfig, RateLimitKey, StoreUnavailable};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// Fixed-window counters in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a key, `None` when no window is open.
    pub fn count(&self, key: &RateLimitKey) -> Option<u64> {
        let now = Instant::now();
        self.windows
            .get(&key.render())
            .filter(|w| w.expires_at > now)
            .map(|w| w.count)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        limit: LimitConfig,
    ) -> Result<CounterState, StoreUnavailable> {
        let now = Instant::now();
        let window = Duration::from_secs(limit.window_secs);

        // The entry guard holds the shard lock, making this atomic per key.
        let mut entry = self.windows.entry(key.render()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            *entry = Window {
                count: 0,
                expires_at: now + window,
            };
        }
        entry.count += 1;

        let remaining = entry.expires_at.saturating_duration_since(now);
        let ttl_remaining = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);

        Ok(CounterState {
            current_count: entry.count,
            exceeded: entry.count > u64::from(limit.requests),
            ttl_remaining,
        })
    }

    async fn ping(&self) -> Result<(), StoreUnavailable> {
        Ok(())
    }
}
