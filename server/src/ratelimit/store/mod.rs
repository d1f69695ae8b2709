//! Shared fixed-window counters.
//!
//! Every implementation must make increment-and-expire a single atomic step
//! and report failures as [`StoreUnavailable`], never as a zero count.

mod memory;
mod redis;

pub use memory::InMemoryCounterStore;
pub use redis::RedisCounterStore;

use async_trait::async_trait;

use crate::ratelimit::{LimitConfig, RateLimitKey, StoreUnavailable};

/// Counter value after one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    /// Hits in the current window, including this one
    pub current_count: u64,
    /// `current_count > limit.requests`
    pub exceeded: bool,
    /// Seconds until the window resets
    pub ttl_remaining: u64,
}

/// Backend holding the counters shared by every server instance.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter for `key`, opening a window of
    /// `limit.window_secs` on the first hit. Later hits leave the expiry alone.
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        limit: LimitConfig,
    ) -> Result<CounterState, StoreUnavailable>;

    /// Round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreUnavailable>;
}
