//! Rate limiting for authentication endpoints.
//!
//! Fixed-window counters in Redis, keyed per environment, per client address
//! and (for authenticated callers) per user. Fails closed: when the counter
//! store cannot answer, protected requests are refused.

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod keys;
pub mod limiter;
pub mod middleware;
pub mod policy;
pub mod store;
pub mod types;

pub use config::*;
pub use error::*;
pub use identity::*;
pub use keys::*;
pub use limiter::*;
pub use middleware::{rate_limit, with_endpoint_class};
pub use policy::*;
pub use store::{CounterState, CounterStore, InMemoryCounterStore, RedisCounterStore};
pub use types::*;
