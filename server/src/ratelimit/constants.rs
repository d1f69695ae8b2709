//! Rate limiting constants.

/// Redis key pre-allocation size
pub const REDIS_KEY_CAPACITY: usize = 64;

/// Hex characters of the SHA-256 subject digest written to logs
pub const LOG_SUBJECT_HASH_LEN: usize = 12;

/// Lua script exceeded flags
pub const SCRIPT_EXCEEDED: i64 = 1;
pub const SCRIPT_NOT_EXCEEDED: i64 = 0;

/// Counter store round-trip timeout (milliseconds)
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;

/// Trusted proxy ranges wider than these prefixes are reported as broad
pub const BROAD_IPV4_PREFIX: u8 = 16;
pub const BROAD_IPV6_PREFIX: u8 = 48;

/// Key probed by the store health check
pub const HEALTH_PROBE_KEY: &str = "authgate:health";

/// Commands the Redis client may buffer while reconnecting. Anything beyond
/// this is rejected immediately and the request is refused.
pub const MAX_COMMAND_BUFFER_LEN: usize = 64;
