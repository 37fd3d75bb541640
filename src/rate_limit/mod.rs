//! Per-client sliding-window ledgers.
//!
//! A ledger remembers, per client key, the timestamps of admitted calls in the
//! trailing window. A check evicts expired timestamps from the oldest end,
//! counts what remains and either admits (recording `now`) or rejects with the
//! time until the oldest call leaves the window.

mod memory;
mod redis_store;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

pub const MAX_CALLS_PER_MINUTE: usize = 60;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("malformed ledger reply: {0}")]
    MalformedReply(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: f64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub max_calls: usize,
    pub window_secs: f64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            max_calls: MAX_CALLS_PER_MINUTE,
            window_secs: 60.0,
        }
    }
}

impl WindowPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_calls: config.rate_limit_requests,
            window_secs: config.rate_limit_window().as_secs_f64(),
        }
    }

    /// Timestamps at or before this instant have left the window.
    pub fn cutoff(&self, now: f64) -> f64 {
        now - self.window_secs
    }
}

/// Shared store behind the rate-limit middleware.
///
/// Implementations must run evict, count and record as one atomic step per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, client: &str, now: f64) -> Result<Decision, RateLimitError>;
}
