use async_trait::async_trait;
use redis::{Client as RedisClient, Script};
use uuid::Uuid;

use super::{Decision, RateLimitError, RateLimitStore, WindowPolicy};

const KEY_PREFIX: &str = "rate_limit:";

// Sorted set per client, scored by call time. Evict, count and record run in
// one script so concurrent instances cannot interleave between the steps.
const SLIDING_WINDOW_LUA: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_calls = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count >= max_calls then
  local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
  return {0, tostring(tonumber(oldest[2]) + window - now)}
end
redis.call('ZADD', key, now, ARGV[4])
redis.call('EXPIRE', key, math.ceil(window))
return {1, '0'}
"#;

/// Ledger shared by every instance pointed at the same redis.
pub struct RedisStore {
    client: RedisClient,
    policy: WindowPolicy,
    script: Script,
}

impl RedisStore {
    pub fn open(redis_url: &str, policy: WindowPolicy) -> Result<Self, RateLimitError> {
        Ok(Self {
            client: RedisClient::open(redis_url)?,
            policy,
            script: Script::new(SLIDING_WINDOW_LUA),
        })
    }

    pub fn key_for(client: &str) -> String {
        format!("{}{}", KEY_PREFIX, client)
    }
}

fn decode_reply(allowed: i64, retry_after: &str) -> Result<Decision, RateLimitError> {
    if allowed == 1 {
        return Ok(Decision::Allowed);
    }
    let retry_after = retry_after
        .parse::<f64>()
        .map_err(|_| RateLimitError::MalformedReply(retry_after.to_string()))?;
    Ok(Decision::Limited { retry_after })
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn check(&self, client: &str, now: f64) -> Result<Decision, RateLimitError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let member = format!("{}-{}", now, Uuid::new_v4());

        let (allowed, retry_after): (i64, String) = self
            .script
            .key(Self::key_for(client))
            .arg(now)
            .arg(self.policy.window_secs)
            .arg(self.policy.max_calls)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        decode_reply(allowed, &retry_after)
    }
}
