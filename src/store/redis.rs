//! Redis backend. Plain commands where a single command is atomic, Lua scripts where
//! a read-modify-write has to be.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Script};
use std::{fmt, time::Duration};
use tracing::{debug, instrument};

use super::{KeyValueStore, StoreError};
use crate::limiter::{RateLimitDecision, RateLimitPolicy, RateLimitStore};

/// KEYS[1]: key, ARGV[1]: expected, ARGV[2]: replacement, ARGV[3]: ttl in ms.
const COMPARE_AND_SWAP_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return 1
end
return 0
";

/// KEYS[1]: key, ARGV[1]: expected.
const COMPARE_AND_DELETE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Fixed window counter with a block key.
///
/// KEYS[1]: counter key, KEYS[2]: block key
/// ARGV[1]: max attempts, ARGV[2]: window ms, ARGV[3]: block ms
///
/// Returns: {allowed (0/1), count, ttl ms}. A rejected call with count 0 means the
/// client was already blocked.
const LIMITER_SCRIPT: &str = r"
local count_key = KEYS[1]
local block_key = KEYS[2]
local max = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local block_ms = tonumber(ARGV[3])

local block_ttl = redis.call('PTTL', block_key)
if block_ttl > 0 then
    return {0, 0, block_ttl}
end

local count = redis.call('INCR', count_key)
if count == 1 then
    redis.call('PEXPIRE', count_key, window_ms)
end

if count > max then
    redis.call('SET', block_key, '1', 'PX', block_ms)
    redis.call('DEL', count_key)
    return {0, count, block_ms}
end

return {1, count, redis.call('PTTL', count_key)}
";

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn limiter_keys(client: &str) -> (String, String) {
    (
        format!("ratelimit:{client}:count"),
        format!("ratelimit:{client}:block"),
    )
}

fn decode_limiter_reply(reply: &[i64], policy: &RateLimitPolicy) -> Result<RateLimitDecision, StoreError> {
    let [allowed, count, ttl_ms] = reply else {
        return Err(StoreError::Backend(format!(
            "unexpected limiter reply: {reply:?}"
        )));
    };

    let ttl = Duration::from_millis(u64::try_from(*ttl_ms).unwrap_or(0));
    let count = u64::try_from(*count).unwrap_or(0);

    Ok(match (*allowed, count) {
        (1, count) => RateLimitDecision::Allowed {
            remaining: policy.max_attempts.saturating_sub(count),
        },
        (_, 0) => RateLimitDecision::Blocked { retry_after: ttl },
        _ => RateLimitDecision::Tripped { retry_after: ttl },
    })
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    compare_and_swap: Script,
    compare_and_delete: Script,
    limiter: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("connected to redis");

        Ok(Self {
            conn,
            compare_and_swap: Script::new(COMPARE_AND_SWAP_SCRIPT),
            compare_and_delete: Script::new(COMPARE_AND_DELETE_SCRIPT),
            limiter: Script::new(LIMITER_SCRIPT),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self, value))]
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self, expected, new))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .compare_and_swap
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    #[instrument(skip(self, expected))]
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    #[instrument(skip(self, policy))]
    async fn hit(
        &self,
        client: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError> {
        let (count_key, block_key) = limiter_keys(client);
        let mut conn = self.conn.clone();
        let reply: Vec<i64> = self
            .limiter
            .key(count_key)
            .key(block_key)
            .arg(policy.max_attempts)
            .arg(millis(policy.window))
            .arg(millis(policy.block))
            .invoke_async(&mut conn)
            .await?;

        decode_limiter_reply(&reply, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_keys_are_scoped_per_client() {
        let (count, block) = limiter_keys("10.0.0.1");
        assert_eq!(count, "ratelimit:10.0.0.1:count");
        assert_eq!(block, "ratelimit:10.0.0.1:block");
    }

    #[test]
    fn limiter_reply_maps_to_decisions() -> Result<(), StoreError> {
        let policy = RateLimitPolicy::default();

        assert_eq!(
            decode_limiter_reply(&[1, 2, 500_000], &policy)?,
            RateLimitDecision::Allowed { remaining: 3 }
        );
        assert_eq!(
            decode_limiter_reply(&[0, 6, 300_000], &policy)?,
            RateLimitDecision::Tripped {
                retry_after: Duration::from_secs(300)
            }
        );
        assert_eq!(
            decode_limiter_reply(&[0, 0, 1_500], &policy)?,
            RateLimitDecision::Blocked {
                retry_after: Duration::from_millis(1_500)
            }
        );
        Ok(())
    }

    #[test]
    fn short_limiter_reply_is_an_error() {
        let policy = RateLimitPolicy::default();
        assert!(decode_limiter_reply(&[1, 2], &policy).is_err());
    }

    #[test]
    fn sub_millisecond_ttl_rounds_up() {
        assert_eq!(millis(Duration::from_micros(10)), 1);
        assert_eq!(millis(Duration::from_secs(2)), 2_000);
    }
}
