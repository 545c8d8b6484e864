use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, RedisError, Script};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{CoordinationStore, StoreError, Subscription};

// Publish retry configuration (request path, so keep it short)
const PUBLISHER_MAX_ATTEMPTS: u32 = 3;
const PUBLISHER_INITIAL_RETRY_DELAY_MS: u64 = 50;
const PUBLISHER_MAX_RETRY_DELAY_MS: u64 = 200;

// Rewrites only the fields present when the script runs, so a field removed
// concurrently is never recreated.
const MAP_RESET_SCRIPT: &str = r#"
local fields = redis.call('HKEYS', KEYS[1])
for _, field in ipairs(fields) do
    redis.call('HSET', KEYS[1], field, ARGV[1])
end
return #fields
"#;

/// Coordination store backed by one Redis deployment shared by every
/// server process.
///
/// Commands go through a [`ConnectionManager`] (cloned per call, it
/// multiplexes and reconnects). Each subscription opens its own pub/sub
/// connection.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        info!("[STORE] Connected to Redis");
        Ok(Self { client, manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn is_transient_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout() || err.is_connection_refusal()
}

fn publish_retry_delay(attempt: u32) -> Duration {
    let delay_ms = PUBLISHER_INITIAL_RETRY_DELAY_MS
        .saturating_mul(2_u64.pow(attempt.saturating_sub(1)))
        .min(PUBLISHER_MAX_RETRY_DELAY_MS);
    Duration::from_millis(delay_ms)
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let written: bool = self.conn().set_nx(key, value).await?;
        Ok(written)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn().set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.conn().del::<_, ()>(keys).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let value: i64 = self.conn().incr(key, delta).await?;
        Ok(value)
    }

    async fn rank_add(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        self.conn().zadd::<_, _, _, ()>(key, member, score).await?;
        Ok(())
    }

    async fn rank_of(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        let rank: Option<u64> = self.conn().zrank(key, member).await?;
        Ok(rank)
    }

    async fn rank_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let members: Vec<String> = self.conn().zrange(key, start, stop).await?;
        Ok(members)
    }

    async fn rank_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.conn().zrem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn rank_len(&self, key: &str) -> Result<u64, StoreError> {
        let len: u64 = self.conn().zcard(key).await?;
        Ok(len)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: u64 = self.conn().sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.conn().srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn set_len(&self, key: &str) -> Result<u64, StoreError> {
        let len: u64 = self.conn().scard(key).await?;
        Ok(len)
    }

    async fn map_set_if_absent(
        &self,
        key: &str,
        field: &str,
        value: i64,
    ) -> Result<bool, StoreError> {
        let written: bool = self.conn().hset_nx(key, field, value).await?;
        Ok(written)
    }

    async fn map_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let value: i64 = self.conn().hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn map_remove(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.conn().hdel::<_, _, ()>(key, field).await?;
        Ok(())
    }

    async fn map_all(&self, key: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let entries: HashMap<String, i64> = self.conn().hgetall(key).await?;
        let mut entries: Vec<(String, i64)> = entries.into_iter().collect();
        entries.sort();
        Ok(entries)
    }

    async fn map_reset(&self, key: &str, value: i64) -> Result<u64, StoreError> {
        let reset: u64 = Script::new(MAP_RESET_SCRIPT)
            .key(key)
            .arg(value)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(reset)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.conn().publish::<_, _, ()>(channel, payload).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt >= PUBLISHER_MAX_ATTEMPTS || !is_transient_error(&err) {
                        return Err(err.into());
                    }
                    let delay = publish_retry_delay(attempt);
                    warn!(
                        error = %err,
                        channel,
                        attempt,
                        retry_delay_ms = delay.as_millis() as u64,
                        "[STORE] Redis publish failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let conn_info = self.client.get_connection_info();
        let addr = match conn_info.addr().clone() {
            redis::ConnectionAddr::Tcp(host, port) => (host, port),
            _ => {
                return Err(StoreError::Unsupported(
                    "only TCP connections are supported for pub/sub".to_string(),
                ))
            }
        };

        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(RedisError::from)?;
        let mut pubsub = PubSub::new(conn_info.redis_settings(), stream).await?;
        pubsub.subscribe(channel).await?;
        debug!(channel, "[STORE] Subscribed");

        let channel = channel.to_string();
        let messages = pubsub.into_on_message().filter_map(move |msg| {
            let payload = msg.get_payload::<String>();
            let channel = channel.clone();
            async move {
                match payload {
                    Ok(payload) => Some(payload),
                    Err(err) => {
                        warn!(error = %err, channel = %channel, "[STORE] Dropping undecodable payload");
                        None
                    }
                }
            }
        });
        Ok(Box::pin(messages))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        redis::cmd("PING")
            .query_async::<String>(&mut self.conn())
            .await?;
        Ok(())
    }
}
