//! Coordination store: the shared, process-external state every server
//! process reads and writes, plus the pub/sub channels that fan room
//! events out to all of them.
//!
//! Production uses Redis ([`RedisStore`]). [`MemoryStore`] implements the
//! same contract in-process for single-process deployments and tests;
//! several directories sharing one `MemoryStore` behave like several
//! server processes sharing one Redis.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("subscription to '{0}' closed")]
    Closed(String),
    #[error("stored value at '{key}' is not valid: {detail}")]
    Corrupt { key: String, detail: String },
    #[error("unsupported store configuration: {0}")]
    Unsupported(String),
}

/// Ordered stream of raw payloads published on one channel.
pub type Subscription = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Primitives the room state machine is built on.
///
/// Every method is a single atomic operation on the backing store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Set `key` only if it does not exist. Returns whether this call wrote it.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError>;
    /// Atomic increment; returns the new value.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Insert or re-score `member` in a ranked set.
    async fn rank_add(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError>;
    /// Zero-based rank, lowest score first.
    async fn rank_of(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError>;
    /// Members by rank, inclusive bounds; negative indexes count from the end.
    async fn rank_range(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;
    async fn rank_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn rank_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Returns whether the member was newly added.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Set a map field only if absent. Returns whether this call wrote it.
    async fn map_set_if_absent(&self, key: &str, field: &str, value: i64)
        -> Result<bool, StoreError>;
    /// Atomic field increment; returns the new value.
    async fn map_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;
    async fn map_remove(&self, key: &str, field: &str) -> Result<(), StoreError>;
    async fn map_all(&self, key: &str) -> Result<Vec<(String, i64)>, StoreError>;
    /// Set every existing field to `value` in one atomic step. Fields are
    /// never created. Returns how many fields were reset.
    async fn map_reset(&self, key: &str, value: i64) -> Result<u64, StoreError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError>;
    /// Subscribe to one channel. The subscription is active when this returns,
    /// so anything published afterwards is delivered. Dropping the stream
    /// unsubscribes.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
