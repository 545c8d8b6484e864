//! In-process coordination store.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{CoordinationStore, StoreError, Subscription};

#[derive(Default)]
struct Tables {
    strings: HashMap<String, String>,
    /// member → score, kept alongside an ordered index for rank queries
    ranked: HashMap<String, RankedSet>,
    sets: HashMap<String, HashSet<String>>,
    maps: HashMap<String, BTreeMap<String, i64>>,
}

#[derive(Default)]
struct RankedSet {
    scores: HashMap<String, i64>,
    order: BTreeMap<(i64, String), ()>,
}

impl RankedSet {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.order.remove(&(old, member.to_string()));
        }
        self.order.insert((score, member.to_string()), ());
    }

    fn remove(&mut self, member: &str) {
        if let Some(old) = self.scores.remove(member) {
            self.order.remove(&(old, member.to_string()));
        }
    }

    fn members(&self) -> impl Iterator<Item = &String> {
        self.order.keys().map(|(_, member)| member)
    }
}

/// Redis-like semantics over process memory. Every operation takes one lock,
/// so each is atomic the same way a single Redis command is.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Whether any value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let tables = self.tables.lock();
        tables.strings.contains_key(key)
            || tables.ranked.contains_key(key)
            || tables.sets.contains_key(key)
            || tables.maps.contains_key(key)
    }
}

/// Resolve Redis-style inclusive, possibly negative bounds.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        if tables.strings.contains_key(key) {
            return Ok(false);
        }
        tables.strings.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.lock().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tables
            .lock()
            .strings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for key in keys {
            tables.strings.remove(*key);
            tables.ranked.remove(*key);
            tables.sets.remove(*key);
            tables.maps.remove(*key);
        }
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock();
        let current = match tables.strings.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|err| StoreError::Corrupt {
                key: key.to_string(),
                detail: err.to_string(),
            })?,
            None => 0,
        };
        let next = current + delta;
        tables.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn rank_add(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        self.tables
            .lock()
            .ranked
            .entry(key.to_string())
            .or_default()
            .insert(member, score);
        Ok(())
    }

    async fn rank_of(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.ranked.get(key).and_then(|set| {
            set.members()
                .position(|m| m == member)
                .map(|pos| pos as u64)
        }))
    }

    async fn rank_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock();
        let Some(set) = tables.ranked.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = resolve_range(set.scores.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(set
            .members()
            .skip(start)
            .take(stop - start + 1)
            .cloned()
            .collect())
    }

    async fn rank_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some(set) = tables.ranked.get_mut(key) {
            set.remove(member);
            if set.scores.is_empty() {
                tables.ranked.remove(key);
            }
        }
        Ok(())
    }

    async fn rank_len(&self, key: &str) -> Result<u64, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .ranked
            .get(key)
            .map(|set| set.scores.len() as u64)
            .unwrap_or(0))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some(set) = tables.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                tables.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_len(&self, key: &str) -> Result<u64, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn map_set_if_absent(
        &self,
        key: &str,
        field: &str,
        value: i64,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let map = tables.maps.entry(key.to_string()).or_default();
        if map.contains_key(field) {
            return Ok(false);
        }
        map.insert(field.to_string(), value);
        Ok(true)
    }

    async fn map_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock();
        let value = tables
            .maps
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn map_remove(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some(map) = tables.maps.get_mut(key) {
            map.remove(field);
            if map.is_empty() {
                tables.maps.remove(key);
            }
        }
        Ok(())
    }

    async fn map_all(&self, key: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .maps
            .get(key)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default())
    }

    async fn map_reset(&self, key: &str, value: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let Some(map) = tables.maps.get_mut(key) else {
            return Ok(0);
        };
        map.values_mut().for_each(|v| *v = value);
        Ok(map.len() as u64)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut channels = self.channels.lock();
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.retain(|tx| tx.send(payload.to_string()).is_ok());
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
