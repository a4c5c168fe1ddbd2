//! Key-value store seam for the idempotency ledger.
//!
//! The store is an external, shared, TTL-capable service (Redis in
//! production). The ledger only touches it through the narrow primitives
//! here and never assumes exclusive access.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::EventError;

/// Narrow interface over a TTL-capable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value at `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, EventError>;

    /// Write `value` at `key` with a store-level TTL.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl_secs: u64,
    ) -> Result<(), EventError>;

    /// Whether a live value exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, EventError>;

    /// Delete `key`; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, EventError>;

    /// Existence checks for many keys in a single pipelined round trip.
    async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>, EventError>;

    /// Write many `(key, value, ttl_secs)` entries in a single pipelined
    /// round trip.
    async fn set_many_with_expiry(
        &self,
        entries: &[(String, String, u64)],
    ) -> Result<(), EventError>;

    /// Keys matching a glob-style pattern. Diagnostic use only.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, EventError>;

    /// Remaining TTL in seconds: `-2` if the key is missing, `-1` if it has
    /// no expiry (Redis semantics).
    async fn ttl(&self, key: &str) -> Result<i64, EventError>;
}

/// Redis-backed store using a multiplexed async connection.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Create a store from a connection URL.
    pub fn new(url: &str) -> Result<Self, EventError> {
        let client = redis::Client::open(url).map_err(|e| EventError::StoreUnavailable {
            cause: format!("Failed to create Redis client: {e}"),
        })?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, EventError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| EventError::StoreUnavailable {
                cause: format!("Failed to get Redis connection: {e}"),
            })
    }

    fn store_err(op: &str, e: redis::RedisError) -> EventError {
        EventError::StoreUnavailable {
            cause: format!("Redis {op} failed: {e}"),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EventError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| Self::store_err("GET", e))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl_secs: u64,
    ) -> Result<(), EventError> {
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Self::store_err("SETEX", e))
    }

    async fn exists(&self, key: &str) -> Result<bool, EventError> {
        let mut conn = self.connection().await?;
        redis::cmd("EXISTS")
            .arg(key)
            .query_async::<bool>(&mut conn)
            .await
            .map_err(|e| Self::store_err("EXISTS", e))
    }

    async fn delete(&self, key: &str) -> Result<bool, EventError> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::store_err("DEL", e))?;
        Ok(removed > 0)
    }

    async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>, EventError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("EXISTS").arg(key);
        }
        pipe.query_async::<Vec<bool>>(&mut conn)
            .await
            .map_err(|e| Self::store_err("pipelined EXISTS", e))
    }

    async fn set_many_with_expiry(
        &self,
        entries: &[(String, String, u64)],
    ) -> Result<(), EventError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for (key, value, ttl_secs) in entries {
            pipe.cmd("SETEX").arg(key).arg(ttl_secs).arg(value).ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Self::store_err("pipelined SETEX", e))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, EventError> {
        let mut conn = self.connection().await?;
        redis::cmd("KEYS")
            .arg(pattern)
            .query_async::<Vec<String>>(&mut conn)
            .await
            .map_err(|e| Self::store_err("KEYS", e))
    }

    async fn ttl(&self, key: &str) -> Result<i64, EventError> {
        let mut conn = self.connection().await?;
        redis::cmd("TTL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| Self::store_err("TTL", e))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with real expiry bookkeeping, for tests and development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Glob match supporting only a trailing `*`, which is all the ledger
    /// ever asks for.
    fn matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EventError> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone()))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl_secs: u64,
    ) -> Result<(), EventError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Utc::now() + Duration::seconds(ttl_secs as i64)),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, EventError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, EventError> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }

    async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>, EventError> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|k| entries.get(k).is_some_and(|e| !e.is_expired(now)))
            .collect())
    }

    async fn set_many_with_expiry(
        &self,
        batch: &[(String, String, u64)],
    ) -> Result<(), EventError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        for (key, value, ttl_secs) in batch {
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at: Some(now + Duration::seconds(*ttl_secs as i64)),
                },
            );
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, EventError> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && Self::matches(pattern, k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<i64, EventError> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(match entries.get(key) {
            None => -2,
            Some(e) if e.is_expired(now) => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => (*at - now).num_seconds().max(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_delete() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k1", "v1".to_string(), 60)
            .await
            .unwrap();

        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));
        assert!(store.exists("k1").await.unwrap());
        assert!(store.delete("k1").await.unwrap());
        assert!(!store.exists("k1").await.unwrap());
        assert!(!store.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemoryStore::new();
        // A zero TTL expires immediately.
        store
            .set_with_expiry("gone", "v".to_string(), 0)
            .await
            .unwrap();
        assert!(!store.exists("gone").await.unwrap());
        assert_eq!(store.get("gone").await.unwrap(), None);
        assert_eq!(store.ttl("gone").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_memory_store_ttl_reporting() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v".to_string(), 600)
            .await
            .unwrap();
        let ttl = store.ttl("k").await.unwrap();
        assert!(ttl > 590 && ttl <= 600, "unexpected ttl {ttl}");
        assert_eq!(store.ttl("missing").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_memory_store_batch_round_trip() {
        let store = MemoryStore::new();
        let entries = vec![
            ("a".to_string(), "1".to_string(), 60),
            ("b".to_string(), "2".to_string(), 60),
        ];
        store.set_many_with_expiry(&entries).await.unwrap();

        let found = store
            .exists_many(&["a".to_string(), "missing".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(found, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_memory_store_keys_prefix_pattern() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("osa:events:processed:1", "x".to_string(), 60)
            .await
            .unwrap();
        store
            .set_with_expiry("osa:events:processed:2", "x".to_string(), 60)
            .await
            .unwrap();
        store
            .set_with_expiry("other:key", "x".to_string(), 60)
            .await
            .unwrap();

        let mut keys = store.keys("osa:events:processed:*").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["osa:events:processed:1", "osa:events:processed:2"]
        );
    }

    #[tokio::test]
    async fn test_exists_many_empty() {
        let store = MemoryStore::new();
        assert!(store.exists_many(&[]).await.unwrap().is_empty());
    }
}
