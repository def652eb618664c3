// Short-TTL user cache keyed by email
// Values are opaque bytes; the cache never interprets a snapshot

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::debug;

use crate::error::AuthError;

/// Byte-oriented key/value cache with per-key TTLs.
///
/// Writes are not transactional with the user store: concurrent requests for
/// the same key may both miss and both write, and the last write wins. Expiry
/// is time-driven; a read of an expired key behaves as absent.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AuthError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AuthError>;
}

/// Redis-backed cache using a multiplexed connection manager
#[derive(Clone)]
pub struct RedisUserCache {
    conn: ConnectionManager,
}

impl RedisUserCache {
    pub async fn connect(redis_url: &str) -> Result<Self, AuthError> {
        let client = redis::Client::open(redis_url).map_err(|e| AuthError::Cache(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))?;
        debug!("Connected to redis user cache");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))
    }
}

/// In-process cache with the same semantics as the Redis one.
///
/// Used by the test suite and for running without a Redis instance. A `set`
/// without a following `expire` keeps the entry until one arrives, matching
/// Redis behavior.
#[derive(Default)]
pub struct InMemoryUserCache {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: Vec<u8>,
    deadline: Option<Instant>,
}

impl InMemoryUserCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserCache for InMemoryUserCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.deadline.is_some_and(|d| d <= Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AuthError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                deadline: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), AuthError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.deadline = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_set_returns_value() {
        let cache = InMemoryUserCache::new();
        cache.set("a@x.com", b"snapshot".to_vec()).await.unwrap();
        assert_eq!(
            cache.get("a@x.com").await.unwrap(),
            Some(b"snapshot".to_vec())
        );
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_absent() {
        let cache = InMemoryUserCache::new();
        assert_eq!(cache.get("missing@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_key_behaves_as_absent() {
        let cache = InMemoryUserCache::new();
        cache.set("a@x.com", b"snapshot".to_vec()).await.unwrap();
        cache
            .expire("a@x.com", Duration::from_millis(20))
            .await
            .unwrap();

        assert!(cache.get("a@x.com").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("a@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = InMemoryUserCache::new();
        cache.set("a@x.com", b"first".to_vec()).await.unwrap();
        cache.set("a@x.com", b"second".to_vec()).await.unwrap();
        assert_eq!(
            cache.get("a@x.com").await.unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[tokio::test]
    async fn test_overwrite_clears_previous_deadline() {
        let cache = InMemoryUserCache::new();
        cache.set("a@x.com", b"first".to_vec()).await.unwrap();
        cache
            .expire("a@x.com", Duration::from_millis(20))
            .await
            .unwrap();

        // Re-populate before expiry; the new entry has no deadline until
        // the caller sets one again
        cache.set("a@x.com", b"second".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            cache.get("a@x.com").await.unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[tokio::test]
    async fn test_expire_on_missing_key_is_a_noop() {
        let cache = InMemoryUserCache::new();
        cache
            .expire("missing@x.com", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(cache.get("missing@x.com").await.unwrap(), None);
    }
}
