//! Expiring key/value storage for signed tokens.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Storage used by the token manager.
///
/// Implementations must be safe under concurrent `get`/`set`; nothing else in
/// the SDK shares mutable state across calls.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` for `ttl_seconds`.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64);
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process [`TokenCache`] backed by a concurrent map.
///
/// Expired entries are removed on the first read after their deadline.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: DashMap<String, Entry>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenCache for LocalCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                // The read guard is released; re-check so a fresh set is not evicted.
                self.entries
                    .remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
    }
}
