//! Cache store capability and the built-in in-memory implementation
//!
//! The physical store is an injected capability so the coordinator can be
//! exercised against fakes; the in-memory implementation here is the default
//! backend and the reference for store semantics: whole-resource entries
//! only, TTL expiry, and failures that degrade rather than fail a request.

use crate::cache_key::CacheKey;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::models::CacheEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Storage capability consulted by the coordinator.
///
/// Implementations must treat `put` as idempotent: writing the same key twice
/// with equal content is harmless (last write wins).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a stored entry.
    ///
    /// Returns `Ok(None)` on a miss; `Err` only when the store itself is
    /// unavailable (the caller treats that as a miss).
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Persist a full-content entry under a key.
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()>;
}

/// Store statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

struct StoredEntry {
    entry: CacheEntry,
    expires_at: SystemTime,
    last_accessed: SystemTime,
}

/// In-memory TTL cache store.
///
/// Entries expire after the configured TTL; when a size limit is set, least
/// recently used entries are evicted to make room for new data.
pub struct MemoryCacheStore {
    storage: RwLock<HashMap<String, StoredEntry>>,
    ttl: Duration,
    max_bytes: Option<usize>,
    stats: RwLock<StoreStats>,
}

impl MemoryCacheStore {
    /// Create a new store with the given entry lifetime
    pub fn new(ttl: Duration) -> Self {
        MemoryCacheStore {
            storage: RwLock::new(HashMap::new()),
            ttl,
            max_bytes: None,
            stats: RwLock::new(StoreStats::default()),
        }
    }

    /// Create a new store with a maximum total body size in bytes
    pub fn with_max_bytes(ttl: Duration, max_bytes: usize) -> Self {
        MemoryCacheStore {
            storage: RwLock::new(HashMap::new()),
            ttl,
            max_bytes: Some(max_bytes),
            stats: RwLock::new(StoreStats::default()),
        }
    }

    /// Create a store with the TTL and size limit from a proxy configuration;
    /// a zero `memory_store_max_bytes` means unbounded
    pub fn from_config(config: &ProxyConfig) -> Self {
        if config.memory_store_max_bytes > 0 {
            MemoryCacheStore::with_max_bytes(config.cache_ttl(), config.memory_store_max_bytes)
        } else {
            MemoryCacheStore::new(config.cache_ttl())
        }
    }

    /// Snapshot of current statistics
    pub fn stats(&self) -> StoreStats {
        let storage = self.storage.read().unwrap_or_else(|e| e.into_inner());
        let stats = self.stats.read().unwrap_or_else(|e| e.into_inner());
        StoreStats {
            entries: storage.len(),
            bytes: storage.values().map(|s| s.entry.body.len()).sum(),
            hits: stats.hits,
            misses: stats.misses,
        }
    }

    fn record(&self, hit: bool) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }

    /// Evict least recently used entries until `needed` bytes fit
    fn evict_lru(&self, storage: &mut HashMap<String, StoredEntry>, needed: usize) {
        let max = match self.max_bytes {
            Some(max) => max,
            None => return,
        };

        let mut in_use: usize = storage.values().map(|s| s.entry.body.len()).sum();
        if in_use + needed <= max {
            return;
        }

        let mut candidates: Vec<(String, SystemTime, usize)> = storage
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed, v.entry.body.len()))
            .collect();
        candidates.sort_by_key(|(_, last_accessed, _)| *last_accessed);

        for (key, _, size) in candidates {
            if in_use + needed <= max {
                break;
            }
            storage.remove(&key);
            in_use = in_use.saturating_sub(size);
            debug!("evicted cache entry: key={}, freed={} bytes", key, size);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let now = SystemTime::now();

        let found = {
            let storage = self
                .storage
                .read()
                .map_err(|e| ProxyError::CacheReadError(format!("store lock poisoned: {}", e)))?;

            match storage.get(key.as_str()) {
                Some(stored) if stored.expires_at > now => Some(stored.entry.clone()),
                Some(_) => {
                    debug!("cache entry expired: key={}", key);
                    None
                }
                None => None,
            }
        };

        self.record(found.is_some());

        if found.is_some() {
            // Update recency for LRU (best effort; a poisoned lock here only
            // costs eviction accuracy)
            if let Ok(mut storage) = self.storage.write() {
                if let Some(stored) = storage.get_mut(key.as_str()) {
                    stored.last_accessed = now;
                }
            }
            debug!("cache hit: key={}", key);
        } else {
            debug!("cache miss: key={}", key);
        }

        Ok(found)
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        let now = SystemTime::now();
        let size = entry.body.len();

        let mut storage = self
            .storage
            .write()
            .map_err(|e| ProxyError::CacheWriteSkipped(format!("store lock poisoned: {}", e)))?;

        // Replacing an existing key frees its bytes before the size check
        storage.remove(key.as_str());
        self.evict_lru(&mut storage, size);

        storage.insert(
            key.as_str().to_string(),
            StoredEntry {
                entry,
                expires_at: now + self.ttl,
                last_accessed: now,
            },
        );

        debug!("stored cache entry: key={}, size={} bytes", key, size);
        Ok(())
    }
}

/// A store that rejects every operation; used to exercise degradation paths
pub struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        warn!("cache store unavailable on get: key={}", key);
        Err(ProxyError::CacheReadError("store unavailable".to_string()))
    }

    async fn put(&self, key: &CacheKey, _entry: CacheEntry) -> Result<()> {
        warn!("cache store unavailable on put: key={}", key);
        Err(ProxyError::CacheWriteSkipped("store unavailable".to_string()))
    }
}
