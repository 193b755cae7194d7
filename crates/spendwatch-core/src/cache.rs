//! Process-wide response cache with per-entry TTL.
//!
//! Avoids repeating identical, recent database round-trips. Memory is
//! bounded two ways: every entry carries its own expiry, and the total
//! key count is capped. Expired entries are dropped lazily on access and
//! periodically by [`ResponseCache::spawn_sweeper`].
//!
//! Thread-safe via `parking_lot::RwLock`; values are stored and returned
//! by clone, so callers can never mutate a cached payload in place.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics snapshot for the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live keys.
    pub keys: usize,
    /// Number of cache hits since construction (or last flush).
    pub hits: u64,
    /// Number of cache misses since construction (or last flush).
    pub misses: u64,
    /// Approximate total size of all keys, in bytes.
    pub ksize: usize,
    /// Approximate total size of all values, in bytes.
    pub vsize: usize,
}

/// A successful cache read: the stored value plus its true age since
/// insertion.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The cached payload.
    pub value: Value,
    /// Time elapsed since the entry was inserted.
    pub age: Duration,
}

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    expires_at: Instant,
    approx_size: usize,
}

/// In-memory TTL cache for shaped query responses.
///
/// One instance exists per process, constructed at startup and shared by
/// every route handler.
///
/// # Capacity policy
///
/// When a `set` would insert a *new* key at capacity, expired entries are
/// purged first; if the cache is still full, the live entry nearest to
/// its own expiry is evicted. Overwrites of existing keys never evict.
pub struct ResponseCache {
    entries: RwLock<FxHashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    max_keys: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Creates a cache bounded to `max_keys` entries (minimum 1), with
    /// `default_ttl` applied when `set` is called without a TTL.
    #[must_use]
    pub fn new(max_keys: usize, default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            max_keys: max_keys.max(1),
            default_ttl,
        }
    }

    /// Returns the value for `key` if present and not expired.
    ///
    /// An entry whose expiry has passed is treated as absent even if the
    /// sweep has not removed it yet, and is dropped on the way out.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(key) {
                if entry.expires_at > now {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key, "cache hit");
                    return Some(CacheHit {
                        value: entry.value.clone(),
                        age: now.duration_since(entry.inserted_at),
                    });
                }
            }
        }

        // Expired or absent. Drop the stale entry if it is still there.
        {
            let mut entries = self.entries.write();
            if entries.get(key).is_some_and(|e| e.expires_at <= now) {
                entries.remove(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "cache miss");
        None
    }

    /// Inserts or overwrites `key`, expiring after `ttl` (or the default
    /// TTL when `None`).
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Instant::now();
        let approx_size = value.to_string().len();

        let mut entries = self.entries.write();

        if !entries.contains_key(&key) && entries.len() >= self.max_keys {
            entries.retain(|_, e| e.expires_at > now);

            if entries.len() >= self.max_keys {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                    tracing::debug!(key = %victim, "cache evicted entry nearest to expiry");
                }
            }
        }

        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
                approx_size,
            },
        );
    }

    /// Removes the given keys. Returns the number actually removed.
    pub fn del(&self, keys: &[&str]) -> usize {
        let mut entries = self.entries.write();
        let removed = keys.iter().filter(|k| entries.remove(**k).is_some()).count();
        tracing::debug!(requested = keys.len(), removed, "cache del");
        removed
    }

    /// Removes every entry whose key starts with `prefix`. Returns the
    /// number removed. Used for targeted invalidation without a full flush.
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before - entries.len();
        tracing::debug!(prefix, removed, "cache prefix invalidation");
        removed
    }

    /// Removes all entries and resets the hit/miss counters.
    pub fn flush(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        tracing::info!("cache flushed");
    }

    /// Drops every expired entry. Returns the number removed.
    ///
    /// Called periodically by the sweeper task; safe to call manually.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cache sweep removed expired entries");
        }
        removed
    }

    /// Returns all live keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of stored entries (including not-yet-swept expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Read-only statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let ksize = entries.keys().map(|k| k.len()).sum();
        let vsize = entries.values().map(|e| e.approx_size).sum();
        CacheStats {
            keys: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ksize,
            vsize,
        }
    }

    /// Spawns the periodic expiry sweep. The task runs until the cache is
    /// dropped by every other holder.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}
