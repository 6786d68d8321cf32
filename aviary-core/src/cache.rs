//! TTL + LRU response cache
//!
//! Caches final answers keyed by a content hash of
//! (agent name, user id, input text) so a repeated request can skip
//! execution entirely. Bounded capacity with least-recently-used
//! eviction plus an absolute per-entry TTL; expired lookups are misses
//! and evict the entry. Safe for concurrent use by in-flight requests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Generate the stable cache key for an (agent, user, input) triple.
///
/// Format: `"<agentName>:<userID>:<64-hex-char-SHA-256-of-input>"`.
/// Deterministic across processes and restarts.
pub fn generate_cache_key(agent: &str, user_id: i64, input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    format!("{}:{}:{}", agent, user_id, hex::encode(hash))
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
    last_used: u64,
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    // Monotonic recency stamp; bumped on every access.
    clock: u64,
}

/// Bounded LRU cache with per-entry TTL
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries, each expiring
    /// `ttl` after insertion.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Look up a value. Expired entries are evicted and reported as misses;
    /// hits refresh recency.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();

        let now = Instant::now();
        if inner
            .entries
            .get(key)
            .is_some_and(|entry| now >= entry.expires_at)
        {
            inner.entries.remove(key);
            return None;
        }

        inner.clock += 1;
        let clock = inner.clock;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = clock;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Insert or replace a value. An update is a full replace, never an
    /// in-place mutation. Evicts the least recently used entry at capacity.
    pub fn insert(&self, key: String, value: String) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
            last_used: clock,
        };

        if inner.entries.contains_key(&key) {
            inner.entries.insert(key, entry);
            return;
        }

        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(key, entry);
    }

    /// Number of live entries (including not-yet-collected expired ones)
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
