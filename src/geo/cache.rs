//! In-memory reverse-geocode cache.
//!
//! TTL: 1 hour. Capacity: 2000 entries with least-recently-used eviction,
//! independent of expiry. Shared by resolver calls from concurrent sessions.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::types::CoordinateKey;

pub const CACHE_CAPACITY: usize = 2000;
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

struct Entry {
    city: String,
    expires_at: Instant,
}

/// The geocode cache. Interior locking makes concurrent get/put safe.
pub struct GeocodeCache {
    entries: Mutex<LruCache<CoordinateKey, Entry>>,
    ttl: Duration,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::with_settings(CACHE_CAPACITY, CACHE_TTL)
    }

    /// Custom capacity and TTL (for tests).
    pub fn with_settings(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), ttl }
    }

    /// Look up a key. Expired entries are dropped on access and never served.
    pub fn get(&self, key: &CoordinateKey) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.city.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a resolved city under the key with a fresh TTL.
    pub fn put(&self, key: CoordinateKey, city: String) {
        let entry = Entry { city, expires_at: Instant::now() + self.ttl };
        self.entries.lock().unwrap().put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new()
    }
}
