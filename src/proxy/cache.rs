use dashmap::DashMap;
use md5::{Digest, Md5};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// Fingerprint-keyed replies for non-streaming traffic. Entries are immutable
// once inserted and expire lazily on read; streaming responses never touch
// this map.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CacheEntry {
    response: Value,
    inserted_at: Instant,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

// serde_json objects keep sorted keys, so serialising the parsed body is
// already canonical: identical requests hash identically.
pub fn fingerprint(body: &Value) -> String {
    let canonical = body.to_string();
    let digest = Md5::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl ResponseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.entries.get(key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.response.clone());
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Present but stale: evict outside the read guard.
        self.entries.remove(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, response: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entries.len(),
            lookups,
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}
