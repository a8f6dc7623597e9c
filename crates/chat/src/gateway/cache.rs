//! Short-lived cache for idempotent metadata requests
//!
//! Entries are keyed by URL plus a prefix of the Authorization header so two
//! sessions never share a response. Identical GETs inside the TTL are served
//! from one stored response instead of hitting the network again.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Characters of the Authorization header that participate in the key
const AUTH_KEY_PREFIX: usize = 20;

pub fn cache_key(url: &str, authorization: Option<&str>) -> String {
    let auth: String = authorization
        .unwrap_or("")
        .chars()
        .take(AUTH_KEY_PREFIX)
        .collect();
    format!("{}_{}", url, auth)
}

struct CacheEntry {
    body: String,
    stored_at: DateTime<Utc>,
}

pub struct RequestCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl RequestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .map(|entry| entry.body.as_str())
    }

    pub fn insert(&mut self, key: String, body: String, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                body,
                stored_at: now,
            },
        );
    }

    /// Drop every entry whose URL contains `fragment`
    pub fn invalidate(&mut self, fragment: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(fragment));
        before - self.entries.len()
    }

    /// Remove expired entries
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.stored_at < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
