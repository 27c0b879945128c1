use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash of a resource name and its request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Parameters must already be in a stable order.
    pub fn new<'a>(resource: &str, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(resource.as_bytes());
        for (name, value) in params {
            hasher.update(b"\x1f");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Time-boxed cache for API responses, injected into the clients that use it.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: CacheKey, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    /// Return the cached value or compute, store and return a fresh one.
    pub fn get_or_try_insert<E>(
        &self,
        key: CacheKey,
        fetch: impl FnOnce() -> Result<Value, E>,
    ) -> Result<Value, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = fetch()?;
        self.set(key, value.clone());
        Ok(value)
    }
}
