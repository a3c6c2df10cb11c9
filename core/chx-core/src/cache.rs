//! Cache capability — schema cache 등 프로필별 key/value 저장소
//!
//! Values are JSON so any serializable structure (schemas in particular) can be stored.

use crate::error::ChxResult;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Generic cache store addressed by key and profile.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str, profile: &str) -> Option<Value>;

    fn put(&self, key: &str, profile: &str, value: Value);

    /// Cached value, or the supplier's result stored under `key`.
    ///
    /// Supplier errors are returned and nothing is stored.
    fn remember(
        &self,
        key: &str,
        profile: &str,
        supplier: &mut dyn FnMut() -> ChxResult<Value>,
    ) -> ChxResult<Value> {
        if let Some(value) = self.get(key, profile) {
            return Ok(value);
        }
        let value = supplier()?;
        self.put(key, profile, value.clone());
        Ok(value)
    }

    fn clear(&self, profile: &str);
}

/// In-process LRU cache, one LRU per profile
pub struct MemoryCache {
    profiles: Mutex<HashMap<String, LruCache<String, Value>>>,
    capacity: NonZeroUsize,
}

impl MemoryCache {
    /// Capacity is per profile; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn len(&self, profile: &str) -> usize {
        self.profiles.lock().get(profile).map_or(0, LruCache::len)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str, profile: &str) -> Option<Value> {
        self.profiles
            .lock()
            .get_mut(profile)
            .and_then(|lru| lru.get(key).cloned())
    }

    fn put(&self, key: &str, profile: &str, value: Value) {
        let capacity = self.capacity;
        self.profiles
            .lock()
            .entry(profile.to_string())
            .or_insert_with(|| LruCache::new(capacity))
            .put(key.to_string(), value);
    }

    fn clear(&self, profile: &str) {
        self.profiles.lock().remove(profile);
    }
}

/// Disabled cache: every lookup misses, nothing is stored
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str, _profile: &str) -> Option<Value> {
        None
    }

    fn put(&self, _key: &str, _profile: &str, _value: Value) {}

    fn clear(&self, _profile: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChxError;
    use serde_json::json;

    #[test]
    fn test_cache_basic() {
        let cache = MemoryCache::new(3);

        cache.put("key1", "default", json!({"id": "UInt64"}));

        assert_eq!(cache.get("key1", "default"), Some(json!({"id": "UInt64"})));
        assert_eq!(cache.get("key1", "other"), None);
        assert_eq!(cache.get("key2", "default"), None);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache = MemoryCache::new(2);

        cache.put("key1", "default", json!(1));
        cache.put("key2", "default", json!(2));
        cache.put("key3", "default", json!(3)); // key1 evicted

        assert_eq!(cache.get("key1", "default"), None);
        assert_eq!(cache.get("key3", "default"), Some(json!(3)));
        assert_eq!(cache.len("default"), 2);
    }

    #[test]
    fn test_remember_calls_supplier_once() {
        let cache = MemoryCache::new(4);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .remember("schema", "default", &mut || {
                    calls += 1;
                    Ok(json!(["id"]))
                })
                .unwrap();
            assert_eq!(value, json!(["id"]));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_remember_does_not_store_errors() {
        let cache = MemoryCache::new(4);
        let result = cache.remember("schema", "default", &mut || {
            Err(ChxError::Schema("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(cache.len("default"), 0);
    }

    #[test]
    fn test_clear_profile() {
        let cache = MemoryCache::new(3);
        cache.put("k", "a", json!(1));
        cache.put("k", "b", json!(2));

        cache.clear("a");

        assert_eq!(cache.get("k", "a"), None);
        assert_eq!(cache.get("k", "b"), Some(json!(2)));
    }

    #[test]
    fn test_null_cache_always_calls_supplier() {
        let cache = NullCache;
        let mut calls = 0;
        for _ in 0..2 {
            cache
                .remember("k", "default", &mut || {
                    calls += 1;
                    Ok(json!(null))
                })
                .unwrap();
        }
        assert_eq!(calls, 2);
    }
}
