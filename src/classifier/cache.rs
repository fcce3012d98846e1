//! Bounded, write-through cache for classification results, keyed by a
//! fingerprint of the normalized input (spec.md §4.D, §5: "a single map
//! under its own lock").

use super::Classification;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Default number of entries retained (spec.md §4.D: "bounded key ->
/// classification store").
pub const DEFAULT_CAPACITY: usize = 1024;

/// Normalize then fingerprint an input the same way on every call so
/// repeated queries (possibly with different whitespace/casing) hit the
/// same cache slot.
pub fn fingerprint(input: &str) -> String {
    let normalized: String = input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!("{:x}", md5_like_hash(&normalized))
}

/// A small, dependency-free stable hash. We don't need cryptographic
/// strength here, only a stable fingerprint for a bounded LRU key.
fn md5_like_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// LRU-evicted classification cache, single map under its own lock.
pub struct ClassificationCache {
    inner: Mutex<LruCache<String, Classification>>,
}

impl ClassificationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity must be nonzero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Classification> {
        self.inner.lock().expect("cache lock poisoned").get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Classification) {
        self.inner.lock().expect("cache lock poisoned").put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationMethod;
    use crate::ids::{RiskLevel, UnitId};

    fn sample() -> Classification {
        Classification {
            primary_unit: UnitId::Coding,
            secondary_units: vec![],
            risk_level: RiskLevel::Low,
            confidence: 0.9,
            method: ClassificationMethod::Regex,
        }
    }

    #[test]
    fn fingerprint_is_stable_across_whitespace_and_case() {
        assert_eq!(
            fingerprint("Write  a   Function"),
            fingerprint("write a function")
        );
    }

    #[test]
    fn cache_hit_returns_identical_classification() {
        let cache = ClassificationCache::new(4);
        let key = fingerprint("write a function");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), sample());
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.method, ClassificationMethod::Regex);
        assert_eq!(hit.primary_unit, UnitId::Coding);
    }

    #[test]
    fn bounded_capacity_evicts_oldest() {
        let cache = ClassificationCache::new(1);
        cache.insert("a".into(), sample());
        cache.insert("b".into(), sample());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }
}
