//! Fixed-capacity nonce cache for replay detection.
//!
//! Slots are overwritten in insertion order once the ring is full, so a
//! nonce becomes replayable again after `capacity` newer insertions. The
//! bound keeps memory constant regardless of request volume.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default number of remembered nonces.
pub const DEFAULT_NONCE_CAPACITY: usize = 100;

/// Cache shared between request workers. Check-then-insert sequences must
/// hold the lock for their whole duration.
pub type SharedNonceCache = Arc<Mutex<NonceCache>>;

/// One ring slot.
#[derive(Debug, Clone, Default)]
pub struct NonceCacheEntry {
    pub nonce: String,
    pub seen_at: Option<DateTime<Utc>>,
    pub occupied: bool,
}

/// Ring buffer of recently accepted nonces.
#[derive(Debug)]
pub struct NonceCache {
    entries: Vec<NonceCacheEntry>,
    cursor: usize,
}

impl NonceCache {
    /// Create a cache with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![NonceCacheEntry::default(); capacity.max(1)],
            cursor: 0,
        }
    }

    /// Wrap a new cache for sharing across workers.
    pub fn shared(capacity: usize) -> SharedNonceCache {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.occupied).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff an occupied slot holds exactly this nonce.
    pub fn contains(&self, nonce: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.occupied && entry.nonce == nonce)
    }

    /// Record a nonce at the cursor and advance it.
    pub fn insert(&mut self, nonce: &str, now: DateTime<Utc>) {
        let slot = &mut self.entries[self.cursor];
        slot.nonce.clear();
        slot.nonce.push_str(nonce);
        slot.seen_at = Some(now);
        slot.occupied = true;

        self.cursor = (self.cursor + 1) % self.entries.len();
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_empty_cache() {
        let cache = NonceCache::new(4);
        assert!(cache.is_empty());
        assert!(!cache.contains(""));
        assert!(!cache.contains("abc"));
    }

    #[test]
    fn test_insert_then_contains() {
        let mut cache = NonceCache::new(4);
        cache.insert("bm9uY2U=", now());
        assert!(cache.contains("bm9uY2U="));
        assert!(!cache.contains("bm9uY2U"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_exact_match_only() {
        let mut cache = NonceCache::new(4);
        cache.insert("ABC", now());
        assert!(!cache.contains("abc"));
        assert!(!cache.contains("ABC "));
    }

    #[test]
    fn test_wraparound_forgets_oldest() {
        let mut cache = NonceCache::new(3);
        for n in ["a", "b", "c"] {
            cache.insert(n, now());
        }
        assert!(cache.contains("a"));
        assert_eq!(cache.len(), 3);

        // Fourth insertion reuses the first slot.
        cache.insert("d", now());
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("d"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_retained_until_capacity_insertions() {
        let mut cache = NonceCache::new(DEFAULT_NONCE_CAPACITY);
        cache.insert("target", now());
        for i in 0..DEFAULT_NONCE_CAPACITY - 1 {
            cache.insert(&format!("n{}", i), now());
            assert!(cache.contains("target"));
        }
        cache.insert("one-more", now());
        assert!(!cache.contains("target"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = NonceCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("x", now());
        assert!(cache.contains("x"));
    }

    #[test]
    fn test_insert_records_time() {
        let mut cache = NonceCache::new(2);
        let at = now();
        cache.insert("x", at);
        assert_eq!(cache.entries[0].seen_at, Some(at));
    }
}
