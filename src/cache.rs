//! Bounded memo cache for scorer results.
//!
//! Keyed by (query, bucket letter). The scorer is pure, so a hit returns
//! exactly what a recomputation would; the cache only saves time.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::models::BestMatch;

type Key = (String, char);

pub struct ScoreCache {
    entries: Mutex<LruCache<Key, Option<BestMatch>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

impl ScoreCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// `None` on a miss; `Some(None)` when the cached answer is "no match".
    pub fn get(&self, query: &str, letter: char) -> Option<Option<BestMatch>> {
        let key = (query.to_string(), letter);
        // A poisoned lock still holds valid memo entries
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(found) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(found.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, query: &str, letter: char, result: Option<BestMatch>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put((query.to_string(), letter), result);
    }

    pub fn stats(&self) -> CacheStats {
        let len = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len,
        }
    }
}
