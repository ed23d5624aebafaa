// src/matching/cache.rs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::policy::TermCandidate;
use crate::models::core::VocabularyType;

/// The vocabulary store and policy set a candidate list was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    pub store: u64,
    pub policy: u64,
}

impl CacheGeneration {
    pub fn new(store: u64, policy: u64) -> Self {
        Self { store, policy }
    }
}

pub type TermCacheKey = (CacheGeneration, VocabularyType, String);

/// LRU cache of the per-term candidate lists a policy produced. Keys carry
/// both generations, so a run still holding a replaced store or policy set
/// can only write entries that no later run reads.
pub struct TermMatchCache {
    inner: Mutex<LruCache<TermCacheKey, Arc<Vec<TermCandidate>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TermMatchCache {
    /// `None` for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    pub fn get(
        &self,
        generation: CacheGeneration,
        vocabulary: VocabularyType,
        term: &str,
    ) -> Option<Arc<Vec<TermCandidate>>> {
        let key = (generation, vocabulary, term.to_string());
        let found = match self.inner.lock() {
            Ok(mut cache) => cache.get(&key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&key).cloned(),
        };
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn put(
        &self,
        generation: CacheGeneration,
        vocabulary: VocabularyType,
        term: &str,
        candidates: Arc<Vec<TermCandidate>>,
    ) {
        let key = (generation, vocabulary, term.to_string());
        match self.inner.lock() {
            Ok(mut cache) => {
                cache.put(key, candidates);
            }
            Err(poisoned) => {
                poisoned.into_inner().put(key, candidates);
            }
        }
    }

    pub fn clear(&self) {
        let mut cache = match self.inner.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!("Clearing term match cache ({} entries)", cache.len());
        cache.clear();
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(cache) => cache.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since construction.
    pub fn hit_stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::EntryId;

    fn candidate(code: &str) -> TermCandidate {
        TermCandidate {
            internal_id: EntryId(1),
            code: code.to_string(),
            display_text: code.to_string(),
            score: 90,
        }
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        assert!(TermMatchCache::new(0).is_none());
    }

    fn generation(store: u64) -> CacheGeneration {
        CacheGeneration::new(store, 0)
    }

    #[test]
    fn test_generation_is_part_of_the_key() {
        let cache = TermMatchCache::new(8).unwrap();
        let dx = VocabularyType::Diagnosis;
        cache.put(generation(1), dx, "hypertension", Arc::new(vec![candidate("I10")]));

        assert!(cache.get(generation(1), dx, "hypertension").is_some());
        assert!(cache.get(generation(2), dx, "hypertension").is_none());
        assert!(cache.get(generation(1), VocabularyType::Concept, "hypertension").is_none());
        assert_eq!(cache.hit_stats(), (1, 2));
    }

    #[test]
    fn test_policy_generation_is_part_of_the_key() {
        let cache = TermMatchCache::new(8).unwrap();
        let dx = VocabularyType::Diagnosis;
        let before = CacheGeneration::new(3, 1);
        let after = CacheGeneration::new(3, 2);
        cache.put(before, dx, "hypertension", Arc::new(vec![candidate("I10")]));

        assert!(cache.get(after, dx, "hypertension").is_none());
        assert!(cache.get(before, dx, "hypertension").is_some());
    }

    #[test]
    fn test_lru_eviction_and_clear() {
        let cache = TermMatchCache::new(2).unwrap();
        let px = VocabularyType::Procedure;
        cache.put(generation(1), px, "office visit", Arc::new(vec![candidate("99213")]));
        cache.put(generation(1), px, "ekg", Arc::new(vec![candidate("93000")]));
        cache.put(generation(1), px, "x-ray", Arc::new(Vec::new()));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(generation(1), px, "office visit").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
