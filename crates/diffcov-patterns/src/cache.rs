//! Read-through pattern cache using moka
//!
//! Owned by the caller and shared across patch evaluations; the learner
//! itself never holds state between queries.

use crate::pattern::ClassTestPatterns;
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Cache key: what was asked, about which module, against which corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    /// Type or routine name
    pub type_name: String,
    /// Module-path hint, if any
    pub module_path: Option<String>,
    /// Corpus root
    pub corpus_root: PathBuf,
}

impl PatternKey {
    /// Create key
    #[must_use]
    pub fn new(type_name: &str, module_path: Option<&str>, corpus_root: &Path) -> Self {
        Self {
            type_name: type_name.to_string(),
            module_path: module_path.map(str::to_string),
            corpus_root: corpus_root.to_path_buf(),
        }
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Thread-safe cache of learned patterns
#[derive(Debug, Clone)]
pub struct PatternCache {
    inner: Cache<PatternKey, Arc<ClassTestPatterns>>,
}

impl PatternCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache whose entries expire, for corpora that change underneath
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get cached patterns
    #[inline]
    #[must_use]
    pub fn get(&self, key: &PatternKey) -> Option<Arc<ClassTestPatterns>> {
        self.inner.get(key)
    }

    /// Insert patterns
    #[inline]
    pub fn insert(&self, key: PatternKey, patterns: ClassTestPatterns) {
        self.inner.insert(key, Arc::new(patterns));
    }

    /// Get cached patterns or learn and store them
    ///
    /// Concurrent misses on the same key run `learn` once.
    pub fn get_or_learn<F>(&self, key: PatternKey, learn: F) -> Arc<ClassTestPatterns>
    where
        F: FnOnce() -> ClassTestPatterns,
    {
        self.inner.get_with(key, || Arc::new(learn()))
    }

    /// Invalidate one entry
    #[inline]
    pub fn invalidate(&self, key: &PatternKey) {
        self.inner.invalidate(key);
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Check if key is cached
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &PatternKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for PatternCache {
    /// Create cache with default capacity (1,000 entries)
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_or_learn_runs_once() {
        let cache = PatternCache::default();
        let key = PatternKey::new("Widget", Some("shapes.widget"), Path::new("/corpus"));
        let calls = Cell::new(0);

        for _ in 0..3 {
            let patterns = cache.get_or_learn(key.clone(), || {
                calls.set(calls.get() + 1);
                ClassTestPatterns::empty("Widget")
            });
            assert_eq!(patterns.type_name, "Widget");
        }

        assert_eq!(calls.get(), 1);
        assert!(cache.contains(&key));
        assert_eq!(cache.stats().entry_count, 1);
    }

    #[test]
    fn keys_differ_by_corpus_and_module() {
        let a = PatternKey::new("Widget", None, Path::new("/a"));
        let b = PatternKey::new("Widget", None, Path::new("/b"));
        let c = PatternKey::new("Widget", Some("pkg"), Path::new("/a"));
        assert_ne!(a, b);
        assert_ne!(a, c);

        let cache = PatternCache::default();
        cache.insert(a.clone(), ClassTestPatterns::empty("Widget"));
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());

        cache.invalidate(&a);
        assert!(cache.get(&a).is_none());
    }
}
