//! Bounded caches keyed by origin SQL text.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// Hit/miss counters of one cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Size-bounded, recency-evicting cache of `Arc`-shared values.
///
/// Capacity 0 disables the cache entirely. Values are immutable once
/// inserted; eviction under capacity pressure never invalidates copies
/// already handed out.
#[derive(Debug)]
pub(crate) struct BoundedCache<V> {
    inner: Option<Mutex<LruCache<String, Arc<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> BoundedCache<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<V>> {
        let inner = self.inner.as_ref()?;
        let found = inner.lock().get(key).cloned();
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert a fully-built value. On a racing double-compute the
    /// second insert wins; both values are equivalent and immutable.
    pub(crate) fn put(&self, key: &str, value: Arc<V>) {
        if let Some(inner) = &self.inner {
            inner.lock().put(key.to_string(), value);
        }
    }

    pub(crate) fn clear(&self) {
        if let Some(inner) = &self.inner {
            inner.lock().clear();
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self
                .inner
                .as_ref()
                .map(|inner| inner.lock().len())
                .unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Usage statistics of one SQL text: the server's analysis from a
/// one-time explain round trip plus an execution-shaped usage counter.
#[derive(Debug)]
pub struct QueryStat {
    prepared_sql: String,
    ast: Option<String>,
    plan: Option<String>,
    failure: Option<String>,
    usage: AtomicU64,
}

impl QueryStat {
    pub(crate) fn success(
        prepared_sql: impl Into<String>,
        ast: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            prepared_sql: prepared_sql.into(),
            ast: Some(ast.into()),
            plan: Some(plan.into()),
            failure: None,
            usage: AtomicU64::new(0),
        }
    }

    pub(crate) fn failure(prepared_sql: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            prepared_sql: prepared_sql.into(),
            ast: None,
            plan: None,
            failure: Some(status.into()),
            usage: AtomicU64::new(0),
        }
    }

    pub fn prepared_sql(&self) -> &str {
        &self.prepared_sql
    }

    /// Query AST text, absent when the explain round trip failed.
    pub fn ast(&self) -> Option<&str> {
        self.ast.as_deref()
    }

    /// Query plan text, absent when the explain round trip failed.
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Failure status of the explain round trip, cached so identical
    /// SQL does not re-trigger a failing explain.
    pub fn failure_status(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_usage(&self) {
        self.usage.fetch_add(1, Ordering::Relaxed);
    }
}
