//! Session pool contract and an atomics-backed handle.
//!
//! The pool itself (session lifecycle, health, acquisition) belongs to
//! the transport stack. The context only needs to observe its size and
//! issue conditional resize commands.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Pool size observations for monitoring.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub in_use: usize,
    pub max_size: usize,
}

/// Size surface of the shared session pool.
///
/// `compare_and_set_max` must be atomic: a resize only lands when the
/// maximum still equals the observed value, which keeps simultaneous
/// growers from stacking their steps.
pub trait SessionPool: Send + Sync {
    fn max_size(&self) -> usize;

    fn in_use(&self) -> usize;

    /// Set the maximum to `new_max` only if it still equals `observed`.
    /// Returns whether the resize landed.
    fn compare_and_set_max(&self, observed: usize, new_max: usize) -> bool;
}

/// Reference pool handle backed by atomics.
///
/// Stands in for the transport's real pool in tests and small
/// deployments; resizing never blocks.
#[derive(Debug)]
pub struct SharedSessionPool {
    max_size: AtomicUsize,
    in_use: AtomicUsize,
}

impl SharedSessionPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: AtomicUsize::new(max_size),
            in_use: AtomicUsize::new(0),
        }
    }

    /// Record a session going in use. Advisory only; the handle does
    /// not enforce the maximum.
    pub fn session_acquired(&self) {
        self.in_use.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_released(&self) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            in_use: self.in_use.load(Ordering::Relaxed),
            max_size: self.max_size.load(Ordering::Relaxed),
        }
    }
}

impl SessionPool for SharedSessionPool {
    fn max_size(&self) -> usize {
        self.max_size.load(Ordering::Acquire)
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    fn compare_and_set_max(&self, observed: usize, new_max: usize) -> bool {
        let swapped = self
            .max_size
            .compare_exchange(observed, new_max, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            tracing::debug!("session pool max size {} -> {}", observed, new_max);
        }
        swapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_and_set_guards_against_stale_reads() {
        let pool = SharedSessionPool::new(100);
        assert!(pool.compare_and_set_max(100, 150));
        assert_eq!(pool.max_size(), 150);

        // A second resize computed from the stale maximum must not land.
        assert!(!pool.compare_and_set_max(100, 150));
        assert_eq!(pool.max_size(), 150);
    }

    #[test]
    fn test_usage_counters() {
        let pool = SharedSessionPool::new(10);
        pool.session_acquired();
        pool.session_acquired();
        pool.session_released();
        let stats = pool.stats();
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.max_size, 10);
    }
}
