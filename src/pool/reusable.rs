use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::PoolStats;

/// A round-robin pool of repeatable values (keywords, titles, images, and
/// the derived CSS-class/URL/emoji pools).
///
/// The backing `Vec<T>` is replaced wholesale on refill: a background
/// worker builds a fresh `Arc<Vec<T>>` from a new Postgres batch (or, for
/// derived pools, a freshly generated batch) and swaps it in under a lock
/// held only for the pointer swap itself, never across an `.await`, so
/// render-path reads never block on I/O.
pub struct ReusablePool<T> {
    items: Mutex<Arc<Vec<T>>>,
    cursor: AtomicUsize,
    paused: AtomicBool,
    target: AtomicUsize,
    consumed: AtomicU64,
    refilled: AtomicU64,
    last_refill: AtomicI64,
    workers: AtomicUsize,
    created: Instant,
}

impl<T: Clone> ReusablePool<T> {
    pub fn new(initial: Vec<T>) -> Self {
        let target = initial.len();
        Self {
            items: Mutex::new(Arc::new(initial)),
            cursor: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            target: AtomicUsize::new(target),
            consumed: AtomicU64::new(0),
            refilled: AtomicU64::new(0),
            last_refill: AtomicI64::new(0),
            workers: AtomicUsize::new(0),
            created: Instant::now(),
        }
    }

    /// Returns the next item, advancing the round-robin cursor, or `None`
    /// if the pool is empty. An empty pool is a normal, spec-anticipated
    /// state between refill cycles, not a bug, so callers decide how to
    /// react (the render path maps it to `RenderError::PoolEmpty`).
    pub fn acquire(&self) -> Option<T> {
        let snapshot = self.items.lock().clone();
        if snapshot.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % snapshot.len();
        self.consumed.fetch_add(1, Ordering::Relaxed);
        Some(snapshot[index].clone())
    }

    /// Appends newly fetched rows to the existing pool rather than
    /// replacing it, used by incremental refills.
    pub fn append(&self, mut extra: Vec<T>) {
        let added = extra.len() as u64;
        let mut guard = self.items.lock();
        let mut merged = (**guard).clone();
        merged.append(&mut extra);
        *guard = Arc::new(merged);
        drop(guard);
        self.refilled.fetch_add(added, Ordering::Relaxed);
        self.touch_last_refill();
    }

    /// Replaces the pool outright, used on cold start or full reload.
    pub fn reload(&self, items: Vec<T>) {
        let added = items.len() as u64;
        *self.items.lock() = Arc::new(items);
        self.cursor.store(0, Ordering::Relaxed);
        self.refilled.fetch_add(added, Ordering::Relaxed);
        self.touch_last_refill();
    }

    fn touch_last_refill(&self) {
        self.last_refill
            .store(self.created.elapsed().as_millis() as i64, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Sets the target occupancy the refill worker tops up to, consulted
    /// by `pool::refill` instead of a fixed config value so the admin
    /// `POST /pool/resize` endpoint can change it at runtime.
    pub fn resize(&self, new_target: usize) {
        self.target.store(new_target, Ordering::Relaxed);
    }

    pub fn target(&self) -> usize {
        self.target.load(Ordering::Relaxed)
    }

    /// Records that one more background worker refills this pool, purely
    /// for the `Stats.workers` count surfaced through the admin API.
    pub fn register_worker(&self) {
        self.workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PoolStats {
        let len = self.items.lock().len();
        PoolStats {
            len,
            capacity: self.target(),
            paused: self.is_paused(),
            consumed: self.consumed.load(Ordering::Relaxed),
            refilled: self.refilled.load(Ordering::Relaxed),
            last_refill: self.last_refill.load(Ordering::Relaxed),
            workers: self.workers.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_round_robins_through_items() {
        let pool = ReusablePool::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let drawn: Vec<_> = (0..6).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(drawn, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn acquire_on_empty_pool_returns_none() {
        let pool: ReusablePool<String> = ReusablePool::new(Vec::new());
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn append_grows_pool_without_losing_existing_items() {
        let pool = ReusablePool::new(vec!["a".to_string()]);
        pool.append(vec!["b".to_string()]);
        assert_eq!(pool.stats().len, 2);
        assert_eq!(pool.stats().refilled, 1);
    }

    #[test]
    fn reload_replaces_contents_and_resets_cursor() {
        let pool = ReusablePool::new(vec!["a".to_string(), "b".to_string()]);
        pool.acquire();
        pool.reload(vec!["z".to_string()]);
        assert_eq!(pool.acquire().unwrap(), "z");
    }

    #[test]
    fn pause_and_resume_toggle_flag() {
        let pool: ReusablePool<String> = ReusablePool::new(vec!["a".to_string()]);
        assert!(!pool.is_paused());
        pool.pause();
        assert!(pool.is_paused());
        pool.resume();
        assert!(!pool.is_paused());
    }

    #[test]
    fn resize_changes_reported_capacity() {
        let pool: ReusablePool<String> = ReusablePool::new(Vec::new());
        assert_eq!(pool.stats().capacity, 0);
        pool.resize(512);
        assert_eq!(pool.stats().capacity, 512);
    }

    #[test]
    fn consumed_counter_tracks_successful_acquires() {
        let pool = ReusablePool::new(vec!["a".to_string()]);
        pool.acquire();
        pool.acquire();
        assert_eq!(pool.stats().consumed, 2);
    }
}
