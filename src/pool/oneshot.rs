use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::RenderError;
use crate::store::RedisQueue;

use super::bloom::RecentlyConsumed;
use super::PoolStats;

/// A one-shot pool of paragraphs for a single content group: each
/// paragraph is handed out at most once across the whole fleet. Backed
/// by a bounded channel fed by the content-pool consumer task
/// (`crate::pool::refill::run_paragraph_consumer`), so the render path
/// never awaits Postgres or Redis directly.
///
/// Channel items carry the paragraph id alongside its body so
/// `try_acquire` can enqueue the Redis mark-used signal the instant a
/// render actually consumes it, never before — forwarding a paragraph
/// into the channel must not be confused with having served it.
pub struct ParagraphPool {
    group_id: i64,
    receiver: parking_lot::Mutex<mpsc::Receiver<(i64, String)>>,
    sender: mpsc::Sender<(i64, String)>,
    recently_consumed: RecentlyConsumed,
    exhausted: AtomicBool,
    capacity: AtomicI64,
    current_batch: AtomicI64,
    consumed: AtomicU64,
    refilled: AtomicU64,
    last_refill: AtomicI64,
    workers: AtomicUsize,
    created: Instant,
    redis: Option<RedisQueue>,
}

impl ParagraphPool {
    pub fn new(group_id: i64, channel_capacity: usize, redis: Option<RedisQueue>) -> Self {
        let (sender, receiver) = mpsc::channel(channel_capacity);
        Self {
            group_id,
            receiver: parking_lot::Mutex::new(receiver),
            sender,
            recently_consumed: RecentlyConsumed::with_capacity_bits(1 << 20),
            exhausted: AtomicBool::new(false),
            capacity: AtomicI64::new(channel_capacity as i64),
            current_batch: AtomicI64::new(1),
            consumed: AtomicU64::new(0),
            refilled: AtomicU64::new(0),
            last_refill: AtomicI64::new(0),
            workers: AtomicUsize::new(0),
            created: Instant::now(),
            redis,
        }
    }

    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    /// Non-blocking draw used by the render path: a render never waits on
    /// the content-pool consumer, it either gets a paragraph immediately
    /// or the request fails fast with `ContentExhausted`.
    pub fn try_acquire(&self) -> Result<String, RenderError> {
        match self.receiver.lock().try_recv() {
            Ok((id, body)) => {
                self.consumed.fetch_add(1, Ordering::Relaxed);
                self.queue_mark_used(id);
                Ok(body)
            }
            Err(_) => {
                self.exhausted.store(true, Ordering::Relaxed);
                Err(RenderError::ContentExhausted {
                    group_id: self.group_id,
                })
            }
        }
    }

    /// Enqueues `id` for asynchronous mark-used processing the moment a
    /// render actually draws it. Without Redis configured (tests, or a
    /// deployment with no pending-set loader) there's no queue to push
    /// into, so this is a no-op.
    fn queue_mark_used(&self, id: i64) {
        let Some(redis) = self.redis.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = redis.queue_mark_used(id).await {
                warn!(error = %err, "failed to enqueue paragraph mark-used");
            }
        });
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }

    pub fn sender(&self) -> mpsc::Sender<(i64, String)> {
        self.sender.clone()
    }

    /// Forwards a freshly fetched paragraph into the channel, used by the
    /// consumer loop instead of calling `sender()` directly so the
    /// `Stats.refilled` counter stays accurate. Returns `false` once the
    /// receiver has been dropped (process shutdown).
    pub async fn forward(&self, id: i64, body: String) -> bool {
        if self.sender.send((id, body)).await.is_err() {
            return false;
        }
        self.refilled.fetch_add(1, Ordering::Relaxed);
        self.last_refill
            .store(self.created.elapsed().as_millis() as i64, Ordering::Relaxed);
        true
    }

    /// Returns `true` if `id` looks like a duplicate the consumer has
    /// already forwarded, letting it skip re-sending without a Postgres
    /// round trip.
    pub fn seen_before(&self, id: i64) -> bool {
        self.recently_consumed.check_and_insert(id)
    }

    pub fn current_batch(&self) -> i64 {
        self.current_batch.load(Ordering::Relaxed)
    }

    /// Advances to the next Redis pending-set batch once the current one
    /// pops empty.
    pub fn advance_batch(&self) {
        self.current_batch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn register_worker(&self) {
        self.workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            len: self.sender.capacity(),
            capacity: self.capacity.load(Ordering::Relaxed) as usize,
            paused: false,
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

    #[tokio::test]
    async fn try_acquire_returns_exhausted_when_channel_empty() {
        let pool = ParagraphPool::new(1, 4, None);
        let err = pool.try_acquire().unwrap_err();
        assert!(matches!(err, RenderError::ContentExhausted { group_id: 1 }));
        assert!(pool.is_exhausted());
    }

    #[tokio::test]
    async fn try_acquire_returns_sent_paragraph() {
        let pool = ParagraphPool::new(1, 4, None);
        assert!(pool.forward(7, "hello".to_string()).await);
        assert_eq!(pool.try_acquire().unwrap(), "hello");
        assert_eq!(pool.stats().consumed, 1);
        assert_eq!(pool.stats().refilled, 1);
    }

    #[test]
    fn seen_before_flags_duplicates() {
        let pool = ParagraphPool::new(1, 4, None);
        assert!(!pool.seen_before(99));
        assert!(pool.seen_before(99));
    }

    #[test]
    fn advance_batch_increments_current_batch() {
        let pool = ParagraphPool::new(1, 4, None);
        assert_eq!(pool.current_batch(), 1);
        pool.advance_batch();
        assert_eq!(pool.current_batch(), 2);
    }
}
