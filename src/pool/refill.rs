use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::store::{DataStore, RedisQueue};

use super::{ParagraphPool, ReusablePool};

/// Background loop that keeps a reusable pool above its low watermark by
/// pulling a fresh batch from `table` whenever it drops below it. Mirrors
/// the interval-driven health-check task pattern the connection pool
/// uses, just polling pool occupancy instead of a database ping. Tops up
/// to `pool.target()` rather than a fixed config value so `POST
/// /pool/resize` can change the target at runtime.
pub async fn run_reusable_refill(
    pool: Arc<ReusablePool<String>>,
    store: Arc<dyn DataStore>,
    table: &'static str,
    group_id: i64,
    config: PoolConfig,
) {
    let mut ticker = tokio::time::interval(config.refill_interval);
    loop {
        ticker.tick().await;
        if pool.is_paused() {
            continue;
        }
        let current = pool.stats().len;
        if current >= config.low_watermark {
            continue;
        }
        let deficit = pool.target().saturating_sub(current);
        if deficit == 0 {
            continue;
        }
        match store.fetch_pool_batch(table, group_id, deficit).await {
            Ok(rows) if rows.is_empty() => {
                warn!(table, group_id, "reusable pool refill returned no rows");
            }
            Ok(rows) => {
                let values: Vec<String> = rows.into_iter().map(|r| r.value).collect();
                let fetched = values.len();
                pool.append(values);
                info!(table, group_id, fetched, "refilled reusable pool");
            }
            Err(err) => {
                warn!(table, group_id, error = %err, "reusable pool refill failed");
            }
        }
    }
}

/// Background loop that tops up a derived pool (CSS class, URL slug, or
/// emoji) by calling `generator` rather than fetching rows from
/// Postgres, since these values are synthesized, not stored.
pub async fn run_derived_refill(pool: Arc<ReusablePool<String>>, generator: fn() -> String, config: PoolConfig) {
    let mut ticker = tokio::time::interval(config.refill_interval);
    loop {
        ticker.tick().await;
        if pool.is_paused() {
            continue;
        }
        let current = pool.stats().len;
        if current >= config.low_watermark {
            continue;
        }
        let deficit = pool.target().saturating_sub(current);
        if deficit == 0 {
            continue;
        }
        let values: Vec<String> = (0..deficit).map(|_| generator()).collect();
        pool.append(values);
    }
}

/// Drains a group's paragraph pending set into the pool's bounded
/// channel. When Redis is configured, ids come from the group's current
/// batch's pending set (`RedisQueue::pop_pending`) and mark-used is left
/// entirely to `ParagraphPool::try_acquire`, which enqueues it only once
/// a render actually draws the paragraph — never at forward time, so a
/// crash between forwarding and rendering can't lose content.
///
/// Without Redis (no pending-set loader configured), falls back to
/// draining unconsumed rows straight from Postgres, which is simpler but
/// loses the "mark used only once actually rendered" guarantee.
pub async fn run_paragraph_consumer(
    pool: Arc<ParagraphPool>,
    store: Arc<dyn DataStore>,
    redis: Option<RedisQueue>,
    config: PoolConfig,
) {
    let group_id = pool.group_id();
    let mut ticker = tokio::time::interval(config.refill_interval);
    loop {
        ticker.tick().await;

        let ids = match &redis {
            Some(redis) => {
                let batch_id = pool.current_batch();
                match redis.pop_pending(group_id, batch_id, config.oneshot_drain_chunk).await {
                    Ok(ids) if ids.is_empty() => {
                        pool.advance_batch();
                        continue;
                    }
                    Ok(ids) => ids,
                    Err(err) => {
                        warn!(group_id, error = %err, "paragraph pending-set pop failed");
                        continue;
                    }
                }
            }
            None => match store.fetch_next_paragraph_batch(group_id, config.oneshot_drain_chunk).await {
                Ok(rows) => rows.into_iter().map(|r| r.id).collect(),
                Err(err) => {
                    warn!(group_id, error = %err, "paragraph batch fetch failed");
                    continue;
                }
            },
        };
        if ids.is_empty() {
            continue;
        }

        let rows = match store.fetch_paragraphs_by_id(&ids).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(group_id, error = %err, "paragraph body fetch failed");
                continue;
            }
        };

        for paragraph in rows {
            if pool.seen_before(paragraph.id) {
                continue;
            }
            if !pool.forward(paragraph.id, paragraph.body).await {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;
    use std::time::Duration;

    #[tokio::test]
    async fn reusable_refill_tops_up_below_watermark() {
        let pool = Arc::new(ReusablePool::new(vec!["seed".to_string()]));
        pool.resize(10);
        let store: Arc<dyn DataStore> = Arc::new(
            FakeStore::new().with_pool_rows("keywords", 1, &["rust", "async", "pool"]),
        );
        let config = PoolConfig {
            size: 10,
            refill_interval: Duration::from_millis(5),
            low_watermark: 5,
            ..PoolConfig::default()
        };

        let task = tokio::spawn(run_reusable_refill(
            pool.clone(),
            store,
            "keywords",
            1,
            config,
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        task.abort();

        assert!(pool.stats().len > 1);
    }

    #[tokio::test]
    async fn derived_refill_tops_up_with_generated_values() {
        let pool: Arc<ReusablePool<String>> = Arc::new(ReusablePool::new(Vec::new()));
        pool.resize(5);
        let config = PoolConfig {
            refill_interval: Duration::from_millis(5),
            low_watermark: 5,
            ..PoolConfig::default()
        };

        let task = tokio::spawn(run_derived_refill(
            pool.clone(),
            crate::pool::derived::random_emoji,
            config,
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        task.abort();

        assert!(pool.stats().len > 0);
    }

    #[tokio::test]
    async fn paragraph_consumer_without_redis_falls_back_to_postgres_drain() {
        let pool = Arc::new(ParagraphPool::new(1, 16, None));
        let store: Arc<dyn DataStore> = Arc::new(
            FakeStore::new().with_paragraphs(1, 1, &["first paragraph", "second paragraph"]),
        );
        let config = PoolConfig {
            refill_interval: Duration::from_millis(5),
            oneshot_drain_chunk: 16,
            ..PoolConfig::default()
        };

        let task = tokio::spawn(run_paragraph_consumer(pool.clone(), store, None, config));
        tokio::time::sleep(Duration::from_millis(30)).await;
        task.abort();

        assert_eq!(pool.try_acquire().unwrap(), "first paragraph");
        assert_eq!(pool.try_acquire().unwrap(), "second paragraph");
    }
}
