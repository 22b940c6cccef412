use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::seq::IteratorRandom;
use tracing::info;

use super::PageCache;

/// Background evictor: wakes on an interval, and when the cache exceeds
/// its high watermark, repeatedly samples `sample_size` random entries
/// and evicts the least-recently-touched of the sample. This is the
/// sampled approximate-LRU approach Redis itself uses for `maxmemory`
/// eviction, trading exactness for O(sample_size) work per eviction
/// instead of maintaining a globally ordered access list under a lock
/// every render has to contend for.
pub async fn run_evictor(cache: Arc<PageCache>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        evict_to_low_watermark(&cache);
    }
}

fn evict_to_low_watermark(cache: &PageCache) {
    let config = cache.config();
    if !config.enabled {
        return;
    }
    let high = (config.max_size_bytes as f64 * config.high_watermark_ratio) as u64;
    let low = (config.max_size_bytes as f64 * config.low_watermark_ratio) as u64;

    if cache.current_size() < high {
        return;
    }

    let mut evicted = 0usize;
    let mut rng = rand::thread_rng();
    while cache.current_size() > low {
        let sample: Vec<_> = cache
            .entries()
            .iter()
            .map(|e| e.key().clone())
            .choose_multiple(&mut rng, config.eviction_sample_size);
        if sample.is_empty() {
            break;
        }
        let victim = sample
            .into_iter()
            .filter_map(|key| {
                cache
                    .entries()
                    .get(&key)
                    .map(|entry| (key, entry.last_access.load(Ordering::Relaxed)))
            })
            .min_by_key(|(_, last_access)| *last_access)
            .map(|(key, _)| key);

        match victim {
            Some(key) => {
                cache.remove_raw(&key);
                evicted += 1;
            }
            None => break,
        }
    }
    if evicted > 0 {
        info!(evicted, current_size = cache.current_size(), "evicted cache entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::config::CacheConfig;
    use crate::spider::SpiderKind;
    use bytes::Bytes;

    #[tokio::test]
    async fn eviction_brings_cache_under_low_watermark() {
        let config = CacheConfig {
            max_size_bytes: 1000,
            high_watermark_ratio: 0.5,
            low_watermark_ratio: 0.2,
            eviction_sample_size: 4,
            ..CacheConfig::default()
        };
        let cache = PageCache::new(config);
        for i in 0..20 {
            cache
                .get_or_render(
                    CacheKey::new("example.com", SpiderKind::Google, format!("/{i}")),
                    || async move { Ok((Bytes::from(vec![0u8; 50]), false)) },
                )
                .await
                .unwrap();
        }
        assert!(cache.current_size() >= 500);

        evict_to_low_watermark(&cache);
        assert!(cache.current_size() <= 200);
    }
}
