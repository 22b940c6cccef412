//! Page cache: a bounded, multi-tenant cache of fully rendered page
//! bodies keyed by `(domain, spider_kind, path)`, with single-flight
//! rendering on miss and sampled approximate-LRU eviction when the
//! configured size budget is exceeded.

pub mod eviction;
pub mod persist;
pub mod singleflight;

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use crate::config::CacheConfig;
use crate::error::RenderError;
use crate::spider::SpiderKind;

use persist::DiskPersistence;
use singleflight::SingleFlight;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub domain: String,
    pub spider_kind: SpiderKind,
    pub path: String,
}

impl CacheKey {
    pub fn new(domain: impl Into<String>, spider_kind: SpiderKind, path: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            spider_kind,
            path: path.into(),
        }
    }
}

pub struct CacheEntry {
    pub body: Bytes,
    pub gzipped: bool,
    pub size: u64,
    /// Monotonic logical clock rather than a wall-clock timestamp: cheap
    /// to bump with a relaxed fetch_add on every hit and sufficient for
    /// approximate-LRU ranking.
    pub last_access: AtomicI64,
    pub hits: AtomicU64,
}

impl CacheEntry {
    fn new(body: Bytes, gzipped: bool) -> Self {
        let size = body.len() as u64;
        Self {
            body,
            gzipped,
            size,
            last_access: AtomicI64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    fn touch(&self, clock: i64) {
        self.last_access.store(clock, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// The bounded, single-flighted cache of rendered pages shared across
/// every request handler and the background evictor.
pub struct PageCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    single_flight: SingleFlight<CacheKey, Arc<CacheEntry>>,
    current_size: AtomicU64,
    clock: AtomicI64,
    persist: Option<Arc<DiskPersistence>>,
    config: CacheConfig,
}

impl PageCache {
    pub fn new(config: CacheConfig) -> Self {
        let persist = config
            .persist_to_disk
            .then(|| Arc::new(DiskPersistence::new(config.persist_dir.clone())));
        Self {
            entries: DashMap::new(),
            single_flight: SingleFlight::new(),
            current_size: AtomicU64::new(0),
            clock: AtomicI64::new(0),
            persist,
            config,
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.get(key)?.clone();
        let clock = self.clock.fetch_add(1, Ordering::Relaxed);
        entry.touch(clock);
        Some(entry)
    }

    /// Looks up `key`, and on miss renders exactly once per key even
    /// under concurrent requests, admitting the result into the cache
    /// before returning it to every waiter.
    pub async fn get_or_render<F, Fut>(
        &self,
        key: CacheKey,
        render: F,
    ) -> Result<Arc<CacheEntry>, RenderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Bytes, bool), RenderError>>,
    {
        if let Some(entry) = self.lookup(&key) {
            return Ok(entry);
        }

        // Admission happens inside the single-flight work closure itself,
        // not after `run` returns: that closure executes exactly once per
        // miss, while every waiter (leader included) reaches the code
        // after `run`, so admitting out here would double-count size for
        // every concurrent waiter on the same key.
        let key_for_admit = key.clone();
        self.single_flight
            .run(key, || async move {
                let (body, gzipped) = render().await?;
                let entry = Arc::new(CacheEntry::new(body, gzipped));
                self.admit(key_for_admit, Arc::clone(&entry));
                Ok(entry)
            })
            .await
    }

    fn admit(&self, key: CacheKey, entry: Arc<CacheEntry>) {
        if !self.config.enabled {
            return;
        }
        self.current_size.fetch_add(entry.size, Ordering::Relaxed);
        if let Some(persist) = &self.persist {
            let persist = Arc::clone(persist);
            let domain = key.domain.clone();
            let path = key.path.clone();
            let spider_kind = key.spider_kind;
            let body = entry.body.clone();
            tokio::spawn(async move {
                persist.write(spider_kind, &domain, &path, &body).await;
            });
        }
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
        }
    }

    /// Invalidates every cached page for `domain`, used by the admin
    /// `POST /cache/clear/:domain` endpoint.
    pub fn invalidate_domain(&self, domain: &str) {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().domain == domain)
            .map(|e| e.key().clone())
            .collect();
        for key in keys {
            self.invalidate(&key);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn entries(&self) -> &DashMap<CacheKey, Arc<CacheEntry>> {
        &self.entries
    }

    pub fn remove_raw(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.entries.remove(key).map(|(_, entry)| {
            self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
            entry
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::new("example.com", SpiderKind::Google, "/a")
    }

    #[tokio::test]
    async fn miss_then_renders_and_admits() {
        let cache = PageCache::new(CacheConfig::default());
        let entry = cache
            .get_or_render(key(), || async { Ok((Bytes::from_static(b"hi"), false)) })
            .await
            .unwrap();
        assert_eq!(&entry.body[..], b"hi");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn second_lookup_is_a_cache_hit() {
        let cache = PageCache::new(CacheConfig::default());
        cache
            .get_or_render(key(), || async { Ok((Bytes::from_static(b"hi"), false)) })
            .await
            .unwrap();
        let hit = cache.lookup(&key()).unwrap();
        assert_eq!(hit.hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_render_exactly_once() {
        let cache = Arc::new(PageCache::new(CacheConfig::default()));
        let render_count = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = Arc::clone(&cache);
            let render_count = Arc::clone(&render_count);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_render(key(), || {
                        let render_count = Arc::clone(&render_count);
                        async move {
                            render_count.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                            Ok((Bytes::from_static(b"hi"), false))
                        }
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(render_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn invalidate_domain_removes_only_matching_entries() {
        let cache = PageCache::new(CacheConfig::default());
        cache
            .get_or_render(
                CacheKey::new("a.com", SpiderKind::Google, "/x"),
                || async { Ok((Bytes::from_static(b"a"), false)) },
            )
            .await
            .unwrap();
        cache
            .get_or_render(
                CacheKey::new("b.com", SpiderKind::Google, "/y"),
                || async { Ok((Bytes::from_static(b"b"), false)) },
            )
            .await
            .unwrap();

        cache.invalidate_domain("a.com");
        assert_eq!(cache.len(), 1);
    }
}
