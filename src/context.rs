//! Process-wide application context: everything built once in `main` and
//! shared, via a single `Arc`, across the router state and every
//! background task. No ambient globals — anything a handler or worker
//! needs comes through this struct.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use crate::alerts::{AlertLevel, AlertSink};
use crate::cache::PageCache;
use crate::config::AppConfig;
use crate::pool::{derived, refill, ParagraphPool, RenderInputs, ReusablePool};
use crate::site::{SiteResolver, TemplateStore};
use crate::spider::{Classifier, DnsVerifier, Stats as SpiderStats};
use crate::store::{DataStore, PostgresStore, RedisQueue};

pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn DataStore>,
    pub redis: Option<RedisQueue>,
    pub site_resolver: SiteResolver,
    pub template_store: TemplateStore,
    pub classifier: Classifier,
    pub dns_verifier: Option<Arc<DnsVerifier>>,
    pub spider_stats: Arc<SpiderStats>,
    pub page_cache: Arc<PageCache>,
    pub alerts: Arc<AlertSink>,
    group_pools: DashMap<i64, Arc<RenderInputs>>,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let postgres = PostgresStore::connect(&config.database).await?;
        let store: Arc<dyn DataStore> = Arc::new(postgres);
        let redis = RedisQueue::connect(&config.redis_url).await?;

        let ctx = Self::assemble(config, store, Some(redis))?;
        ctx.spawn_background_tasks();
        info!("application context assembled");
        Ok(ctx)
    }

    /// Builds a context around an already-constructed store with no live
    /// Redis connection and no background workers spawned, so tests can
    /// exercise the render path against a `FakeStore` with no network
    /// dependencies at all.
    pub fn build_for_test(config: AppConfig, store: Arc<dyn DataStore>) -> anyhow::Result<Arc<Self>> {
        Self::assemble(config, store, None)
    }

    fn assemble(
        config: AppConfig,
        store: Arc<dyn DataStore>,
        redis: Option<RedisQueue>,
    ) -> anyhow::Result<Arc<Self>> {
        let spider_stats = SpiderStats::new();
        let dns_verifier = if config.spider.dns_verify_enabled {
            Some(Arc::new(DnsVerifier::new(&config.spider, Arc::clone(&spider_stats))?))
        } else {
            None
        };
        let alerts = AlertSink::new(Duration::from_secs(60));

        Ok(Arc::new(Self {
            classifier: Classifier::new(&config.spider, Arc::clone(&spider_stats)),
            dns_verifier,
            spider_stats,
            site_resolver: SiteResolver::new(Arc::clone(&store)),
            template_store: TemplateStore::new(
                Arc::clone(&store),
                config.seo.encoding_mix_ratio,
                config.seo.emoji_count_min,
                config.seo.emoji_count_max,
                Arc::clone(&alerts),
            ),
            page_cache: Arc::new(PageCache::new(config.cache.clone())),
            alerts,
            redis,
            store,
            group_pools: DashMap::new(),
            config,
        }))
    }

    fn spawn_background_tasks(self: &Arc<Self>) {
        let cache = Arc::clone(&self.page_cache);
        tokio::spawn(crate::cache::eviction::run_evictor(
            cache,
            Duration::from_secs(5),
        ));

        let Some(redis) = self.redis.clone() else {
            return;
        };
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                ticker.tick().await;
                if let Ok(ids) = redis.drain_mark_used(256).await {
                    if !ids.is_empty() {
                        if let Err(err) = ctx.store.mark_paragraphs_used(&ids).await {
                            ctx.alerts.fire(
                                AlertLevel::Warning,
                                "mark_used_drain",
                                format!("failed to flush mark-used batch: {err}"),
                            );
                        }
                    }
                }
            }
        });
    }

    /// Returns the pool set for a site group, lazily building it and
    /// spawning its refill/consumer workers on first access. Also the
    /// target of the admin `POST /pool/warmup` endpoint, which just calls
    /// this ahead of the group's first real request.
    pub fn render_inputs_for(self: &Arc<Self>, group_id: i64) -> Arc<RenderInputs> {
        if let Some(existing) = self.group_pools.get(&group_id) {
            return Arc::clone(&existing);
        }

        let target = self.config.pool.size;
        let keywords = Arc::new(ReusablePool::new(Vec::new()));
        let titles = Arc::new(ReusablePool::new(Vec::new()));
        let images = Arc::new(ReusablePool::new(Vec::new()));
        let css_classes = Arc::new(ReusablePool::new(Vec::new()));
        let urls = Arc::new(ReusablePool::new(Vec::new()));
        let emojis = Arc::new(ReusablePool::new(Vec::new()));
        for pool in [&keywords, &titles, &images, &css_classes, &urls, &emojis] {
            pool.resize(target);
        }

        let paragraphs = Arc::new(ParagraphPool::new(
            group_id,
            self.config.pool.oneshot_channel_capacity,
            self.redis.clone(),
        ));

        self.spawn_reusable_pool_workers("keywords", group_id, Arc::clone(&keywords));
        self.spawn_reusable_pool_workers("titles", group_id, Arc::clone(&titles));
        self.spawn_reusable_pool_workers("images", group_id, Arc::clone(&images));
        self.spawn_derived_pool_workers(derived::generate_css_class, Arc::clone(&css_classes));
        self.spawn_derived_pool_workers(derived::generate_url_slug, Arc::clone(&urls));
        self.spawn_derived_pool_workers(derived::random_emoji, Arc::clone(&emojis));

        let ctx = Arc::clone(self);
        let paragraphs_for_worker = Arc::clone(&paragraphs);
        let redis = self.redis.clone();
        let pool_config = self.config.pool.clone();
        paragraphs.register_worker();
        tokio::spawn(async move {
            refill::run_paragraph_consumer(
                paragraphs_for_worker,
                Arc::clone(&ctx.store),
                redis,
                pool_config,
            )
            .await;
        });

        let inputs = Arc::new(RenderInputs {
            keywords,
            titles,
            images,
            css_classes,
            urls,
            emojis,
            paragraphs,
            group_id,
            alerts: Arc::clone(&self.alerts),
        });
        self.group_pools.insert(group_id, Arc::clone(&inputs));
        inputs
    }

    fn spawn_reusable_pool_workers(
        self: &Arc<Self>,
        table: &'static str,
        group_id: i64,
        pool: Arc<ReusablePool<String>>,
    ) {
        let store = Arc::clone(&self.store);
        let config = self.config.pool.clone();
        pool.register_worker();
        tokio::spawn(refill::run_reusable_refill(pool, store, table, group_id, config));
    }

    fn spawn_derived_pool_workers(
        self: &Arc<Self>,
        generator: fn() -> String,
        pool: Arc<ReusablePool<String>>,
    ) {
        let config = self.config.pool.clone();
        pool.register_worker();
        tokio::spawn(refill::run_derived_refill(pool, generator, config));
    }

    /// Pauses every pool in `group_id`'s set, or every materialized
    /// group's pools when `group_id` is `None`. Used by `POST
    /// /pool/pause`.
    pub fn pause_pools(&self, group_id: Option<i64>) {
        self.for_each_group(group_id, |inputs| {
            for pool in inputs.reusable_pools() {
                pool.pause();
            }
        });
    }

    /// Counterpart to [`Self::pause_pools`], used by `POST /pool/resume`.
    pub fn resume_pools(&self, group_id: Option<i64>) {
        self.for_each_group(group_id, |inputs| {
            for pool in inputs.reusable_pools() {
                pool.resume();
            }
        });
    }

    /// Sets the refill target for every reusable pool in `group_id`'s
    /// set. A no-op if the group hasn't been materialized yet. Used by
    /// `POST /pool/resize`.
    pub fn resize_pools(&self, group_id: i64, size: usize) {
        self.for_each_group(Some(group_id), |inputs| {
            for pool in inputs.reusable_pools() {
                pool.resize(size);
            }
        });
    }

    fn for_each_group(&self, group_id: Option<i64>, f: impl Fn(&RenderInputs)) {
        match group_id {
            Some(id) => {
                if let Some(inputs) = self.group_pools.get(&id) {
                    f(&inputs);
                }
            }
            None => {
                for entry in self.group_pools.iter() {
                    f(entry.value());
                }
            }
        }
    }
}
