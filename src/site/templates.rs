use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::alerts::{AlertLevel, AlertSink};
use crate::error::{RenderError, TemplateError};
use crate::render::template::{self, CompiledTemplate};
use crate::store::DataStore;

/// Caches compiled templates keyed by `(site_group_id, name)`, compiling
/// on first use and single-flighting concurrent misses through moka's
/// `try_get_with` so a cold template never gets parsed twice
/// concurrently.
///
/// Failures (missing row, compile error) are cached briefly in a
/// separate negative cache so a persistently broken template doesn't
/// get re-queried and re-compiled on every request while it stays
/// broken, and fire an operator alert since a template error means a
/// site is serving nothing until someone fixes the row.
pub struct TemplateStore {
    store: Arc<dyn DataStore>,
    cache: Cache<(i64, String), Arc<CompiledTemplate>>,
    negative: Cache<(i64, String), TemplateError>,
    encoding_mix_ratio: f64,
    emoji_min: usize,
    emoji_max: usize,
    alerts: Arc<AlertSink>,
}

impl TemplateStore {
    pub fn new(
        store: Arc<dyn DataStore>,
        encoding_mix_ratio: f64,
        emoji_min: usize,
        emoji_max: usize,
        alerts: Arc<AlertSink>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(600))
            .build();
        let negative = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(10))
            .build();
        Self {
            store,
            cache,
            negative,
            encoding_mix_ratio,
            emoji_min,
            emoji_max,
            alerts,
        }
    }

    pub async fn resolve(
        &self,
        site_group_id: i64,
        name: &str,
    ) -> Result<Arc<CompiledTemplate>, RenderError> {
        let key = (site_group_id, name.to_string());

        if let Some(cached_err) = self.negative.get(&key).await {
            return Err(RenderError::Template(cached_err));
        }

        let store = Arc::clone(&self.store);
        let name_owned = name.to_string();
        let mix_ratio = self.encoding_mix_ratio;
        let (emoji_min, emoji_max) = (self.emoji_min, self.emoji_max);

        let result = self
            .cache
            .try_get_with(key.clone(), async move {
                let source = store
                    .load_template_source(site_group_id, &name_owned)
                    .await?
                    .ok_or_else(|| {
                        RenderError::Template(TemplateError::NotFound {
                            name: name_owned.clone(),
                            site_group_id,
                        })
                    })?;
                let compiled = template::compile(&source, mix_ratio, emoji_min, emoji_max)?;
                Ok::<_, RenderError>(Arc::new(compiled))
            })
            .await
            .map_err(|err: Arc<RenderError>| match &*err {
                RenderError::Template(t) => RenderError::Template(t.clone()),
                other => RenderError::UpstreamQuery(other.to_string()),
            });

        if let Err(RenderError::Template(template_err)) = &result {
            self.negative.insert(key, template_err.clone()).await;
            self.alerts.fire(
                AlertLevel::Warning,
                format!("template:{site_group_id}:{name}"),
                format!("template resolution failed: {template_err}"),
            );
        }

        result
    }

    pub async fn invalidate(&self, site_group_id: i64, name: &str) {
        let key = (site_group_id, name.to_string());
        self.cache.invalidate(&key).await;
        self.negative.invalidate(&key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;
    use std::time::Duration as StdDuration;

    fn alerts() -> Arc<AlertSink> {
        AlertSink::new(StdDuration::from_secs(60))
    }

    #[tokio::test]
    async fn compiles_and_caches_template() {
        let store: Arc<dyn DataStore> = Arc::new(
            FakeStore::new().with_template(1, "default", "<p>{{title}}</p>"),
        );
        let templates = TemplateStore::new(store, 0.5, 0, 2, alerts());
        let compiled = templates.resolve(1, "default").await.unwrap();
        assert_eq!(compiled.nodes.len(), 3);
    }

    #[tokio::test]
    async fn missing_template_surfaces_not_found() {
        let store: Arc<dyn DataStore> = Arc::new(FakeStore::new());
        let templates = TemplateStore::new(store, 0.5, 0, 2, alerts());
        let err = templates.resolve(1, "missing").await.unwrap_err();
        assert!(matches!(
            err,
            RenderError::Template(TemplateError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_lookups_of_a_failing_template_hit_the_negative_cache() {
        let store: Arc<dyn DataStore> = Arc::new(FakeStore::new());
        let templates = TemplateStore::new(store, 0.5, 0, 2, alerts());
        templates.resolve(1, "missing").await.unwrap_err();
        assert!(templates.negative.get(&(1, "missing".to_string())).await.is_some());
    }
}
