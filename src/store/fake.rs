use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RenderError;
use crate::site::Site;

use super::{DataStore, ParagraphRow, PoolRow};

/// In-memory stand-in for [`super::PostgresStore`], used by integration
/// tests so the render path can be exercised without a real database or
/// Redis instance.
#[derive(Default)]
pub struct FakeStore {
    sites: Mutex<Vec<Site>>,
    templates: Mutex<Vec<(i64, String, String)>>,
    pools: Mutex<Vec<(String, i64, PoolRow)>>,
    paragraphs: Mutex<Vec<ParagraphRow>>,
    next_id: AtomicI64,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn with_site(self, site: Site) -> Self {
        self.sites.lock().push(site);
        self
    }

    pub fn with_template(self, site_group_id: i64, name: &str, source: &str) -> Self {
        self.templates
            .lock()
            .push((site_group_id, name.to_string(), source.to_string()));
        self
    }

    pub fn with_pool_rows(self, table: &str, group_id: i64, values: &[&str]) -> Self {
        let mut pools = self.pools.lock();
        for value in values {
            let id = self.alloc_id();
            pools.push((
                table.to_string(),
                group_id,
                PoolRow {
                    id,
                    value: value.to_string(),
                },
            ));
        }
        drop(pools);
        self
    }

    pub fn with_paragraphs(self, group_id: i64, batch_id: i64, bodies: &[&str]) -> Self {
        let mut paragraphs = self.paragraphs.lock();
        for body in bodies {
            let id = self.alloc_id();
            let _ = group_id;
            paragraphs.push(ParagraphRow {
                id,
                batch_id,
                body: body.to_string(),
            });
        }
        drop(paragraphs);
        self
    }
}

#[async_trait]
impl DataStore for FakeStore {
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, RenderError> {
        Ok(self
            .sites
            .lock()
            .iter()
            .find(|s| s.domain == domain)
            .cloned())
    }

    async fn load_template_source(
        &self,
        site_group_id: i64,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        Ok(self
            .templates
            .lock()
            .iter()
            .find(|(group, n, _)| *group == site_group_id && n == name)
            .map(|(_, _, source)| source.clone()))
    }

    async fn fetch_pool_batch(
        &self,
        table: &str,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<PoolRow>, RenderError> {
        Ok(self
            .pools
            .lock()
            .iter()
            .filter(|(t, g, _)| t == table && *g == group_id)
            .take(limit)
            .map(|(_, _, row)| row.clone())
            .collect())
    }

    async fn fetch_next_paragraph_batch(
        &self,
        _group_id: i64,
        limit: usize,
    ) -> Result<Vec<ParagraphRow>, RenderError> {
        Ok(self.paragraphs.lock().iter().take(limit).cloned().collect())
    }

    async fn mark_paragraphs_used(&self, ids: &[i64]) -> Result<(), RenderError> {
        self.paragraphs.lock().retain(|p| !ids.contains(&p.id));
        Ok(())
    }

    async fn fetch_paragraphs_by_id(&self, ids: &[i64]) -> Result<Vec<ParagraphRow>, RenderError> {
        Ok(self
            .paragraphs
            .lock()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
