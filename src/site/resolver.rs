use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::store::DataStore;

use super::Site;

/// Caches domain -> [`Site`] lookups. Positive entries never expire on
/// their own — a resolved site is correct until an admin explicitly
/// invalidates it — while unknown domains are cached briefly in a
/// separate cache so a spam of bogus Host headers never hammers
/// Postgres without pinning a permanent entry for a domain that might
/// start resolving tomorrow.
pub struct SiteResolver {
    store: Arc<dyn DataStore>,
    positive: Cache<String, Site>,
    negative: Cache<String, ()>,
}

impl SiteResolver {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let positive = Cache::builder().max_capacity(200_000).build();
        let negative = Cache::builder()
            .max_capacity(200_000)
            .time_to_live(Duration::from_secs(30))
            .build();
        Self {
            store,
            positive,
            negative,
        }
    }

    pub async fn resolve(&self, domain: &str) -> Result<Option<Site>, crate::error::RenderError> {
        if let Some(site) = self.positive.get(domain).await {
            return Ok(Some(site));
        }
        if self.negative.get(domain).await.is_some() {
            return Ok(None);
        }

        match self.store.find_site_by_domain(domain).await? {
            Some(site) => {
                self.positive.insert(domain.to_string(), site.clone()).await;
                Ok(Some(site))
            }
            None => {
                self.negative.insert(domain.to_string(), ()).await;
                Ok(None)
            }
        }
    }

    pub async fn invalidate(&self, domain: &str) {
        self.positive.invalidate(domain).await;
        self.negative.invalidate(domain).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;

    fn site(domain: &str) -> Site {
        Site {
            id: 1,
            domain: domain.to_string(),
            site_group_id: 1,
            template_name: "default".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn resolves_known_domain() {
        let store: Arc<dyn DataStore> =
            Arc::new(FakeStore::new().with_site(site("example.com")));
        let resolver = SiteResolver::new(store);
        let resolved = resolver.resolve("example.com").await.unwrap();
        assert_eq!(resolved.unwrap().domain, "example.com");
    }

    #[tokio::test]
    async fn unknown_domain_resolves_to_none_and_is_cached() {
        let store: Arc<dyn DataStore> = Arc::new(FakeStore::new());
        let resolver = SiteResolver::new(store);
        assert!(resolver.resolve("nope.example").await.unwrap().is_none());
        assert!(resolver.resolve("nope.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_clears_both_positive_and_negative_entries() {
        let store: Arc<dyn DataStore> =
            Arc::new(FakeStore::new().with_site(site("example.com")));
        let resolver = SiteResolver::new(store);
        resolver.resolve("example.com").await.unwrap();
        resolver.invalidate("example.com").await;
        assert!(resolver.positive.get("example.com").await.is_none());
    }
}
