use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use moka::future::Cache;

use crate::config::SpiderConfig;

use super::{SpiderKind, Stats};

/// Confirms a classified request by resolving the client IP's PTR record
/// and checking the hostname against the engine's known suffixes, then
/// forward-resolving that hostname back to the original IP. This is the
/// same double-lookup real search engines publish as the canonical way to
/// authenticate their own crawlers, and it is the only part of
/// classification that touches the network, so its result is cached.
pub struct DnsVerifier {
    resolver: TokioAsyncResolver,
    cache: Cache<(IpAddr, SpiderKind), bool>,
    timeout: Duration,
    stats: Arc<Stats>,
}

impl DnsVerifier {
    pub fn new(config: &SpiderConfig, stats: Arc<Stats>) -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(config.dns_cache_ttl)
            .build();
        Ok(Self {
            resolver,
            cache,
            timeout: config.dns_timeout,
            stats,
        })
    }

    /// Returns `true` if `ip` is verified as belonging to `kind`, consulting
    /// the cache first and only falling back to a live double-lookup on a
    /// miss.
    pub async fn verify(&self, ip: IpAddr, kind: SpiderKind, suffixes: &[String]) -> bool {
        if let Some(cached) = self.cache.get(&(ip, kind)).await {
            return cached;
        }
        self.stats.record_dns_attempt();
        let verified = match tokio::time::timeout(self.timeout, self.verify_uncached(ip, suffixes)).await {
            Ok(verified) => {
                if verified {
                    self.stats.record_dns_pass();
                }
                verified
            }
            Err(_) => {
                self.stats.record_dns_timeout();
                false
            }
        };
        self.cache.insert((ip, kind), verified).await;
        verified
    }

    async fn verify_uncached(&self, ip: IpAddr, suffixes: &[String]) -> bool {
        let hostnames = match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup,
            Err(_) => return false,
        };

        for name in hostnames.iter() {
            let host = name.to_string().trim_end_matches('.').to_ascii_lowercase();
            if !suffixes.iter().any(|suffix| host.ends_with(suffix.as_str())) {
                continue;
            }
            if self.forward_matches(&host, ip).await {
                return true;
            }
        }
        false
    }

    async fn forward_matches(&self, host: &str, expected: IpAddr) -> bool {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().any(|resolved| resolved == expected),
            Err(_) => false,
        }
    }
}

/// Shared handle stored in [`crate::context::AppContext`]; DNS verification
/// is optional, so the context holds `Option<Arc<DnsVerifier>>`.
pub type SharedDnsVerifier = Arc<DnsVerifier>;
