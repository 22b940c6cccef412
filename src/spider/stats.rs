//! Spider-detector counters surfaced through `/health` and the admin
//! surface, so an operator can see classification volume per engine and
//! how often DNS verification actually confirms a claimed crawler
//! without reaching for a metrics backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use super::SpiderKind;

/// Process-lifetime counters for the spider detector. Cheap enough to
/// bump on every request: one `DashMap` entry lookup for the
/// per-engine tally plus a handful of relaxed atomic increments for DNS
/// verification outcomes.
#[derive(Default)]
pub struct Stats {
    classifications: DashMap<SpiderKind, AtomicU64>,
    dns_attempted: AtomicU64,
    dns_passed: AtomicU64,
    dns_timed_out: AtomicU64,
}

impl Stats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_classification(&self, kind: SpiderKind) {
        self.classifications
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dns_attempt(&self) {
        self.dns_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dns_pass(&self) {
        self.dns_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dns_timeout(&self) {
        self.dns_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let classifications = self
            .classifications
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();
        StatsSnapshot {
            classifications,
            dns_attempted: self.dns_attempted.load(Ordering::Relaxed),
            dns_passed: self.dns_passed.load(Ordering::Relaxed),
            dns_timed_out: self.dns_timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`], serializable for `/health`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub classifications: HashMap<String, u64>,
    pub dns_attempted: u64,
    pub dns_passed: u64,
    pub dns_timed_out: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_classifications_per_kind() {
        let stats = Stats::new();
        stats.record_classification(SpiderKind::Google);
        stats.record_classification(SpiderKind::Google);
        stats.record_classification(SpiderKind::Baidu);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.classifications.get("google"), Some(&2));
        assert_eq!(snapshot.classifications.get("baidu"), Some(&1));
    }

    #[test]
    fn records_dns_outcomes() {
        let stats = Stats::new();
        stats.record_dns_attempt();
        stats.record_dns_attempt();
        stats.record_dns_pass();
        stats.record_dns_timeout();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dns_attempted, 2);
        assert_eq!(snapshot.dns_passed, 1);
        assert_eq!(snapshot.dns_timed_out, 1);
    }
}
