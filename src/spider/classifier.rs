use std::sync::Arc;

use crate::config::SpiderConfig;

use super::{Classification, SpiderKind, Stats};

/// Matches a User-Agent header against the configured engine signatures.
///
/// Matching is case-insensitive substring search, same as the simple
/// crawler fingerprinting most SEO middleware uses in production: the
/// UA space is adversarial and low-volume enough that a regex engine or
/// trie would be overkill.
pub struct Classifier {
    signatures: Vec<(SpiderKind, Vec<String>)>,
    stats: Arc<Stats>,
}

impl Classifier {
    pub fn new(config: &SpiderConfig, stats: Arc<Stats>) -> Self {
        let signatures = config
            .engines
            .iter()
            .map(|engine| {
                let lowered = engine
                    .ua_substrings
                    .iter()
                    .map(|s| s.to_ascii_lowercase())
                    .collect();
                (engine.kind, lowered)
            })
            .collect();
        Self { signatures, stats }
    }

    /// Classify a raw User-Agent header value. Returns `None` when no
    /// configured engine's substrings match, meaning the request is not a
    /// recognized spider.
    pub fn classify(&self, user_agent: &str) -> Option<Classification> {
        let lowered = user_agent.to_ascii_lowercase();
        for (kind, substrings) in &self.signatures {
            if substrings.iter().any(|needle| lowered.contains(needle)) {
                self.stats.record_classification(*kind);
                return Some(Classification {
                    kind: *kind,
                    dns_verified: None,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&SpiderConfig::default(), Stats::new())
    }

    #[test]
    fn matches_known_googlebot_ua() {
        let result = classifier()
            .classify("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)");
        assert_eq!(result.unwrap().kind, SpiderKind::Google);
    }

    #[test]
    fn matches_are_case_insensitive() {
        let result = classifier().classify("BAIDUSPIDER/2.0");
        assert_eq!(result.unwrap().kind, SpiderKind::Baidu);
    }

    #[test]
    fn ordinary_browser_does_not_classify() {
        let result = classifier().classify(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0",
        );
        assert!(result.is_none());
    }

    #[test]
    fn empty_user_agent_does_not_classify() {
        assert!(classifier().classify("").is_none());
    }

    #[test]
    fn a_match_records_a_classification_stat() {
        let stats = Stats::new();
        let classifier = Classifier::new(&SpiderConfig::default(), Arc::clone(&stats));
        classifier.classify("Googlebot/2.1");
        assert_eq!(stats.snapshot().classifications.get("google"), Some(&1));
    }
}
