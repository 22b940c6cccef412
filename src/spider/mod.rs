//! Spider classification: deciding whether an inbound request is a search
//! engine crawler worth rendering a synthesized page for, as opposed to an
//! ordinary browser that should see a 404.

mod classifier;
mod dns_verify;
mod stats;

pub use classifier::Classifier;
pub use dns_verify::DnsVerifier;
pub use stats::{Stats, StatsSnapshot};

use serde::{Deserialize, Serialize};

/// The set of crawlers this service recognizes by User-Agent substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpiderKind {
    Baidu,
    Google,
    Bing,
    Sogou,
    Qihoo360,
    Toutiao,
}

impl SpiderKind {
    /// Stable lowercase identifier, used as a cache-key component and in
    /// persisted page paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpiderKind::Baidu => "baidu",
            SpiderKind::Google => "google",
            SpiderKind::Bing => "bing",
            SpiderKind::Sogou => "sogou",
            SpiderKind::Qihoo360 => "qihoo360",
            SpiderKind::Toutiao => "toutiao",
        }
    }
}

impl std::fmt::Display for SpiderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a request, distinct from the DNS-verified result
/// because verification is optional and asynchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: SpiderKind,
    pub dns_verified: Option<bool>,
}
