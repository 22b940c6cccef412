//! Alerting for conditions an operator needs to know about but that
//! don't belong on the render hot path: pool exhaustion, paragraph
//! starvation, and similar degraded-but-not-down states. Fans out over a
//! broadcast channel so any number of subscribers (a log sink, a metrics
//! exporter, a future webhook) can listen without the alerting site
//! blocking on delivery.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub source: String,
    pub message: String,
}

/// Broadcasts alerts and de-duplicates repeats of the same `(source,
/// level)` pair within a cooldown window, so a pool stuck empty for ten
/// minutes produces one log line and one broadcast event, not a
/// thousand.
pub struct AlertSink {
    sender: broadcast::Sender<Alert>,
    last_fired: DashMap<(String, &'static str), tokio::time::Instant>,
    cooldown: Duration,
}

impl AlertSink {
    pub fn new(cooldown: Duration) -> Arc<Self> {
        let (sender, _) = broadcast::channel(256);
        Arc::new(Self {
            sender,
            last_fired: DashMap::new(),
            cooldown,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    pub fn fire(&self, level: AlertLevel, source: impl Into<String>, message: impl Into<String>) {
        let source = source.into();
        let level_key = match level {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Exhausted => "exhausted",
        };
        let key = (source.clone(), level_key);
        let now = tokio::time::Instant::now();

        if let Some(last) = self.last_fired.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                return;
            }
        }
        self.last_fired.insert(key, now);

        let message = message.into();
        match level {
            AlertLevel::Info => info!(source, "{message}"),
            AlertLevel::Warning => warn!(source, "{message}"),
            AlertLevel::Exhausted => error!(source, "{message}"),
        }
        let _ = self.sender.send(Alert {
            level,
            source,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_alerts_within_cooldown_are_suppressed() {
        let sink = AlertSink::new(Duration::from_secs(60));
        let mut receiver = sink.subscribe();

        sink.fire(AlertLevel::Warning, "pool:keywords", "low watermark");
        sink.fire(AlertLevel::Warning, "pool:keywords", "low watermark again");

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.message, "low watermark");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn different_sources_are_not_deduplicated_against_each_other() {
        let sink = AlertSink::new(Duration::from_secs(60));
        let mut receiver = sink.subscribe();
        sink.fire(AlertLevel::Exhausted, "pool:a", "empty");
        sink.fire(AlertLevel::Exhausted, "pool:b", "empty");
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_ok());
    }
}
