//! Object pools backing the render path: reusable pools for keywords,
//! titles, images, and the derived CSS-class/URL/emoji pools (drawn
//! repeatedly, round-robin) and a one-shot pool for paragraphs (each
//! consumed exactly once across the fleet).

pub mod bloom;
pub mod derived;
pub mod oneshot;
pub mod refill;
pub mod reusable;

pub use oneshot::ParagraphPool;
pub use reusable::ReusablePool;

use std::sync::Arc;

use crate::alerts::{AlertLevel, AlertSink};
use crate::error::RenderError;

/// Point-in-time pool occupancy, surfaced through the admin `/pool/*`
/// endpoints and consulted by the refill worker's low-watermark check.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub len: usize,
    pub capacity: usize,
    pub paused: bool,
    pub consumed: u64,
    pub refilled: u64,
    pub last_refill: i64,
    pub workers: usize,
}

/// The set of pools a single site group draws from at render time,
/// bundled so [`crate::render::RenderContext`] only needs one field.
pub struct RenderInputs {
    pub keywords: Arc<ReusablePool<String>>,
    pub titles: Arc<ReusablePool<String>>,
    pub images: Arc<ReusablePool<String>>,
    pub css_classes: Arc<ReusablePool<String>>,
    pub urls: Arc<ReusablePool<String>>,
    pub emojis: Arc<ReusablePool<String>>,
    pub paragraphs: Arc<ParagraphPool>,
    pub group_id: i64,
    pub alerts: Arc<AlertSink>,
}

impl RenderInputs {
    fn acquire_or_alert(&self, pool: &ReusablePool<String>, name: &'static str) -> Result<String, RenderError> {
        pool.acquire().ok_or_else(|| {
            self.alerts.fire(
                AlertLevel::Exhausted,
                format!("pool:{name}:{}", self.group_id),
                format!("{name} pool empty for group {}", self.group_id),
            );
            RenderError::PoolEmpty {
                group_id: self.group_id,
            }
        })
    }

    pub fn next_keyword(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.keywords, "keywords")
    }

    pub fn next_title(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.titles, "titles")
    }

    pub fn next_image(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.images, "images")
    }

    pub fn next_css_class(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.css_classes, "css_classes")
    }

    pub fn next_url(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.urls, "urls")
    }

    pub fn next_emoji(&self) -> Result<String, RenderError> {
        self.acquire_or_alert(&self.emojis, "emojis")
    }

    /// Draws a not-yet-rendered paragraph, or `ContentExhausted` if the
    /// group's one-shot pool has run dry and no new batch is ready yet.
    pub fn next_paragraph(&self) -> Result<String, RenderError> {
        self.paragraphs.try_acquire()
    }

    /// Every round-robin pool in this group's set, for admin actions
    /// (pause/resume/resize) that apply uniformly across all of them.
    pub fn reusable_pools(&self) -> [&Arc<ReusablePool<String>>; 6] {
        [
            &self.keywords,
            &self.titles,
            &self.images,
            &self.css_classes,
            &self.urls,
            &self.emojis,
        ]
    }
}
