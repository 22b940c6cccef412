//! Site and template resolution: mapping an inbound domain to the
//! `Site` row that governs which content groups and templates back it,
//! and caching compiled templates so the render path never touches
//! Postgres on a warm path.

mod resolver;
mod templates;

pub use resolver::SiteResolver;
pub use templates::TemplateStore;

use serde::{Deserialize, Serialize};

/// A configured site, identified by its public-facing domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub site_group_id: i64,
    pub template_name: String,
    pub active: bool,
}
