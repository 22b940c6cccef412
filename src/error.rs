//! Crate-wide error types for the render hot path.
//!
//! Each leaf error maps to exactly one HTTP outcome (see `api::responses`);
//! the mapping lives next to the handlers, not here, so this module stays a
//! plain description of what can go wrong.

use thiserror::Error;

/// Errors that can occur while serving a `/page` request.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The User-Agent did not classify as a known spider.
    #[error("request did not classify as a spider")]
    NotSpider,

    /// `domain` has no matching `Site`.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// The site's template failed to compile or could not be found.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// A reusable pool was empty at acquire time.
    #[error("pool empty for group {group_id}")]
    PoolEmpty {
        /// Group that ran dry.
        group_id: i64,
    },

    /// The paragraph pool for this site's article group is exhausted and no
    /// further batch is available.
    #[error("content pool exhausted for group {group_id}")]
    ContentExhausted {
        /// Group that is exhausted.
        group_id: i64,
    },

    /// A cold-resolve query against Postgres failed.
    #[error("upstream query failed: {0}")]
    UpstreamQuery(String),

    /// gzip compression failed; caller should fall back to the raw body.
    #[error("gzip failure: {0}")]
    Gzip(String),
}

/// Errors raised while compiling or looking up a template.
#[derive(Error, Debug, Clone)]
pub enum TemplateError {
    /// No template row matches `(name, site_group_id)`.
    #[error("template not found: {name} (group {site_group_id})")]
    NotFound {
        /// Template name.
        name: String,
        /// Site group id the template was requested for.
        site_group_id: i64,
    },

    /// The template source failed to parse into a compiled node sequence.
    #[error("template compile error: {0}")]
    Compile(String),
}

/// Errors surfaced by the store layer (Postgres/Redis).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Postgres query failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Redis command failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
