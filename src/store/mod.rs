//! Storage abstraction over Postgres and Redis.
//!
//! The render path depends on the [`DataStore`] trait rather than
//! concrete `sqlx`/`redis` types, the same seam the teacher's
//! `HealthCheck` trait drew around its connection pool: production runs
//! against [`postgres::PostgresStore`], tests run against
//! [`fake::FakeStore`] with no network or services required.

mod fake;
mod postgres;
mod redis_store;

pub use fake::FakeStore;
pub use postgres::PostgresStore;
pub use redis_store::RedisQueue;

use async_trait::async_trait;

use crate::error::{RenderError, StoreError};
use crate::site::Site;

/// A row drawn from a reusable (repeatable) content pool: keywords,
/// images, titles. Each variant the render path needs is fetched by
/// group id and returned as a batch for the caller to shuffle into an
/// in-memory pool.
#[derive(Debug, Clone)]
pub struct PoolRow {
    pub id: i64,
    pub value: String,
}

/// A single paragraph drawn from the one-shot content pool, consumed
/// exactly once across the whole fleet.
#[derive(Debug, Clone)]
pub struct ParagraphRow {
    pub id: i64,
    pub batch_id: i64,
    pub body: String,
}

/// Everything the render and refill paths need from persistent storage.
/// Implemented against Postgres in production and an in-memory fixture in
/// tests.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, RenderError>;

    async fn load_template_source(&self, site_group_id: i64, name: &str)
        -> Result<Option<String>, RenderError>;

    /// `SELECT ... WHERE group_id = ? AND status = 1 ORDER BY RANDOM() LIMIT ?`
    /// equivalent, used to refill reusable keyword/image/title pools.
    async fn fetch_pool_batch(
        &self,
        table: &str,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<PoolRow>, RenderError>;

    /// Fetches the next unconsumed paragraph batch for a group, used by the
    /// content-pool consumer to refill its bounded channel.
    async fn fetch_next_paragraph_batch(
        &self,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<ParagraphRow>, RenderError>;

    /// Marks paragraphs as consumed so they are never served again.
    async fn mark_paragraphs_used(&self, ids: &[i64]) -> Result<(), RenderError>;

    /// Fetches paragraph bodies for a known set of ids, used by the
    /// Redis-backed consumer once it has popped ids from a batch's
    /// pending set and needs their content from Postgres.
    async fn fetch_paragraphs_by_id(&self, ids: &[i64]) -> Result<Vec<ParagraphRow>, RenderError>;
}

impl From<StoreError> for RenderError {
    fn from(err: StoreError) -> Self {
        RenderError::UpstreamQuery(err.to_string())
    }
}
