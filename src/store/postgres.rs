use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{RenderError, StoreError};
use crate::site::Site;

use super::{DataStore, ParagraphRow, PoolRow};

/// Wraps a shared `sqlx::PgPool`, sized per spec §5 (>= 50 connections,
/// 5-minute max lifetime, 2-minute idle timeout), mirroring the teacher's
/// `ConnectionPool` wrapper around its own pool type.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.url)
            .await?;
        info!(
            max_connections = config.max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Background health check, spawned once from `main` and run on an
    /// interval. Logs and returns rather than panicking so a transient
    /// network blip never takes the process down.
    pub fn spawn_health_check(pool: PgPool, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = sqlx::query("SELECT 1").execute(&pool).await {
                    warn!(error = %err, "postgres health check failed");
                }
            }
        });
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DataStore for PostgresStore {
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<Site>, RenderError> {
        let row = sqlx::query(
            "SELECT id, domain, site_group_id, template_name, active \
             FROM sites WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Postgres)?;

        Ok(row.map(|r| Site {
            id: r.get("id"),
            domain: r.get("domain"),
            site_group_id: r.get("site_group_id"),
            template_name: r.get("template_name"),
            active: r.get("active"),
        }))
    }

    async fn load_template_source(
        &self,
        site_group_id: i64,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        let row = sqlx::query(
            "SELECT source FROM templates WHERE site_group_id = $1 AND name = $2",
        )
        .bind(site_group_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Postgres)?;

        Ok(row.map(|r| r.get::<String, _>("source")))
    }

    async fn fetch_pool_batch(
        &self,
        table: &str,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<PoolRow>, RenderError> {
        // `table` is restricted to a small set of internal identifiers
        // chosen by the caller (never user input), so this is not a SQL
        // injection vector despite the format! below.
        let query = format!(
            "SELECT id, value FROM {table} WHERE group_id = $1 AND status = 1 \
             ORDER BY RANDOM() LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(group_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Postgres)?;

        Ok(rows
            .into_iter()
            .map(|r| PoolRow {
                id: r.get("id"),
                value: r.get("value"),
            })
            .collect())
    }

    async fn fetch_next_paragraph_batch(
        &self,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<ParagraphRow>, RenderError> {
        let rows = sqlx::query(
            "SELECT id, batch_id, body FROM contents \
             WHERE group_id = $1 AND used = false \
             ORDER BY batch_id, id LIMIT $2",
        )
        .bind(group_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Postgres)?;

        Ok(rows
            .into_iter()
            .map(|r| ParagraphRow {
                id: r.get("id"),
                batch_id: r.get("batch_id"),
                body: r.get("body"),
            })
            .collect())
    }

    async fn mark_paragraphs_used(&self, ids: &[i64]) -> Result<(), RenderError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE contents SET used = true WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Postgres)?;
        Ok(())
    }

    async fn fetch_paragraphs_by_id(&self, ids: &[i64]) -> Result<Vec<ParagraphRow>, RenderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT id, batch_id, body FROM contents WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Postgres)?;

        Ok(rows
            .into_iter()
            .map(|r| ParagraphRow {
                id: r.get("id"),
                batch_id: r.get("batch_id"),
                body: r.get("body"),
            })
            .collect())
    }
}
