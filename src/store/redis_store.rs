use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{RenderError, StoreError};

/// Wraps a shared Redis `ConnectionManager`, used for the paragraph
/// pending-set handoff between the content-pool consumer and the
/// "mark used" async queue described in spec §4.2.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn pending_key(group_id: i64, batch_id: i64) -> String {
        format!("pf:paragraphs:pending:{group_id}:{batch_id}")
    }

    const MARK_USED_KEY: &'static str = "pf:paragraphs:mark_used";

    /// Pops up to `limit` ids from a batch's pending set without blocking.
    pub async fn pop_pending(
        &self,
        group_id: i64,
        batch_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>, RenderError> {
        let mut conn = self.conn.clone();
        let key = Self::pending_key(group_id, batch_id);
        let ids: Vec<i64> = redis::cmd("SPOP")
            .arg(&key)
            .arg(limit)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(ids)
    }

    /// Queues a paragraph id for asynchronous "mark as used" processing,
    /// so the render path never blocks on a Postgres write.
    pub async fn queue_mark_used(&self, id: i64) -> Result<(), RenderError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(Self::MARK_USED_KEY, id)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Drains up to `limit` queued ids for a batched Postgres write.
    pub async fn drain_mark_used(&self, limit: usize) -> Result<Vec<i64>, RenderError> {
        let mut conn = self.conn.clone();
        let mut ids = Vec::new();
        for _ in 0..limit {
            let id: Option<i64> = conn.rpop(Self::MARK_USED_KEY, None).await.map_err(StoreError::Redis)?;
            match id {
                Some(id) => ids.push(id),
                None => break,
            }
        }
        Ok(ids)
    }
}
