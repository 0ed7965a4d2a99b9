//! Postgres-backed [`EventQueueRepository`]. Grounded on
//! `zjj-core::coordination::queue::MergeQueue` for SQL style (inline bound
//! parameters, one statement per intent) and on `original_source/indexer.py`
//! (`get_next_event`, `handle_event_failure`, `cleanup_events`) for the exact
//! selector and failure-policy semantics this reimplements against Postgres
//! instead of SQLite/psycopg.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::domain::event::MAX_ATTEMPTS;
use crate::domain::Event;
use crate::error::{IndexerError, IndexerResult};

use super::repository::{EventQueueRepository, NewEvent};

/// Minutes of backoff per attempt: `backoff(attempts) = BACKOFF_UNIT_MINUTES
/// * attempts`, i.e. 30 minutes * 2 * attempts folded into one constant.
const BACKOFF_UNIT_MINUTES: f64 = 60.0;

pub struct PostgresEventQueue {
    pool: PgPool,
}

impl PostgresEventQueue {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventQueueRepository for PostgresEventQueue {
    async fn enqueue(&self, event: NewEvent) -> IndexerResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r"
            INSERT INTO event_queue (entity_type, action, message, depends_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (entity_type, action, message) WHERE state = 'queued'
            DO UPDATE SET depends_on = coalesce(event_queue.depends_on, '{}') || excluded.depends_on
            RETURNING id
            ",
        )
        .bind(&event.entity_type)
        .bind(&event.action)
        .bind(&event.message)
        .bind(&event.depends_on)
        .fetch_one(&self.pool)
        .await
        .map_err(IndexerError::Database)?;

        Ok(row.0)
    }

    async fn claim_next(&self) -> IndexerResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r"
            WITH candidate AS (
                SELECT e.id
                FROM event_queue e
                WHERE e.state = 'queued'
                  AND e.attempts < $1
                  AND e.last_updated <= now() - (($2 * e.attempts) * interval '1 minute')
                  AND NOT EXISTS (
                      SELECT 1
                      FROM unnest(coalesce(e.depends_on, '{}')) AS parent_id
                      JOIN event_queue parent ON parent.id = parent_id
                      WHERE parent.state <> 'completed'
                  )
                ORDER BY e.created, e.id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE event_queue
            SET state = 'running', attempts = attempts + 1, last_updated = now()
            FROM candidate
            WHERE event_queue.id = candidate.id
            RETURNING event_queue.*
            ",
        )
        .bind(MAX_ATTEMPTS)
        .bind(BACKOFF_UNIT_MINUTES)
        .fetch_optional(&self.pool)
        .await
        .map_err(IndexerError::Database)?;

        Ok(event)
    }

    async fn mark_completed(&self, event_id: i64) -> IndexerResult<()> {
        sqlx::query(
            "UPDATE event_queue SET state = 'completed', last_updated = now() WHERE id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(IndexerError::Database)?;
        Ok(())
    }

    async fn mark_failed_attempt(&self, event_id: i64, reason: &str) -> IndexerResult<()> {
        let mut tx = self.pool.begin().await.map_err(IndexerError::Database)?;

        sqlx::query("INSERT INTO event_failure_reason (event, failure_reason) VALUES ($1, $2)")
            .bind(event_id)
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

        let row = sqlx::query_as::<_, Event>("SELECT * FROM event_queue WHERE id = $1")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

        let duplicate_queued: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM event_queue
                WHERE entity_type = $1 AND action = $2 AND message = $3
                  AND state = 'queued' AND id <> $4
            )
            ",
        )
        .bind(&row.entity_type)
        .bind(&row.action)
        .bind(&row.message)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(IndexerError::Database)?;

        if row.attempts >= MAX_ATTEMPTS || duplicate_queued.0 {
            sqlx::query(
                "UPDATE event_queue SET state = 'failed', last_updated = now() WHERE id = $1",
            )
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;
        } else {
            sqlx::query(
                "UPDATE event_queue SET state = 'queued', last_updated = now() WHERE id = $1",
            )
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;
        }

        tx.commit().await.map_err(IndexerError::Database)?;
        Ok(())
    }

    async fn mark_failed_terminal(&self, event_id: i64, reason: &str) -> IndexerResult<()> {
        let mut tx = self.pool.begin().await.map_err(IndexerError::Database)?;

        sqlx::query("INSERT INTO event_failure_reason (event, failure_reason) VALUES ($1, $2)")
            .bind(event_id)
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

        sqlx::query("UPDATE event_queue SET state = 'failed', last_updated = now() WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

        tx.commit().await.map_err(IndexerError::Database)?;
        Ok(())
    }

    async fn cleanup_completed(&self, older_than: DateTime<Utc>) -> IndexerResult<u64> {
        let result = sqlx::query("DELETE FROM event_queue WHERE state = 'completed' AND created < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await
            .map_err(IndexerError::Database)?;
        Ok(result.rows_affected())
    }

    async fn timeout_stuck_running(&self, max_running_duration: Duration) -> IndexerResult<u64> {
        let mut tx = self.pool.begin().await.map_err(IndexerError::Database)?;

        let threshold = sqlx::postgres::types::PgInterval::try_from(max_running_duration)
            .map_err(|e| IndexerError::Configuration(format!("invalid running-timeout duration: {e}")))?;

        let stuck: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM event_queue WHERE state = 'running' AND (last_updated - created) > $1",
        )
        .bind(threshold.clone())
        .fetch_all(&mut *tx)
        .await
        .map_err(IndexerError::Database)?;

        for (id,) in &stuck {
            sqlx::query(
                "INSERT INTO event_failure_reason (event, failure_reason) VALUES ($1, $2)",
            )
            .bind(id)
            .bind("event has been running for more than 2.5 minutes; assuming the worker crashed")
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;
        }

        sqlx::query("UPDATE event_queue SET state = 'failed', last_updated = now() WHERE state = 'running' AND (last_updated - created) > $1")
            .bind(threshold)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

        tx.commit().await.map_err(IndexerError::Database)?;
        Ok(stuck.len() as u64)
    }

    async fn cascade_failed_dependents(&self) -> IndexerResult<u64> {
        let mut tx = self.pool.begin().await.map_err(IndexerError::Database)?;

        let blocked: Vec<(i64, i64)> = sqlx::query_as(
            r"
            SELECT q.id, parent.id
            FROM event_queue q
            JOIN LATERAL unnest(coalesce(q.depends_on, '{}')) AS parent_id ON true
            JOIN event_queue parent ON parent.id = parent_id
            WHERE q.state = 'queued' AND parent.state = 'failed'
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(IndexerError::Database)?;

        for (id, parent_id) in &blocked {
            sqlx::query(
                "INSERT INTO event_failure_reason (event, failure_reason) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(format!("depended on {parent_id} which failed"))
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;

            sqlx::query(
                "UPDATE event_queue SET state = 'failed', last_updated = now() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(IndexerError::Database)?;
        }

        tx.commit().await.map_err(IndexerError::Database)?;
        Ok(blocked.len() as u64)
    }

    async fn has_queued_duplicate(
        &self,
        entity_type: &str,
        action: &str,
        message: &serde_json::Value,
        excluding_id: i64,
    ) -> IndexerResult<bool> {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM event_queue
                WHERE entity_type = $1 AND action = $2 AND message = $3
                  AND state = 'queued' AND id <> $4
            )
            ",
        )
        .bind(entity_type)
        .bind(action)
        .bind(message)
        .bind(excluding_id)
        .fetch_one(&self.pool)
        .await
        .map_err(IndexerError::Database)?;
        Ok(row.0)
    }

    async fn has_queued_copy_image(
        &self,
        artwork_id: i64,
        old_gid: &str,
        suffix: &str,
        created_after: DateTime<Utc>,
    ) -> IndexerResult<bool> {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM event_queue
                WHERE action = 'copy_image'
                  AND state = 'queued'
                  AND message->>'artwork_id' = $1::text
                  AND message->>'old_gid' = $2
                  AND message->>'suffix' = $3
                  AND created > $4
            )
            ",
        )
        .bind(artwork_id)
        .bind(old_gid)
        .bind(suffix)
        .bind(created_after)
        .fetch_one(&self.pool)
        .await
        .map_err(IndexerError::Database)?;
        Ok(row.0)
    }
}
