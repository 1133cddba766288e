use bon::bon;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    DatabaseManager,
    error::DbResult,
    types::{Notification, OutboxKind, OutboxTask},
};

macro_rules! outbox_columns {
    () => {
        "id, kind, payload, status, attempts, next_attempt_at, last_error, created_at, updated_at"
    };
}

#[bon]
impl DatabaseManager {
    #[builder]
    pub async fn enqueue_outbox_task(
        &self,
        kind: OutboxKind,
        payload: serde_json::Value,
    ) -> DbResult<OutboxTask> {
        let task = sqlx::query_as::<_, OutboxTask>(concat!(
            "INSERT INTO outbox_tasks (id, kind, payload, status, attempts, next_attempt_at, \
               created_at, updated_at) \
             VALUES ($1, $2, $3, 'pending', 0, now(), now(), now()) \
             RETURNING ",
            outbox_columns!()
        ))
        .bind(Uuid::now_v7())
        .bind(kind)
        .bind(sqlx::types::Json(payload))
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    /// Claims due tasks and leases them for `lease_secs`. The attempt counter
    /// is bumped at claim time, so a worker that dies mid-dispatch still
    /// consumes an attempt.
    #[builder]
    pub async fn claim_due_outbox_tasks(
        &self,
        limit: i64,
        lease_secs: f64,
    ) -> DbResult<Vec<OutboxTask>> {
        let tasks = sqlx::query_as::<_, OutboxTask>(concat!(
            "UPDATE outbox_tasks \
             SET attempts = attempts + 1, \
                 next_attempt_at = now() + make_interval(secs => $2), \
                 updated_at = now() \
             WHERE id IN ( \
               SELECT id FROM outbox_tasks \
               WHERE status = 'pending' AND next_attempt_at <= now() \
               ORDER BY next_attempt_at ASC \
               LIMIT $1 \
               FOR UPDATE SKIP LOCKED) \
             RETURNING ",
            outbox_columns!()
        ))
        .bind(limit)
        .bind(lease_secs)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    pub async fn complete_outbox_task(&self, task_id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox_tasks
            SET status = 'done', last_error = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed attempt. `retry_at = None` gives up on the task.
    #[builder]
    pub async fn record_outbox_failure(
        &self,
        task_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox_tasks
            SET status = CASE WHEN $3::timestamptz IS NULL THEN 'failed'::outbox_status ELSE 'pending'::outbox_status END,
                next_attempt_at = COALESCE($3, next_attempt_at),
                last_error = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[builder]
    pub async fn create_notification(
        &self,
        user_id: Option<Uuid>,
        restaurant_id: Option<Uuid>,
        kind: &str,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) -> DbResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, restaurant_id, kind, title, message, data, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, now())
            RETURNING id, user_id, restaurant_id, kind, title, message, data, read, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(restaurant_id)
        .bind(kind)
        .bind(title)
        .bind(message)
        .bind(sqlx::types::Json(data))
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }
}
