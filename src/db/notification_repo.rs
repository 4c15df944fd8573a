// src/db/notification_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::activity::{Notification, NotificationKind},
};

const NOTIFICATION_COLUMNS: &str = "id, user_id, lead_id, kind, title, message, is_read, created_at";

#[derive(Clone, Default)]
pub struct NotificationRepository;

impl NotificationRepository {
    pub fn new() -> Self {
        Self
    }

    /// Inserção em massa: uma linha por destinatário.
    pub async fn insert_many<'e, E>(
        &self,
        executor: E,
        recipients: &[Uuid],
        lead_id: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, lead_id, kind, title, message)
            SELECT unnest($1::uuid[]), $2, $3, $4, $5
            "#,
        )
        .bind(recipients)
        .bind(lead_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_user<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT 200
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(executor)
        .await?;
        Ok(notifications)
    }

    pub async fn mark_read<'e, E>(&self, executor: E, user_id: Uuid, notification_id: Uuid) -> Result<Notification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotificationNotFound)
    }

    pub async fn mark_all_read<'e, E>(&self, executor: E, user_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_unread<'e, E>(&self, executor: E, user_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }
}
