// src/services/notification_service.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::NotificationRepository,
    models::activity::{resolve_recipients, NewNotification, Notification},
};

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository) -> Self {
        Self { repo }
    }

    /// Dispara um evento para os envolvidos, sem repetir destinatário e sem avisar o próprio autor.
    pub async fn notify<'e, E>(
        &self,
        executor: E,
        actor_id: Uuid,
        candidates: &[Option<Uuid>],
        event: NewNotification,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let recipients = resolve_recipients(candidates, actor_id);
        if recipients.is_empty() {
            return Ok(0);
        }

        let sent = self
            .repo
            .insert_many(executor, &recipients, event.lead_id, event.kind, &event.title, &event.message)
            .await?;

        tracing::debug!("🔔 {} notificações '{}' enviadas", sent, event.kind.as_str());
        Ok(sent)
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
        self.repo.list_for_user(executor, user_id, unread_only).await
    }

    pub async fn mark_read<'e, E>(&self, executor: E, user_id: Uuid, notification_id: Uuid) -> Result<Notification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.mark_read(executor, user_id, notification_id).await
    }

    pub async fn mark_all_read<'e, E>(&self, executor: E, user_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.mark_all_read(executor, user_id).await
    }

    pub async fn unread_count<'e, E>(&self, executor: E, user_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.count_unread(executor, user_id).await
    }
}
