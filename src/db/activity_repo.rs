// src/db/activity_repo.rs

use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::activity::{ActivityAction, ActivityLog},
};

#[derive(Clone, Default)]
pub struct ActivityRepository;

impl ActivityRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn append<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        actor_id: Uuid,
        action: ActivityAction,
        details: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO activity_logs (lead_id, actor_id, action, details) VALUES ($1, $2, $3, $4)",
        )
        .bind(lead_id)
        .bind(actor_id)
        .bind(action)
        .bind(details)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_lead<'e, E>(&self, executor: E, lead_id: Uuid) -> Result<Vec<ActivityLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, lead_id, actor_id, action, details, created_at
            FROM activity_logs
            WHERE lead_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(lead_id)
        .fetch_all(executor)
        .await?;
        Ok(logs)
    }
}
