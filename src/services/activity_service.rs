// src/services/activity_service.rs

use serde_json::Value;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ActivityRepository, LeadRepository},
    models::{
        activity::{ActivityAction, ActivityLog},
        auth::User,
    },
};

#[derive(Clone)]
pub struct ActivityService {
    repo: ActivityRepository,
    lead_repo: LeadRepository,
}

impl ActivityService {
    pub fn new(repo: ActivityRepository, lead_repo: LeadRepository) -> Self {
        Self { repo, lead_repo }
    }

    pub async fn record<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        actor_id: Uuid,
        action: ActivityAction,
        details: Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.append(executor, lead_id, actor_id, action, &details).await
    }

    pub async fn list_for_lead<'e, E>(
        &self,
        executor: E,
        user: &User,
        lead_id: Uuid,
    ) -> Result<Vec<ActivityLog>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // Lead invisível para o usuário se comporta como inexistente
        self.lead_repo.find_visible(&mut *tx, lead_id, user).await?;
        let logs = self.repo.list_for_lead(&mut *tx, lead_id).await?;

        tx.commit().await?;
        Ok(logs)
    }
}
