// src/db/step_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::UserRole,
        steps::{LeadStep, StepDefinition, StepStatus, UpdateStepPayload},
    },
};

const STEP_COLUMNS: &str = "id, name, slug, position, allowed_roles, remarks_required, \
    attachment_required, requires_documents, requires_materials_verified, is_active, created_at";

const LEAD_STEP_SELECT: &str = r#"
    SELECT
        ls.id, ls.lead_id, ls.step_id, ls.position,
        ls.name, ls.slug, ls.allowed_roles,
        ls.remarks_required, ls.attachment_required,
        ls.requires_documents, ls.requires_materials_verified,
        ls.status, ls.remarks, ls.attachment_path, ls.completed_by, ls.completed_at
    FROM lead_steps ls
"#;

#[derive(Clone, Default)]
pub struct StepRepository;

impl StepRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  ETAPAS MESTRE
    // =========================================================================

    pub async fn list_definitions<'e, E>(&self, executor: E) -> Result<Vec<StepDefinition>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let steps = sqlx::query_as::<_, StepDefinition>(&format!(
            "SELECT {STEP_COLUMNS} FROM steps ORDER BY position ASC"
        ))
        .fetch_all(executor)
        .await?;
        Ok(steps)
    }

    pub async fn create_definition<'e, E>(
        &self,
        executor: E,
        name: &str,
        slug: &str,
        position: i32,
        allowed_roles: &[UserRole],
        remarks_required: bool,
        attachment_required: bool,
        requires_documents: bool,
        requires_materials_verified: bool,
    ) -> Result<StepDefinition, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StepDefinition>(&format!(
            r#"
            INSERT INTO steps (
                name, slug, position, allowed_roles, remarks_required,
                attachment_required, requires_documents, requires_materials_verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {STEP_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(slug)
        .bind(position)
        .bind(allowed_roles)
        .bind(remarks_required)
        .bind(attachment_required)
        .bind(requires_documents)
        .bind(requires_materials_verified)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::UniqueConstraintViolation("steps_slug_key".into());
                }
            }
            e.into()
        })
    }

    pub async fn update_definition<'e, E>(
        &self,
        executor: E,
        step_id: Uuid,
        changes: &UpdateStepPayload,
    ) -> Result<StepDefinition, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StepDefinition>(&format!(
            r#"
            UPDATE steps SET
                name = COALESCE($2, name),
                allowed_roles = COALESCE($3, allowed_roles),
                remarks_required = COALESCE($4, remarks_required),
                attachment_required = COALESCE($5, attachment_required),
                requires_documents = COALESCE($6, requires_documents),
                requires_materials_verified = COALESCE($7, requires_materials_verified),
                is_active = COALESCE($8, is_active)
            WHERE id = $1
            RETURNING {STEP_COLUMNS}
            "#
        ))
        .bind(step_id)
        .bind(changes.name.as_deref())
        .bind(changes.allowed_roles.as_deref())
        .bind(changes.remarks_required)
        .bind(changes.attachment_required)
        .bind(changes.requires_documents)
        .bind(changes.requires_materials_verified)
        .bind(changes.is_active)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::StepNotFound)
    }

    /// Abre espaço na ordenação para inserir uma etapa no meio.
    pub async fn shift_positions_from<'e, E>(&self, executor: E, position: i32) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE steps SET position = position + 1 WHERE position >= $1")
            .bind(position)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_position<'e, E>(&self, executor: E, step_id: Uuid, position: i32) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE steps SET position = $2 WHERE id = $1")
            .bind(step_id)
            .bind(position)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::StepNotFound);
        }
        Ok(())
    }

    // =========================================================================
    //  ETAPAS DO LEAD
    // =========================================================================

    /// Copia as etapas ativas para o lead (snapshot da configuração atual).
    pub async fn instantiate_for_lead<'e, E>(&self, executor: E, lead_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO lead_steps (
                lead_id, step_id, position, name, slug, allowed_roles,
                remarks_required, attachment_required, requires_documents, requires_materials_verified
            )
            SELECT $1, id, position, name, slug, allowed_roles,
                   remarks_required, attachment_required, requires_documents, requires_materials_verified
            FROM steps
            WHERE is_active = TRUE
            ORDER BY position
            "#,
        )
        .bind(lead_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_lead<'e, E>(&self, executor: E, lead_id: Uuid) -> Result<Vec<LeadStep>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let steps = sqlx::query_as::<_, LeadStep>(&format!(
            "{LEAD_STEP_SELECT} WHERE ls.lead_id = $1 ORDER BY ls.position ASC"
        ))
        .bind(lead_id)
        .fetch_all(executor)
        .await?;
        Ok(steps)
    }

    pub async fn mark_completed<'e, E>(
        &self,
        executor: E,
        lead_step_id: Uuid,
        completed_by: Uuid,
        remarks: Option<&str>,
        attachment_path: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE lead_steps
            SET status = $2, completed_by = $3, completed_at = NOW(),
                remarks = $4, attachment_path = $5
            WHERE id = $1
            "#,
        )
        .bind(lead_step_id)
        .bind(StepStatus::Completed)
        .bind(completed_by)
        .bind(remarks)
        .bind(attachment_path)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn mark_pending<'e, E>(&self, executor: E, lead_step_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE lead_steps
            SET status = $2, completed_by = NULL, completed_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(lead_step_id)
        .bind(StepStatus::Pending)
        .execute(executor)
        .await?;
        Ok(())
    }
}
