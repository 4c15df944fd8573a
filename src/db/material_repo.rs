// src/db/material_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::materials::{LeadMaterial, Material, MaterialStatus, UpdateMaterialPayload},
};

const MATERIAL_COLUMNS: &str = "id, name, unit, category, is_active, created_at, updated_at";

const LEAD_MATERIAL_SELECT: &str = r#"
    SELECT
        lm.id, lm.lead_id, lm.material_id,
        m.name AS material_name, m.unit,
        lm.required_quantity, lm.dispatched_quantity, lm.received_quantity, lm.damaged_quantity,
        lm.status, lm.remarks,
        lm.dispatched_by, lm.dispatched_at, lm.verified_by, lm.verified_at
    FROM lead_materials lm
    JOIN materials m ON m.id = lm.material_id
"#;

#[derive(Clone, Default)]
pub struct MaterialRepository;

impl MaterialRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  CATÁLOGO
    // =========================================================================

    pub async fn create_material<'e, E>(
        &self,
        executor: E,
        name: &str,
        unit: &str,
        category: &str,
    ) -> Result<Material, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Material>(&format!(
            r#"
            INSERT INTO materials (name, unit, category)
            VALUES ($1, $2, $3)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(unit)
        .bind(category)
        .fetch_one(executor)
        .await
        .map_err(map_unique_name)
    }

    pub async fn update_material<'e, E>(
        &self,
        executor: E,
        material_id: Uuid,
        changes: &UpdateMaterialPayload,
    ) -> Result<Material, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Material>(&format!(
            r#"
            UPDATE materials SET
                name = COALESCE($2, name),
                unit = COALESCE($3, unit),
                category = COALESCE($4, category),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(material_id)
        .bind(changes.name.as_deref())
        .bind(changes.unit.as_deref())
        .bind(changes.category.as_deref())
        .bind(changes.is_active)
        .fetch_optional(executor)
        .await
        .map_err(map_unique_name)?
        .ok_or(AppError::MaterialNotFound)
    }

    pub async fn list_materials<'e, E>(&self, executor: E, include_inactive: bool) -> Result<Vec<Material>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let materials = sqlx::query_as::<_, Material>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE ($1 OR is_active) ORDER BY category, name"
        ))
        .bind(include_inactive)
        .fetch_all(executor)
        .await?;
        Ok(materials)
    }

    pub async fn find_active_ids<'e, E>(&self, executor: E, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let found = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM materials WHERE id = ANY($1) AND is_active = TRUE",
        )
        .bind(ids)
        .fetch_all(executor)
        .await?;
        Ok(found)
    }

    // =========================================================================
    //  LINHAS DO LEAD
    // =========================================================================

    pub async fn list_for_lead<'e, E>(&self, executor: E, lead_id: Uuid) -> Result<Vec<LeadMaterial>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, LeadMaterial>(&format!(
            "{LEAD_MATERIAL_SELECT} WHERE lm.lead_id = $1 ORDER BY m.category, m.name"
        ))
        .bind(lead_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }

    /// Trava as linhas do lead durante despacho/conferência.
    pub async fn list_for_lead_for_update<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
    ) -> Result<Vec<LeadMaterial>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, LeadMaterial>(&format!(
            "{LEAD_MATERIAL_SELECT} WHERE lm.lead_id = $1 ORDER BY m.category, m.name FOR UPDATE OF lm"
        ))
        .bind(lead_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }

    pub async fn upsert_requirement<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        material_id: Uuid,
        required_quantity: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO lead_materials (lead_id, material_id, required_quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (lead_id, material_id)
            DO UPDATE SET required_quantity = EXCLUDED.required_quantity, updated_at = NOW()
            "#,
        )
        .bind(lead_id)
        .bind(material_id)
        .bind(required_quantity)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Despacho (ou novo despacho): zera a conferência anterior.
    pub async fn record_dispatch<'e, E>(
        &self,
        executor: E,
        line_id: Uuid,
        quantity: Decimal,
        dispatched_by: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE lead_materials SET
                dispatched_quantity = $2,
                dispatched_by = $3,
                dispatched_at = NOW(),
                received_quantity = NULL,
                damaged_quantity = NULL,
                verified_by = NULL,
                verified_at = NULL,
                remarks = NULL,
                status = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(line_id)
        .bind(quantity)
        .bind(dispatched_by)
        .bind(MaterialStatus::Pending)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn record_verification<'e, E>(
        &self,
        executor: E,
        line_id: Uuid,
        received: Decimal,
        damaged: Decimal,
        status: MaterialStatus,
        remarks: Option<&str>,
        verified_by: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE lead_materials SET
                received_quantity = $2,
                damaged_quantity = $3,
                status = $4,
                remarks = $5,
                verified_by = $6,
                verified_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(line_id)
        .bind(received)
        .bind(damaged)
        .bind(status)
        .bind(remarks)
        .bind(verified_by)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn map_unique_name(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation("materials_name_key".into());
        }
    }
    e.into()
}
