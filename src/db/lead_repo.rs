// src/db/lead_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::User,
        leads::{Lead, LeadListQuery, LeadStatus, UpdateLeadPayload},
    },
};

const LEAD_COLUMNS: &str = "l.id, l.customer_name, l.customer_phone, l.customer_email, l.address, \
    l.city, l.pincode, l.notes, l.status, l.created_by, l.customer_id, l.installer_id, \
    l.created_at, l.updated_at";

// Mesmo recorte das policies de RLS. $1 = papel, $2 = usuário.
const SCOPE_FILTER: &str = r#"(
    $1::user_role IN ('admin', 'office')
    OR ($1::user_role = 'agent' AND l.created_by = $2)
    OR ($1::user_role = 'installer' AND l.installer_id = $2)
    OR ($1::user_role = 'customer' AND l.customer_id = $2)
)"#;

// Sem pool própria: toda operação de lead roda na transação RLS da requisição
#[derive(Clone, Default)]
pub struct LeadRepository;

impl LeadRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_lead<'e, E>(
        &self,
        executor: E,
        created_by: Uuid,
        customer_name: &str,
        customer_phone: &str,
        customer_email: Option<&str>,
        address: Option<&str>,
        city: Option<&str>,
        pincode: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            INSERT INTO leads AS l (
                created_by, customer_name, customer_phone, customer_email,
                address, city, pincode, notes
            )
            VALUES ($1, $2, $3, lower($4), $5, $6, $7, $8)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(created_by)
        .bind(customer_name)
        .bind(customer_phone)
        .bind(customer_email)
        .bind(address)
        .bind(city)
        .bind(pincode)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(lead)
    }

    /// Busca respeitando a visibilidade do usuário. Fora do escopo = não encontrado.
    pub async fn find_visible<'e, E>(&self, executor: E, lead_id: Uuid, user: &User) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads l WHERE l.id = $3 AND {SCOPE_FILTER}"
        ))
        .bind(user.role)
        .bind(user.id)
        .bind(lead_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)
    }

    /// Mesma busca, com trava de linha para transições concorrentes.
    pub async fn find_visible_for_update<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        user: &User,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads l WHERE l.id = $3 AND {SCOPE_FILTER} FOR UPDATE"
        ))
        .bind(user.role)
        .bind(user.id)
        .bind(lead_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)
    }

    pub async fn list_visible<'e, E>(
        &self,
        executor: E,
        user: &User,
        query: &LeadListQuery,
    ) -> Result<Vec<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let leads = sqlx::query_as::<_, Lead>(&format!(
            r#"
            SELECT {LEAD_COLUMNS} FROM leads l
            WHERE {SCOPE_FILTER}
              AND ($3::lead_status IS NULL OR l.status = $3)
              AND ($4::text IS NULL
                   OR l.customer_name ILIKE $4
                   OR l.customer_phone ILIKE $4
                   OR l.city ILIKE $4)
            ORDER BY l.created_at DESC
            "#
        ))
        .bind(user.role)
        .bind(user.id)
        .bind(query.status)
        .bind(search)
        .fetch_all(executor)
        .await?;

        Ok(leads)
    }

    pub async fn update_details<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        changes: &UpdateLeadPayload,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads AS l SET
                customer_name = COALESCE($2, customer_name),
                customer_phone = COALESCE($3, customer_phone),
                customer_email = COALESCE(lower($4), customer_email),
                address = COALESCE($5, address),
                city = COALESCE($6, city),
                pincode = COALESCE($7, pincode),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE l.id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead_id)
        .bind(changes.customer_name.as_deref())
        .bind(changes.customer_phone.as_deref())
        .bind(changes.customer_email.as_deref())
        .bind(changes.address.as_deref())
        .bind(changes.city.as_deref())
        .bind(changes.pincode.as_deref())
        .bind(changes.notes.as_deref())
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)?;

        Ok(lead)
    }

    pub async fn update_status<'e, E>(&self, executor: E, lead_id: Uuid, status: LeadStatus) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads AS l SET status = $2, updated_at = NOW()
            WHERE l.id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead_id)
        .bind(status)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)
    }

    pub async fn set_installer<'e, E>(&self, executor: E, lead_id: Uuid, installer_id: Uuid) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads AS l SET installer_id = $2, updated_at = NOW()
            WHERE l.id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead_id)
        .bind(installer_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)
    }

    pub async fn set_customer<'e, E>(&self, executor: E, lead_id: Uuid, customer_id: Uuid) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads AS l SET customer_id = $2, updated_at = NOW()
            WHERE l.id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead_id)
        .bind(customer_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)
    }

    /// Liga a conta recém-criada aos leads com o mesmo e-mail ainda sem cliente.
    pub async fn link_customer_by_email<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        email: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE leads SET customer_id = $1, updated_at = NOW()
            WHERE customer_id IS NULL AND lower(customer_email) = lower($2)
            "#,
        )
        .bind(customer_id)
        .bind(email)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
