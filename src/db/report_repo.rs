// src/db/report_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    models::reports::{AgentCounts, StatusCounts, StepLoad},
};

// Filtro de período sobre a data de criação. $1 = de, $2 = até (inclusivos).
const PERIOD_FILTER: &str = "($1::date IS NULL OR l.created_at::date >= $1) \
    AND ($2::date IS NULL OR l.created_at::date <= $2)";

#[derive(Clone, Default)]
pub struct ReportRepository;

impl ReportRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn status_counts<'e, E>(
        &self,
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<StatusCounts, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, StatusCounts>(&format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE l.status = 'ongoing') AS ongoing,
                COUNT(*) FILTER (WHERE l.status = 'interested') AS interested,
                COUNT(*) FILTER (WHERE l.status = 'closed') AS closed,
                COUNT(*) FILTER (WHERE l.status = 'not_interested') AS not_interested
            FROM leads l
            WHERE {PERIOD_FILTER}
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;
        Ok(counts)
    }

    pub async fn agent_counts<'e, E>(
        &self,
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AgentCounts>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, AgentCounts>(&format!(
            r#"
            SELECT
                u.id AS agent_id,
                u.full_name AS agent_name,
                COUNT(l.id) AS total,
                COUNT(l.id) FILTER (WHERE l.status = 'closed') AS closed
            FROM users u
            JOIN leads l ON l.created_by = u.id
            WHERE u.role = 'agent' AND {PERIOD_FILTER}
            GROUP BY u.id, u.full_name
            ORDER BY closed DESC, total DESC
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Quantos leads abertos estão parados em cada etapa (primeira pendente).
    pub async fn step_load<'e, E>(
        &self,
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<StepLoad>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, StepLoad>(&format!(
            r#"
            WITH current_steps AS (
                SELECT DISTINCT ON (ls.lead_id) ls.lead_id, ls.step_id
                FROM lead_steps ls
                JOIN leads l ON l.id = ls.lead_id
                WHERE ls.status = 'pending'
                  AND l.status IN ('ongoing', 'interested')
                  AND {PERIOD_FILTER}
                ORDER BY ls.lead_id, ls.position ASC
            )
            SELECT s.id AS step_id, s.name AS step_name, s.position, COUNT(cs.lead_id) AS leads
            FROM steps s
            LEFT JOIN current_steps cs ON cs.step_id = s.id
            GROUP BY s.id, s.name, s.position
            ORDER BY s.position ASC
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
