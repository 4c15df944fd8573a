// src/services/report_service.rs

use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    db::ReportRepository,
    models::reports::{AgentPerformance, LeadSummaryReport, ReportQuery, StepLoad},
};

#[derive(Clone)]
pub struct ReportService {
    repo: ReportRepository,
}

impl ReportService {
    pub fn new(repo: ReportRepository) -> Self {
        Self { repo }
    }

    pub async fn lead_summary<'e, E>(&self, executor: E, query: &ReportQuery) -> Result<LeadSummaryReport, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = self.repo.status_counts(executor, query.from, query.to).await?;
        Ok(counts.into())
    }

    pub async fn agent_performance<'e, E>(
        &self,
        executor: E,
        query: &ReportQuery,
    ) -> Result<Vec<AgentPerformance>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = self.repo.agent_counts(executor, query.from, query.to).await?;
        Ok(rows.into_iter().map(AgentPerformance::from).collect())
    }

    pub async fn step_load<'e, E>(&self, executor: E, query: &ReportQuery) -> Result<Vec<StepLoad>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.step_load(executor, query.from, query.to).await
    }
}
