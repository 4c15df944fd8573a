// src/models/reports.rs

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Data inicial (inclusiva) de criação do lead
    pub from: Option<NaiveDate>,
    /// Data final (inclusiva) de criação do lead
    pub to: Option<NaiveDate>,
}

// Contagem bruta por status, vinda do banco
#[derive(Debug, Default, Clone, FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub ongoing: i64,
    pub interested: i64,
    pub closed: i64,
    pub not_interested: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummaryReport {
    pub total: i64,
    pub ongoing: i64,
    pub interested: i64,
    pub closed: i64,
    pub not_interested: i64,
    #[schema(example = "37.50")]
    pub conversion_rate: Decimal,
    #[schema(example = "52.00")]
    pub interest_rate: Decimal,
}

impl From<StatusCounts> for LeadSummaryReport {
    fn from(c: StatusCounts) -> Self {
        Self {
            conversion_rate: percentage(c.closed, c.total),
            interest_rate: percentage(c.interested + c.closed, c.total),
            total: c.total,
            ongoing: c.ongoing,
            interested: c.interested,
            closed: c.closed,
            not_interested: c.not_interested,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AgentCounts {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub total: i64,
    pub closed: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub total: i64,
    pub closed: i64,
    pub conversion_rate: Decimal,
}

impl From<AgentCounts> for AgentPerformance {
    fn from(c: AgentCounts) -> Self {
        Self {
            conversion_rate: percentage(c.closed, c.total),
            agent_id: c.agent_id,
            agent_name: c.agent_name,
            total: c.total,
            closed: c.closed,
        }
    }
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepLoad {
    pub step_id: Uuid,
    pub step_name: String,
    pub position: i32,
    /// Leads cuja etapa atual é esta
    pub leads: i64,
}

/// Percentual com duas casas; zero quando não há base.
pub fn percentage(part: i64, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::ZERO.round_dp(2);
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(total))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(percentage(1, 3), Decimal::new(3333, 2));
        assert_eq!(percentage(2, 3), Decimal::new(6667, 2));
        assert_eq!(percentage(3, 8), Decimal::new(3750, 2));
    }

    #[test]
    fn no_leads_means_zero_rate() {
        assert_eq!(percentage(0, 0), Decimal::ZERO);
        assert_eq!(percentage(5, 0), Decimal::ZERO);
    }

    #[test]
    fn summary_derives_both_rates() {
        let report = LeadSummaryReport::from(StatusCounts {
            total: 8,
            ongoing: 2,
            interested: 2,
            closed: 3,
            not_interested: 1,
        });
        assert_eq!(report.conversion_rate, Decimal::new(3750, 2));
        assert_eq!(report.interest_rate, Decimal::new(6250, 2));
    }
}
