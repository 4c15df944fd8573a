// src/models/materials.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "material_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    Pending,
    Verified,
    QuantityMismatch,
    Missing,
    Damaged,
}

/// Casas decimais das colunas NUMERIC(12,2) de quantidade.
pub const QUANTITY_SCALE: u32 = 2;

/// Quantidade positiva que cabe na coluna sem arredondamento.
pub fn is_storable_quantity(quantity: Decimal) -> bool {
    quantity.normalize().scale() <= QUANTITY_SCALE
}

impl MaterialStatus {
    /// Classificação da conferência: recebido contra despachado.
    /// Avaria tem prioridade, depois falta total, depois divergência.
    pub fn classify(dispatched: Decimal, received: Decimal, damaged: Decimal) -> Self {
        if damaged > Decimal::ZERO {
            MaterialStatus::Damaged
        } else if received.is_zero() {
            MaterialStatus::Missing
        } else if received != dispatched {
            MaterialStatus::QuantityMismatch
        } else {
            MaterialStatus::Verified
        }
    }
}

// --- CATÁLOGO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    #[schema(example = "Mono PERC Panel 540W")]
    pub name: String,
    #[schema(example = "pcs")]
    pub unit: String,
    #[schema(example = "panel")]
    pub category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- LINHA POR LEAD ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadMaterial {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    #[schema(example = "12")]
    pub required_quantity: Decimal,
    pub dispatched_quantity: Option<Decimal>,
    pub received_quantity: Option<Decimal>,
    pub damaged_quantity: Option<Decimal>,
    pub status: MaterialStatus,
    pub remarks: Option<String>,
    pub dispatched_by: Option<Uuid>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl LeadMaterial {
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSummary {
    pub total: usize,
    pub pending: usize,
    pub verified: usize,
    pub quantity_mismatch: usize,
    pub missing: usize,
    pub damaged: usize,
    pub dispatched: usize,
    /// Verdadeiro só quando há linhas e todas estão verificadas
    pub complete: bool,
}

impl MaterialSummary {
    pub fn from_lines(lines: &[LeadMaterial]) -> Self {
        let count = |status: MaterialStatus| lines.iter().filter(|l| l.status == status).count();
        let verified = count(MaterialStatus::Verified);
        Self {
            total: lines.len(),
            pending: count(MaterialStatus::Pending),
            verified,
            quantity_mismatch: count(MaterialStatus::QuantityMismatch),
            missing: count(MaterialStatus::Missing),
            damaged: count(MaterialStatus::Damaged),
            dispatched: lines.iter().filter(|l| l.is_dispatched()).count(),
            complete: !lines.is_empty() && verified == lines.len(),
        }
    }
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "required"))]
    pub unit: String,
    #[validate(length(min = 1, message = "required"))]
    pub category: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20, message = "required"))]
    pub unit: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MaterialListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredMaterialInput {
    pub material_id: Uuid,
    #[schema(example = "12")]
    pub required_quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureMaterialsPayload {
    #[validate(length(min = 1, message = "required"))]
    pub items: Vec<RequiredMaterialInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMaterialInput {
    pub material_id: Uuid,
    /// Sem valor, despacha a quantidade exigida
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMaterialsPayload {
    #[validate(length(min = 1, message = "required"))]
    pub items: Vec<DispatchMaterialInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyMaterialInput {
    pub material_id: Uuid,
    pub received_quantity: Decimal,
    pub damaged_quantity: Option<Decimal>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyMaterialsPayload {
    #[validate(length(min = 1, message = "required"))]
    pub items: Vec<VerifyMaterialInput>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadMaterialsView {
    pub lead_id: Uuid,
    pub items: Vec<LeadMaterial>,
    pub summary: MaterialSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn line(status: MaterialStatus, dispatched: bool) -> LeadMaterial {
        LeadMaterial {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            material_id: Uuid::new_v4(),
            material_name: "Panel".into(),
            unit: "pcs".into(),
            required_quantity: d(10),
            dispatched_quantity: dispatched.then(|| d(10)),
            received_quantity: None,
            damaged_quantity: None,
            status,
            remarks: None,
            dispatched_by: None,
            dispatched_at: dispatched.then(Utc::now),
            verified_by: None,
            verified_at: None,
        }
    }

    #[test]
    fn exact_receipt_is_verified() {
        assert_eq!(MaterialStatus::classify(d(12), d(12), d(0)), MaterialStatus::Verified);
        let fractional = Decimal::new(255, 1);
        assert_eq!(MaterialStatus::classify(fractional, Decimal::new(2550, 2), d(0)), MaterialStatus::Verified);
    }

    #[test]
    fn line_payloads_need_at_least_one_item() {
        assert!(ConfigureMaterialsPayload { items: vec![] }.validate().is_err());
        assert!(DispatchMaterialsPayload { items: vec![] }.validate().is_err());

        let configure = ConfigureMaterialsPayload {
            items: vec![RequiredMaterialInput { material_id: Uuid::new_v4(), required_quantity: d(4) }],
        };
        assert!(configure.validate().is_ok());
    }

    #[test]
    fn quantities_beyond_two_decimals_are_not_storable() {
        assert!(is_storable_quantity(Decimal::new(150, 2)));
        assert!(is_storable_quantity(Decimal::new(1500, 3)));
        assert!(is_storable_quantity(d(7)));
        assert!(!is_storable_quantity(Decimal::new(4, 3)));
        assert!(!is_storable_quantity(Decimal::new(1005, 3)));
    }

    #[test]
    fn damage_takes_priority_over_quantities() {
        assert_eq!(MaterialStatus::classify(d(12), d(12), d(1)), MaterialStatus::Damaged);
        assert_eq!(MaterialStatus::classify(d(12), d(0), d(2)), MaterialStatus::Damaged);
    }

    #[test]
    fn nothing_received_is_missing() {
        assert_eq!(MaterialStatus::classify(d(4), d(0), d(0)), MaterialStatus::Missing);
    }

    #[test]
    fn short_or_excess_receipt_is_a_mismatch() {
        assert_eq!(MaterialStatus::classify(d(12), d(10), d(0)), MaterialStatus::QuantityMismatch);
        assert_eq!(MaterialStatus::classify(d(12), d(13), d(0)), MaterialStatus::QuantityMismatch);
    }

    #[test]
    fn summary_complete_only_when_every_line_verified() {
        let lines = vec![line(MaterialStatus::Verified, true), line(MaterialStatus::Verified, true)];
        assert!(MaterialSummary::from_lines(&lines).complete);

        let lines = vec![line(MaterialStatus::Verified, true), line(MaterialStatus::Damaged, true)];
        let summary = MaterialSummary::from_lines(&lines);
        assert!(!summary.complete);
        assert_eq!(summary.damaged, 1);
        assert_eq!(summary.dispatched, 2);
    }

    #[test]
    fn empty_configuration_is_never_complete() {
        let summary = MaterialSummary::from_lines(&[]);
        assert!(!summary.complete);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn pending_lines_are_counted() {
        let lines = vec![line(MaterialStatus::Pending, false), line(MaterialStatus::Pending, true)];
        let summary = MaterialSummary::from_lines(&lines);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.dispatched, 1);
    }
}
