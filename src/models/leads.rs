// src/models/leads.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::UserRole;

// --- STATUS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Ongoing,
    Interested,
    Closed,
    NotInterested,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Ongoing => "ongoing",
            LeadStatus::Interested => "interested",
            LeadStatus::Closed => "closed",
            LeadStatus::NotInterested => "not_interested",
        }
    }

    /// Máquina de estados do lead. `closed` é terminal.
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        matches!(
            (self, next),
            (Ongoing, Interested)
                | (Ongoing, NotInterested)
                | (Interested, Closed)
                | (Interested, NotInterested)
                | (NotInterested, Ongoing)
        )
    }

    /// Reabrir um lead descartado é exclusivo de admin/escritório.
    pub fn transition_allowed_for(&self, next: LeadStatus, role: UserRole) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        match (self, next) {
            (LeadStatus::NotInterested, LeadStatus::Ongoing) => role.is_staff(),
            _ => matches!(role, UserRole::Admin | UserRole::Office | UserRole::Agent),
        }
    }

    /// A timeline só avança em leads ativos.
    pub fn accepts_progress(&self) -> bool {
        matches!(self, LeadStatus::Ongoing | LeadStatus::Interested)
    }
}

// --- LEAD ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    #[schema(example = "Anita Sharma")]
    pub customer_name: String,
    #[schema(example = "+91 98765 43210")]
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub address: Option<String>,
    #[schema(example = "Jaipur")]
    pub city: Option<String>,
    #[schema(example = "302001")]
    pub pincode: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub created_by: Uuid,
    pub customer_id: Option<Uuid>,
    pub installer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadPayload {
    #[validate(length(min = 1, message = "required"))]
    pub customer_name: String,
    #[validate(length(min = 6, max = 20, message = "invalid_phone"))]
    pub customer_phone: String,
    #[validate(email(message = "invalid_email"))]
    pub customer_email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(length(equal = 6, message = "invalid_pincode"))]
    pub pincode: Option<String>,
    pub notes: Option<String>,
}

// Todos os campos opcionais: só atualiza o que vier
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadPayload {
    #[validate(length(min = 1, message = "required"))]
    pub customer_name: Option<String>,
    #[validate(length(min = 6, max = 20, message = "invalid_phone"))]
    pub customer_phone: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub customer_email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(length(equal = 6, message = "invalid_pincode"))]
    pub pincode: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusPayload {
    pub status: LeadStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignInstallerPayload {
    pub installer_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkCustomerPayload {
    pub customer_id: Uuid,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeadListQuery {
    pub status: Option<LeadStatus>,
    /// Busca por nome, telefone ou cidade
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LeadStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Ongoing.can_transition_to(Interested));
        assert!(Interested.can_transition_to(Closed));
        assert!(Ongoing.can_transition_to(NotInterested));
        assert!(Interested.can_transition_to(NotInterested));
    }

    #[test]
    fn closed_is_terminal_and_self_transitions_are_rejected() {
        for next in [Ongoing, Interested, Closed, NotInterested] {
            assert!(!Closed.can_transition_to(next));
        }
        assert!(!Ongoing.can_transition_to(Ongoing));
        assert!(!Interested.can_transition_to(Interested));
    }

    #[test]
    fn cannot_skip_interest() {
        assert!(!Ongoing.can_transition_to(Closed));
        assert!(!NotInterested.can_transition_to(Closed));
        assert!(!NotInterested.can_transition_to(Interested));
    }

    #[test]
    fn reopening_requires_staff() {
        assert!(NotInterested.transition_allowed_for(Ongoing, UserRole::Office));
        assert!(NotInterested.transition_allowed_for(Ongoing, UserRole::Admin));
        assert!(!NotInterested.transition_allowed_for(Ongoing, UserRole::Agent));
        assert!(Ongoing.transition_allowed_for(Interested, UserRole::Agent));
        assert!(!Ongoing.transition_allowed_for(Interested, UserRole::Installer));
        assert!(!Ongoing.transition_allowed_for(Interested, UserRole::Customer));
    }

    #[test]
    fn only_open_leads_progress() {
        assert!(Ongoing.accepts_progress());
        assert!(Interested.accepts_progress());
        assert!(!Closed.accepts_progress());
        assert!(!NotInterested.accepts_progress());
    }
}
