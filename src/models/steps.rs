// src/models/steps.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{common::error::AppError, models::auth::UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "step_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
}

// --- ETAPA MESTRE (Configuração) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: Uuid,
    #[schema(example = "Subsidy Application")]
    pub name: String,
    #[schema(example = "subsidy_application")]
    pub slug: String,
    #[schema(example = 3)]
    pub position: i32,
    #[schema(example = json!(["office"]))]
    pub allowed_roles: Vec<UserRole>,
    pub remarks_required: bool,
    pub attachment_required: bool,
    pub requires_documents: bool,
    pub requires_materials_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// --- ETAPA DO LEAD (cópia da mestre no momento da criação) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadStep {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub step_id: Uuid,
    pub position: i32,
    pub name: String,
    pub slug: String,
    pub allowed_roles: Vec<UserRole>,
    pub remarks_required: bool,
    pub attachment_required: bool,
    pub requires_documents: bool,
    pub requires_materials_verified: bool,
    pub status: StepStatus,
    pub remarks: Option<String>,
    pub attachment_path: Option<String>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LeadStep {
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    /// Admin sempre pode; os demais dependem da configuração da etapa.
    pub fn allows(&self, role: UserRole) -> bool {
        role == UserRole::Admin || self.allowed_roles.contains(&role)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub lead_id: Uuid,
    pub steps: Vec<LeadStep>,
    /// Primeira etapa pendente (None quando tudo concluído)
    pub current_step_id: Option<Uuid>,
    #[schema(example = 42)]
    pub progress_percent: u8,
}

impl Timeline {
    pub fn new(lead_id: Uuid, mut steps: Vec<LeadStep>) -> Self {
        steps.sort_by_key(|s| s.position);
        let current_step_id = steps.iter().find(|s| !s.is_completed()).map(|s| s.id);
        let completed = steps.iter().filter(|s| s.is_completed()).count();
        let progress_percent = if steps.is_empty() {
            0
        } else {
            (completed * 100 / steps.len()) as u8
        };
        Self { lead_id, steps, current_step_id, progress_percent }
    }

    pub fn is_finished(&self) -> bool {
        !self.steps.is_empty() && self.current_step_id.is_none()
    }
}

// ---
// Regras de conclusão que não dependem do banco.
// Documentos e materiais são checados pelo serviço, depois destas.
// ---
pub fn validate_completion<'a>(
    steps: &'a [LeadStep],
    lead_step_id: Uuid,
    role: UserRole,
    remarks: Option<&str>,
    attachment_path: Option<&str>,
) -> Result<&'a LeadStep, AppError> {
    let step = steps
        .iter()
        .find(|s| s.id == lead_step_id)
        .ok_or(AppError::StepNotFound)?;

    if !step.allows(role) {
        return Err(AppError::RoleNotAllowedForStep);
    }

    if step.is_completed() {
        return Err(AppError::StepAlreadyCompleted);
    }

    if let Some(pending) = steps
        .iter()
        .filter(|s| s.position < step.position && !s.is_completed())
        .min_by_key(|s| s.position)
    {
        return Err(AppError::StepOutOfOrder(pending.name.clone()));
    }

    if step.remarks_required && remarks.map_or(true, |r| r.trim().is_empty()) {
        return Err(AppError::RemarksRequired);
    }

    if step.attachment_required && attachment_path.map_or(true, |p| p.trim().is_empty()) {
        return Err(AppError::AttachmentRequired);
    }

    Ok(step)
}

/// Só reabre se nenhuma etapa posterior já foi concluída.
pub fn validate_reopen(steps: &[LeadStep], lead_step_id: Uuid) -> Result<&LeadStep, AppError> {
    let step = steps
        .iter()
        .find(|s| s.id == lead_step_id)
        .ok_or(AppError::StepNotFound)?;

    if !step.is_completed() {
        return Err(AppError::StepNotCompleted);
    }

    if let Some(later) = steps
        .iter()
        .filter(|s| s.position > step.position && s.is_completed())
        .max_by_key(|s| s.position)
    {
        return Err(AppError::LaterStepCompleted(later.name.clone()));
    }

    Ok(step)
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStepPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "net_metering")]
    pub slug: String,
    /// Posição desejada; sem valor vai para o final
    pub position: Option<i32>,
    #[schema(example = json!(["office", "agent"]))]
    pub allowed_roles: Vec<UserRole>,
    #[serde(default)]
    pub remarks_required: bool,
    #[serde(default)]
    pub attachment_required: bool,
    #[serde(default)]
    pub requires_documents: bool,
    #[serde(default)]
    pub requires_materials_verified: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStepPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: Option<String>,
    pub allowed_roles: Option<Vec<UserRole>>,
    pub remarks_required: Option<bool>,
    pub attachment_required: Option<bool>,
    pub requires_documents: Option<bool>,
    pub requires_materials_verified: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderStepsPayload {
    /// IDs de todas as etapas mestre na nova ordem
    #[validate(length(min = 1, message = "required"))]
    pub step_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepPayload {
    pub remarks: Option<String>,
    /// Caminho no storage de um arquivo já enviado
    pub attachment_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(position: i32, roles: &[UserRole]) -> LeadStep {
        LeadStep {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            step_id: Uuid::new_v4(),
            position,
            name: format!("step-{}", position),
            slug: format!("step_{}", position),
            allowed_roles: roles.to_vec(),
            remarks_required: false,
            attachment_required: false,
            requires_documents: false,
            requires_materials_verified: false,
            status: StepStatus::Pending,
            remarks: None,
            attachment_path: None,
            completed_by: None,
            completed_at: None,
        }
    }

    fn complete(mut s: LeadStep) -> LeadStep {
        s.status = StepStatus::Completed;
        s
    }

    #[test]
    fn first_pending_step_can_be_completed_by_allowed_role() {
        let steps = vec![step(1, &[UserRole::Agent]), step(2, &[UserRole::Office])];
        let id = steps[0].id;
        let found = validate_completion(&steps, id, UserRole::Agent, None, None).unwrap();
        assert_eq!(found.position, 1);
    }

    #[test]
    fn role_outside_allowed_set_is_rejected_but_admin_passes() {
        let steps = vec![step(1, &[UserRole::Office])];
        let id = steps[0].id;
        assert!(matches!(
            validate_completion(&steps, id, UserRole::Installer, None, None),
            Err(AppError::RoleNotAllowedForStep)
        ));
        assert!(validate_completion(&steps, id, UserRole::Admin, None, None).is_ok());
    }

    #[test]
    fn steps_must_be_completed_in_order() {
        let steps = vec![
            complete(step(1, &[UserRole::Office])),
            step(2, &[UserRole::Office]),
            step(3, &[UserRole::Office]),
        ];
        let third = steps[2].id;
        match validate_completion(&steps, third, UserRole::Office, None, None) {
            Err(AppError::StepOutOfOrder(name)) => assert_eq!(name, "step-2"),
            other => panic!("unexpected {:?}", other.map(|s| s.id)),
        }
    }

    #[test]
    fn completed_step_cannot_be_completed_again() {
        let steps = vec![complete(step(1, &[UserRole::Office]))];
        let id = steps[0].id;
        assert!(matches!(
            validate_completion(&steps, id, UserRole::Office, None, None),
            Err(AppError::StepAlreadyCompleted)
        ));
    }

    #[test]
    fn blank_remarks_do_not_satisfy_requirement() {
        let mut s = step(1, &[UserRole::Office]);
        s.remarks_required = true;
        let steps = vec![s];
        let id = steps[0].id;
        assert!(matches!(
            validate_completion(&steps, id, UserRole::Office, Some("   "), None),
            Err(AppError::RemarksRequired)
        ));
        assert!(validate_completion(&steps, id, UserRole::Office, Some("filed on portal"), None).is_ok());
    }

    #[test]
    fn attachment_requirement_is_enforced() {
        let mut s = step(1, &[UserRole::Installer]);
        s.attachment_required = true;
        let steps = vec![s];
        let id = steps[0].id;
        assert!(matches!(
            validate_completion(&steps, id, UserRole::Installer, None, None),
            Err(AppError::AttachmentRequired)
        ));
        assert!(validate_completion(&steps, id, UserRole::Installer, None, Some("leads/x/photo.jpg")).is_ok());
    }

    #[test]
    fn unknown_step_is_not_found() {
        let steps = vec![step(1, &[UserRole::Office])];
        assert!(matches!(
            validate_completion(&steps, Uuid::new_v4(), UserRole::Admin, None, None),
            Err(AppError::StepNotFound)
        ));
    }

    #[test]
    fn reopen_blocked_by_later_completed_step() {
        let steps = vec![
            complete(step(1, &[UserRole::Office])),
            complete(step(2, &[UserRole::Office])),
            step(3, &[UserRole::Office]),
        ];
        assert!(matches!(
            validate_reopen(&steps, steps[0].id),
            Err(AppError::LaterStepCompleted(name)) if name == "step-2"
        ));
        assert!(validate_reopen(&steps, steps[1].id).is_ok());
        assert!(matches!(validate_reopen(&steps, steps[2].id), Err(AppError::StepNotCompleted)));
    }

    #[test]
    fn timeline_reports_current_step_and_progress() {
        let steps = vec![
            step(3, &[]),
            complete(step(1, &[])),
            step(4, &[]),
            complete(step(2, &[])),
        ];
        let current = steps[0].id;
        let timeline = Timeline::new(Uuid::nil(), steps);
        assert_eq!(timeline.steps[0].position, 1);
        assert_eq!(timeline.current_step_id, Some(current));
        assert_eq!(timeline.progress_percent, 50);
        assert!(!timeline.is_finished());
    }

    #[test]
    fn finished_timeline_has_no_current_step() {
        let timeline = Timeline::new(Uuid::nil(), vec![complete(step(1, &[])), complete(step(2, &[]))]);
        assert!(timeline.is_finished());
        assert_eq!(timeline.progress_percent, 100);
        assert!(!Timeline::new(Uuid::nil(), vec![]).is_finished());
    }
}
