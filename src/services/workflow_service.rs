// src/services/workflow_service.rs

use std::collections::HashSet;

use serde_json::json;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, LeadRepository, MaterialRepository, StepRepository},
    models::{
        activity::{ActivityAction, NewNotification, NotificationKind},
        auth::User,
        documents::MandatoryDocumentStatus,
        leads::LeadStatus,
        materials::MaterialSummary,
        steps::{
            validate_completion, validate_reopen, CompleteStepPayload, CreateStepPayload, StepDefinition,
            Timeline, UpdateStepPayload,
        },
    },
    services::{activity_service::ActivityService, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct WorkflowService {
    step_repo: StepRepository,
    lead_repo: LeadRepository,
    document_repo: DocumentRepository,
    material_repo: MaterialRepository,
    activity: ActivityService,
    notifications: NotificationService,
}

impl WorkflowService {
    pub fn new(
        step_repo: StepRepository,
        lead_repo: LeadRepository,
        document_repo: DocumentRepository,
        material_repo: MaterialRepository,
        activity: ActivityService,
        notifications: NotificationService,
    ) -> Self {
        Self { step_repo, lead_repo, document_repo, material_repo, activity, notifications }
    }

    // =========================================================================
    //  1. CONFIGURAÇÃO DAS ETAPAS (ADMIN)
    // =========================================================================

    pub async fn list_steps<'e, A>(&self, conn: A) -> Result<Vec<StepDefinition>, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let steps = self.step_repo.list_definitions(&mut *tx).await?;
        tx.commit().await?;
        Ok(steps)
    }

    /// Sem posição, a etapa entra no fim. Com posição, empurra as seguintes.
    pub async fn create_step<'e, A>(&self, conn: A, payload: &CreateStepPayload) -> Result<StepDefinition, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let existing = self.step_repo.list_definitions(&mut *tx).await?;
        let last = existing.iter().map(|s| s.position).max().unwrap_or(0);

        let position = match payload.position {
            Some(p) if p >= 1 && p <= last => {
                self.step_repo.shift_positions_from(&mut *tx, p).await?;
                p
            }
            _ => last + 1,
        };

        let step = self
            .step_repo
            .create_definition(
                &mut *tx,
                payload.name.trim(),
                payload.slug.trim(),
                position,
                &payload.allowed_roles,
                payload.remarks_required,
                payload.attachment_required,
                payload.requires_documents,
                payload.requires_materials_verified,
            )
            .await?;

        tx.commit().await?;

        tracing::info!("🧩 Etapa '{}' criada na posição {}", step.slug, step.position);
        Ok(step)
    }

    pub async fn update_step<'e, A>(
        &self,
        conn: A,
        step_id: Uuid,
        changes: &UpdateStepPayload,
    ) -> Result<StepDefinition, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let step = self.step_repo.update_definition(&mut *tx, step_id, changes).await?;
        tx.commit().await?;
        Ok(step)
    }

    /// Reordena pela lista completa de IDs. A unicidade de posição é checada só no commit.
    pub async fn reorder_steps<'e, A>(&self, conn: A, step_ids: &[Uuid]) -> Result<Vec<StepDefinition>, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let existing = self.step_repo.list_definitions(&mut *tx).await?;
        ensure_full_permutation(&existing, step_ids)?;

        for (index, step_id) in step_ids.iter().enumerate() {
            self.step_repo.set_position(&mut *tx, *step_id, index as i32 + 1).await?;
        }

        let steps = self.step_repo.list_definitions(&mut *tx).await?;
        tx.commit().await?;
        Ok(steps)
    }

    // =========================================================================
    //  2. TIMELINE DO LEAD
    // =========================================================================

    pub async fn timeline<'e, A>(&self, conn: A, actor: &User, lead_id: Uuid) -> Result<Timeline, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        self.lead_repo.find_visible(&mut *tx, lead_id, actor).await?;
        let steps = self.step_repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;
        Ok(Timeline::new(lead_id, steps))
    }

    pub async fn complete_step<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        lead_step_id: Uuid,
        payload: &CompleteStepPayload,
    ) -> Result<Timeline, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;
        if !lead.status.accepts_progress() {
            return Err(AppError::LeadNotActive(lead.status.as_str().to_string()));
        }

        let steps = self.step_repo.list_for_lead(&mut *tx, lead_id).await?;
        let remarks = payload.remarks.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let attachment = payload.attachment_path.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let step = validate_completion(&steps, lead_step_id, actor.role, remarks, attachment)
            .inspect_err(|e| tracing::debug!("Etapa {} recusada: {}", lead_step_id, e))?;

        if step.requires_documents {
            let documents = self.document_repo.list_for_lead(&mut *tx, lead_id, false).await?;
            let status = MandatoryDocumentStatus::evaluate(&documents);
            if !status.complete {
                return Err(AppError::MandatoryDocumentsMissing(status.missing_codes()));
            }
        }

        if step.requires_materials_verified {
            let lines = self.material_repo.list_for_lead(&mut *tx, lead_id).await?;
            if !MaterialSummary::from_lines(&lines).complete {
                return Err(AppError::MaterialsNotVerified);
            }
        }

        self.step_repo
            .mark_completed(&mut *tx, step.id, actor.id, remarks, attachment)
            .await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::StepCompleted,
                json!({ "step": step.slug, "remarks": remarks, "attachmentPath": attachment }),
            )
            .await?;

        // Transições automáticas de status
        let is_first = steps.iter().map(|s| s.position).min() == Some(step.position);
        let all_done = steps.iter().all(|s| s.id == step.id || s.is_completed());
        let mut current = lead.status;
        for next in automatic_transitions(lead.status, is_first, all_done) {
            self.lead_repo.update_status(&mut *tx, lead_id, next).await?;
            self.activity
                .record(
                    &mut *tx,
                    lead_id,
                    actor.id,
                    ActivityAction::StatusChanged,
                    json!({ "from": current.as_str(), "to": next.as_str(), "automatic": true }),
                )
                .await?;
            tracing::info!("🔁 Lead {}: {} -> {} (automático)", lead_id, current.as_str(), next.as_str());
            current = next;
        }

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[Some(lead.created_by), lead.customer_id],
                NewNotification {
                    lead_id: Some(lead_id),
                    kind: NotificationKind::StepCompleted,
                    title: format!("{} completed", step.name),
                    message: format!("Step '{}' was completed for {}", step.name, lead.customer_name),
                },
            )
            .await?;

        let refreshed = self.step_repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;

        tracing::info!("✅ Etapa '{}' concluída no lead {}", step.slug, lead_id);
        let timeline = Timeline::new(lead_id, refreshed);
        if timeline.is_finished() {
            tracing::info!("🏁 Lead {} concluiu todas as etapas", lead_id);
        }
        Ok(timeline)
    }

    /// Volta uma etapa concluída para pendente (admin). A timeline de leads encerrados fica congelada.
    pub async fn reopen_step<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        lead_step_id: Uuid,
    ) -> Result<Timeline, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;
        if !lead.status.accepts_progress() {
            return Err(AppError::LeadNotActive(lead.status.as_str().to_string()));
        }

        let steps = self.step_repo.list_for_lead(&mut *tx, lead_id).await?;
        let step = validate_reopen(&steps, lead_step_id)?;

        self.step_repo.mark_pending(&mut *tx, step.id).await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::StepReopened,
                json!({ "step": step.slug }),
            )
            .await?;

        let refreshed = self.step_repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;

        Ok(Timeline::new(lead_id, refreshed))
    }
}

/// Status que o lead percorre após a conclusão de uma etapa.
/// Primeira etapa: ongoing -> interested. Última etapa: interested -> closed.
pub(crate) fn automatic_transitions(current: LeadStatus, is_first: bool, all_done: bool) -> Vec<LeadStatus> {
    let mut path = Vec::new();
    let mut status = current;

    if is_first && status == LeadStatus::Ongoing {
        status = LeadStatus::Interested;
        path.push(status);
    }
    if all_done && status == LeadStatus::Interested {
        path.push(LeadStatus::Closed);
    }
    path
}

fn ensure_full_permutation(existing: &[StepDefinition], step_ids: &[Uuid]) -> Result<(), AppError> {
    let known: HashSet<Uuid> = existing.iter().map(|s| s.id).collect();
    let requested: HashSet<Uuid> = step_ids.iter().copied().collect();

    if requested.len() != step_ids.len() || requested != known {
        return Err(AppError::InvalidStepOrder);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::{
        models::auth::UserRole,
        test_support::test_db_or_skip,
    };

    fn definition() -> StepDefinition {
        StepDefinition {
            id: Uuid::new_v4(),
            name: "Inquiry".into(),
            slug: "inquiry".into(),
            position: 1,
            allowed_roles: vec![],
            remarks_required: false,
            attachment_required: false,
            requires_documents: false,
            requires_materials_verified: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_step_moves_ongoing_lead_to_interested() {
        assert_eq!(automatic_transitions(LeadStatus::Ongoing, true, false), vec![LeadStatus::Interested]);
    }

    #[test]
    fn last_step_closes_interested_lead() {
        assert_eq!(automatic_transitions(LeadStatus::Interested, false, true), vec![LeadStatus::Closed]);
        assert!(automatic_transitions(LeadStatus::Ongoing, false, true).is_empty());
    }

    #[test]
    fn single_step_timeline_goes_straight_to_closed() {
        assert_eq!(
            automatic_transitions(LeadStatus::Ongoing, true, true),
            vec![LeadStatus::Interested, LeadStatus::Closed]
        );
    }

    #[test]
    fn middle_steps_do_not_touch_status() {
        assert!(automatic_transitions(LeadStatus::Interested, false, false).is_empty());
    }

    #[test]
    fn reorder_must_list_every_step_once() {
        let a = definition();
        let b = definition();
        let existing = vec![a.clone(), b.clone()];

        assert!(ensure_full_permutation(&existing, &[b.id, a.id]).is_ok());
        assert!(matches!(ensure_full_permutation(&existing, &[a.id]), Err(AppError::InvalidStepOrder)));
        assert!(matches!(
            ensure_full_permutation(&existing, &[a.id, a.id]),
            Err(AppError::InvalidStepOrder)
        ));
        assert!(matches!(
            ensure_full_permutation(&existing, &[a.id, Uuid::new_v4()]),
            Err(AppError::InvalidStepOrder)
        ));
    }

    #[tokio::test]
    async fn editing_a_master_step_leaves_existing_timelines_untouched() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let agent = db.user(&mut tx, UserRole::Agent).await;
        let workflow = &db.state.workflow_service;

        let existing = db.lead(&mut tx, &agent).await;
        let before = workflow.timeline(&mut *tx, &agent, existing.id).await.unwrap();
        let inquiry = before.steps.iter().find(|s| s.slug == "inquiry").unwrap().clone();
        assert!(inquiry.allows(UserRole::Agent));

        let changes = UpdateStepPayload {
            name: Some("Site Survey".into()),
            allowed_roles: Some(vec![UserRole::Office]),
            remarks_required: Some(true),
            ..Default::default()
        };
        workflow.update_step(&mut *tx, inquiry.step_id, &changes).await.unwrap();

        let after = workflow.timeline(&mut *tx, &agent, existing.id).await.unwrap();
        let kept = after.steps.iter().find(|s| s.id == inquiry.id).unwrap();
        assert_eq!(kept.name, "Inquiry");
        assert_eq!(kept.allowed_roles, inquiry.allowed_roles);
        assert!(!kept.remarks_required);

        // A cópia antiga continua valendo para concluir a etapa
        let progressed = workflow
            .complete_step(&mut *tx, &agent, existing.id, inquiry.id, &CompleteStepPayload::default())
            .await
            .unwrap();
        assert!(progressed.steps.iter().any(|s| s.id == inquiry.id && s.is_completed()));

        // Leads novos recebem a configuração nova
        let fresh = db.lead(&mut tx, &agent).await;
        let timeline = workflow.timeline(&mut *tx, &agent, fresh.id).await.unwrap();
        let renamed = timeline.steps.iter().find(|s| s.step_id == inquiry.step_id).unwrap();
        assert_eq!(renamed.name, "Site Survey");
        assert_eq!(renamed.allowed_roles, vec![UserRole::Office]);
        assert!(matches!(
            workflow.complete_step(&mut *tx, &agent, fresh.id, renamed.id, &CompleteStepPayload::default()).await,
            Err(AppError::RoleNotAllowedForStep)
        ));
    }

    #[tokio::test]
    async fn first_completed_step_marks_lead_interested() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let lead = db.lead(&mut tx, &office).await;
        let workflow = &db.state.workflow_service;

        let timeline = workflow.timeline(&mut *tx, &office, lead.id).await.unwrap();
        let first = timeline.current_step_id.unwrap();
        let second = timeline.steps[1].id;

        assert!(matches!(
            workflow.complete_step(&mut *tx, &office, lead.id, second, &CompleteStepPayload::default()).await,
            Err(AppError::StepOutOfOrder(_))
        ));

        workflow.complete_step(&mut *tx, &office, lead.id, first, &CompleteStepPayload::default()).await.unwrap();
        let refreshed = db.state.lead_service.get_lead(&mut *tx, &office, lead.id).await.unwrap();
        assert_eq!(refreshed.status, LeadStatus::Interested);
    }
}
