// src/services/lead_service.rs

use serde_json::json;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, StepRepository, UserRepository},
    models::{
        activity::{ActivityAction, NewNotification, NotificationKind},
        auth::{User, UserRole},
        leads::{
            ChangeStatusPayload, CreateLeadPayload, Lead, LeadListQuery, LeadStatus, UpdateLeadPayload,
        },
    },
    services::{activity_service::ActivityService, notification_service::NotificationService},
};

#[derive(Clone)]
pub struct LeadService {
    lead_repo: LeadRepository,
    step_repo: StepRepository,
    user_repo: UserRepository,
    activity: ActivityService,
    notifications: NotificationService,
}

impl LeadService {
    pub fn new(
        lead_repo: LeadRepository,
        step_repo: StepRepository,
        user_repo: UserRepository,
        activity: ActivityService,
        notifications: NotificationService,
    ) -> Self {
        Self { lead_repo, step_repo, user_repo, activity, notifications }
    }

    /// Cria o lead e já instancia a timeline com as etapas ativas.
    pub async fn create_lead<'e, A>(
        &self,
        conn: A,
        actor: &User,
        payload: &CreateLeadPayload,
    ) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self
            .lead_repo
            .create_lead(
                &mut *tx,
                actor.id,
                payload.customer_name.trim(),
                payload.customer_phone.trim(),
                payload.customer_email.as_deref(),
                payload.address.as_deref(),
                payload.city.as_deref(),
                payload.pincode.as_deref(),
                payload.notes.as_deref(),
            )
            .await?;

        let steps = self.step_repo.instantiate_for_lead(&mut *tx, lead.id).await?;

        self.activity
            .record(
                &mut *tx,
                lead.id,
                actor.id,
                ActivityAction::LeadCreated,
                json!({ "customerName": lead.customer_name, "steps": steps }),
            )
            .await?;

        tx.commit().await?;

        tracing::info!("📋 Lead {} criado por {} com {} etapas", lead.id, actor.id, steps);
        Ok(lead)
    }

    pub async fn list_leads<'e, A>(
        &self,
        conn: A,
        user: &User,
        query: &LeadListQuery,
    ) -> Result<Vec<Lead>, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let leads = self.lead_repo.list_visible(&mut *tx, user, query).await?;
        tx.commit().await?;
        Ok(leads)
    }

    pub async fn get_lead<'e, A>(&self, conn: A, user: &User, lead_id: Uuid) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let lead = self.lead_repo.find_visible(&mut *tx, lead_id, user).await?;
        tx.commit().await?;
        Ok(lead)
    }

    pub async fn update_lead<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        changes: &UpdateLeadPayload,
    ) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;

        // Instalador e cliente enxergam o lead, mas não editam o cadastro
        if !(actor.role.is_staff() || (actor.role == UserRole::Agent && lead.created_by == actor.id)) {
            return Err(AppError::Forbidden);
        }

        let updated = self.lead_repo.update_details(&mut *tx, lead_id, changes).await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::LeadUpdated,
                serde_json::to_value(changes).map_err(anyhow::Error::from)?,
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn change_status<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        payload: &ChangeStatusPayload,
    ) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;
        ensure_transition(lead.status, payload.status, actor.role)?;

        let updated = self.lead_repo.update_status(&mut *tx, lead_id, payload.status).await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::StatusChanged,
                json!({
                    "from": lead.status.as_str(),
                    "to": payload.status.as_str(),
                    "reason": payload.reason,
                }),
            )
            .await?;

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[Some(lead.created_by), lead.customer_id, lead.installer_id],
                NewNotification {
                    lead_id: Some(lead_id),
                    kind: NotificationKind::LeadStatusChanged,
                    title: "Lead status changed".into(),
                    message: format!(
                        "{} moved from {} to {}",
                        lead.customer_name,
                        lead.status.as_str(),
                        payload.status.as_str()
                    ),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "🔁 Lead {}: {} -> {}",
            lead_id,
            lead.status.as_str(),
            payload.status.as_str()
        );
        Ok(updated)
    }

    pub async fn assign_installer<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        installer_id: Uuid,
    ) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;

        let installer = self.user_repo.find_by_id_with(&mut *tx, installer_id).await?;
        match installer {
            Some(u) if u.role == UserRole::Installer && u.is_active() => {}
            _ => return Err(AppError::InvalidInstaller(installer_id)),
        }

        let updated = self.lead_repo.set_installer(&mut *tx, lead_id, installer_id).await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::InstallerAssigned,
                json!({ "installerId": installer_id, "previous": lead.installer_id }),
            )
            .await?;

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[Some(installer_id)],
                NewNotification {
                    lead_id: Some(lead_id),
                    kind: NotificationKind::InstallerAssigned,
                    title: "New installation assigned".into(),
                    message: format!("You were assigned to {}", lead.customer_name),
                },
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn link_customer<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Lead, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;

        let customer = self.user_repo.find_by_id_with(&mut *tx, customer_id).await?;
        if !matches!(customer, Some(ref u) if u.role == UserRole::Customer) {
            return Err(AppError::InvalidCustomerAccount(customer_id));
        }

        let updated = self.lead_repo.set_customer(&mut *tx, lead_id, customer_id).await?;

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::CustomerLinked,
                json!({ "customerId": customer_id }),
            )
            .await?;

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[Some(customer_id)],
                NewNotification {
                    lead_id: Some(lead_id),
                    kind: NotificationKind::CustomerLinked,
                    title: "Your solar project is now visible".into(),
                    message: format!("Lead for {} was linked to your account", updated.customer_name),
                },
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }
}

/// Valida a transição pedida. Papel errado em transição válida é 403, o resto é 409.
pub(crate) fn ensure_transition(current: LeadStatus, next: LeadStatus, role: UserRole) -> Result<(), AppError> {
    if !current.can_transition_to(next) {
        tracing::debug!("Transição rejeitada: {} -> {}", current.as_str(), next.as_str());
        return Err(AppError::InvalidStatusTransition {
            from: current.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }
    if !current.transition_allowed_for(next, role) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db_or_skip;

    #[test]
    fn same_status_is_not_a_transition() {
        let result = ensure_transition(LeadStatus::Ongoing, LeadStatus::Ongoing, UserRole::Admin);
        assert!(matches!(result, Err(AppError::InvalidStatusTransition { .. })));
    }

    #[test]
    fn closed_leads_never_move() {
        for next in [LeadStatus::Ongoing, LeadStatus::Interested, LeadStatus::NotInterested] {
            assert!(ensure_transition(LeadStatus::Closed, next, UserRole::Admin).is_err());
        }
    }

    #[test]
    fn agents_cannot_reopen_discarded_leads() {
        let result = ensure_transition(LeadStatus::NotInterested, LeadStatus::Ongoing, UserRole::Agent);
        assert!(matches!(result, Err(AppError::Forbidden)));

        assert!(ensure_transition(LeadStatus::NotInterested, LeadStatus::Ongoing, UserRole::Office).is_ok());
    }

    #[test]
    fn installers_and_customers_cannot_change_status() {
        for role in [UserRole::Installer, UserRole::Customer] {
            let result = ensure_transition(LeadStatus::Ongoing, LeadStatus::Interested, role);
            assert!(matches!(result, Err(AppError::Forbidden)));
        }
    }

    #[test]
    fn agent_can_mark_lead_interested() {
        assert!(ensure_transition(LeadStatus::Ongoing, LeadStatus::Interested, UserRole::Agent).is_ok());
    }

    #[tokio::test]
    async fn leads_are_visible_only_within_the_role_scope() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let owner = db.user(&mut tx, UserRole::Agent).await;
        let other_agent = db.user(&mut tx, UserRole::Agent).await;
        let installer = db.user(&mut tx, UserRole::Installer).await;
        let customer = db.user(&mut tx, UserRole::Customer).await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let leads = &db.state.lead_service;

        let lead = db.lead(&mut tx, &owner).await;

        assert!(leads.get_lead(&mut *tx, &owner, lead.id).await.is_ok());
        assert!(leads.get_lead(&mut *tx, &office, lead.id).await.is_ok());
        for outsider in [&other_agent, &installer, &customer] {
            assert!(
                matches!(leads.get_lead(&mut *tx, outsider, lead.id).await, Err(AppError::LeadNotFound)),
                "{:?} não deveria ver o lead",
                outsider.role
            );
        }

        let listed = leads
            .list_leads(&mut *tx, &other_agent, &LeadListQuery::default())
            .await
            .unwrap();
        assert!(listed.iter().all(|l| l.id != lead.id));

        leads.assign_installer(&mut *tx, &office, lead.id, installer.id).await.unwrap();
        leads.link_customer(&mut *tx, &office, lead.id, customer.id).await.unwrap();
        assert!(leads.get_lead(&mut *tx, &installer, lead.id).await.is_ok());
        assert!(leads.get_lead(&mut *tx, &customer, lead.id).await.is_ok());

        // Fora do escopo também não edita
        assert!(leads
            .update_lead(&mut *tx, &other_agent, lead.id, &UpdateLeadPayload::default())
            .await
            .is_err());
    }
}
