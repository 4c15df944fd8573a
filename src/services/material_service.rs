// src/services/material_service.rs

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, MaterialRepository},
    models::{
        activity::{ActivityAction, NewNotification, NotificationKind},
        auth::User,
        materials::{
            ConfigureMaterialsPayload, CreateMaterialPayload, DispatchMaterialInput, LeadMaterial,
            is_storable_quantity, LeadMaterialsView, Material, MaterialStatus, MaterialSummary,
            RequiredMaterialInput, UpdateMaterialPayload, VerifyMaterialInput,
        },
    },
    services::{activity_service::ActivityService, notification_service::NotificationService},
};

/// Resultado da conferência de uma linha, antes de gravar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VerificationPlan {
    pub line_id: Uuid,
    pub material_name: String,
    pub received: Decimal,
    pub damaged: Decimal,
    pub status: MaterialStatus,
    pub remarks: Option<String>,
}

#[derive(Clone)]
pub struct MaterialService {
    repo: MaterialRepository,
    lead_repo: LeadRepository,
    activity: ActivityService,
    notifications: NotificationService,
}

impl MaterialService {
    pub fn new(
        repo: MaterialRepository,
        lead_repo: LeadRepository,
        activity: ActivityService,
        notifications: NotificationService,
    ) -> Self {
        Self { repo, lead_repo, activity, notifications }
    }

    // =========================================================================
    //  CATÁLOGO
    // =========================================================================

    pub async fn create_material<'e, A>(&self, conn: A, payload: &CreateMaterialPayload) -> Result<Material, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let material = self
            .repo
            .create_material(&mut *tx, payload.name.trim(), payload.unit.trim(), payload.category.trim())
            .await?;
        tx.commit().await?;
        Ok(material)
    }

    pub async fn update_material<'e, A>(
        &self,
        conn: A,
        material_id: Uuid,
        changes: &UpdateMaterialPayload,
    ) -> Result<Material, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let material = self.repo.update_material(&mut *tx, material_id, changes).await?;
        tx.commit().await?;
        Ok(material)
    }

    pub async fn list_materials<'e, A>(&self, conn: A, include_inactive: bool) -> Result<Vec<Material>, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let materials = self.repo.list_materials(&mut *tx, include_inactive).await?;
        tx.commit().await?;
        Ok(materials)
    }

    // =========================================================================
    //  MATERIAIS DO LEAD
    // =========================================================================

    pub async fn lead_materials<'e, A>(&self, conn: A, actor: &User, lead_id: Uuid) -> Result<LeadMaterialsView, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        self.lead_repo.find_visible(&mut *tx, lead_id, actor).await?;
        let items = self.repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;
        Ok(view(lead_id, items))
    }

    pub async fn configure<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        payload: &ConfigureMaterialsPayload,
    ) -> Result<LeadMaterialsView, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        check_requirements(&payload.items)?;

        let mut tx = conn.begin().await?;

        self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;

        let requested: Vec<Uuid> = payload.items.iter().map(|i| i.material_id).collect();
        let active: HashSet<Uuid> = self.repo.find_active_ids(&mut *tx, &requested).await?.into_iter().collect();
        if requested.iter().any(|id| !active.contains(id)) {
            return Err(AppError::MaterialNotFound);
        }

        let existing = self.repo.list_for_lead_for_update(&mut *tx, lead_id).await?;
        if let Some(line) = existing
            .iter()
            .find(|l| l.is_dispatched() && requested.contains(&l.material_id))
        {
            return Err(AppError::MaterialAlreadyDispatched(line.material_name.clone()));
        }

        for item in &payload.items {
            self.repo
                .upsert_requirement(&mut *tx, lead_id, item.material_id, item.required_quantity)
                .await?;
        }

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::MaterialsConfigured,
                json!({ "items": payload.items.len() }),
            )
            .await?;

        let items = self.repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;

        Ok(view(lead_id, items))
    }

    pub async fn dispatch<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        items: &[DispatchMaterialInput],
    ) -> Result<LeadMaterialsView, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;
        let lines = self.repo.list_for_lead_for_update(&mut *tx, lead_id).await?;

        let plan = plan_dispatch(&lines, items)?;
        for (line_id, quantity) in &plan {
            self.repo.record_dispatch(&mut *tx, *line_id, *quantity, actor.id).await?;
        }

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::MaterialsDispatched,
                json!({ "lines": plan.len() }),
            )
            .await?;

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[lead.installer_id],
                NewNotification {
                    lead_id: Some(lead_id),
                    kind: NotificationKind::MaterialsDispatched,
                    title: "Materials dispatched".into(),
                    message: format!("{} material lines dispatched for {}", plan.len(), lead.customer_name),
                },
            )
            .await?;

        let items = self.repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;

        tracing::info!("🚚 {} linhas despachadas para o lead {}", plan.len(), lead_id);
        Ok(view(lead_id, items))
    }

    pub async fn verify<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        items: &[VerifyMaterialInput],
    ) -> Result<LeadMaterialsView, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        // Para instalador, o recorte de visibilidade já garante que é o instalador do lead
        let lead = self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;
        let lines = self.repo.list_for_lead_for_update(&mut *tx, lead_id).await?;

        let plan = plan_verification(&lines, items)?;
        for line in &plan {
            self.repo
                .record_verification(
                    &mut *tx,
                    line.line_id,
                    line.received,
                    line.damaged,
                    line.status,
                    line.remarks.as_deref(),
                    actor.id,
                )
                .await?;
        }

        let issues: Vec<&VerificationPlan> =
            plan.iter().filter(|p| p.status != MaterialStatus::Verified).collect();

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::MaterialsVerified,
                json!({
                    "lines": plan.len(),
                    "issues": issues
                        .iter()
                        .map(|p| json!({ "material": p.material_name, "status": p.status }))
                        .collect::<Vec<_>>(),
                }),
            )
            .await?;

        if !issues.is_empty() {
            self.notifications
                .notify(
                    &mut *tx,
                    actor.id,
                    &[Some(lead.created_by), lead.installer_id],
                    NewNotification {
                        lead_id: Some(lead_id),
                        kind: NotificationKind::MaterialsIssue,
                        title: "Material verification issues".into(),
                        message: format!(
                            "{} of {} lines for {} have problems",
                            issues.len(),
                            plan.len(),
                            lead.customer_name
                        ),
                    },
                )
                .await?;
        }

        let items = self.repo.list_for_lead(&mut *tx, lead_id).await?;
        tx.commit().await?;

        Ok(view(lead_id, items))
    }
}

fn view(lead_id: Uuid, items: Vec<LeadMaterial>) -> LeadMaterialsView {
    let summary = MaterialSummary::from_lines(&items);
    LeadMaterialsView { lead_id, items, summary }
}

fn find_line(lines: &[LeadMaterial], material_id: Uuid) -> Result<&LeadMaterial, AppError> {
    lines
        .iter()
        .find(|l| l.material_id == material_id)
        .ok_or(AppError::MaterialNotConfigured(material_id))
}

pub(crate) fn check_requirements(items: &[RequiredMaterialInput]) -> Result<(), AppError> {
    if items
        .iter()
        .any(|i| i.required_quantity <= Decimal::ZERO || !is_storable_quantity(i.required_quantity))
    {
        return Err(AppError::InvalidQuantity);
    }
    Ok(())
}

/// Quantidade a despachar por linha. Sem quantidade informada, despacha o exigido.
pub(crate) fn plan_dispatch(
    lines: &[LeadMaterial],
    items: &[DispatchMaterialInput],
) -> Result<Vec<(Uuid, Decimal)>, AppError> {
    items
        .iter()
        .map(|item| {
            let line = find_line(lines, item.material_id)?;
            if line.status == MaterialStatus::Verified {
                return Err(AppError::MaterialAlreadyVerified(line.material_name.clone()));
            }
            let quantity = item.quantity.unwrap_or(line.required_quantity);
            if quantity <= Decimal::ZERO || !is_storable_quantity(quantity) {
                return Err(AppError::InvalidQuantity);
            }
            Ok((line.id, quantity))
        })
        .collect()
}

pub(crate) fn plan_verification(
    lines: &[LeadMaterial],
    items: &[VerifyMaterialInput],
) -> Result<Vec<VerificationPlan>, AppError> {
    items
        .iter()
        .map(|item| {
            let line = find_line(lines, item.material_id)?;
            let dispatched = line
                .dispatched_quantity
                .filter(|_| line.is_dispatched())
                .ok_or_else(|| AppError::MaterialNotDispatched(line.material_name.clone()))?;

            let damaged = item.damaged_quantity.unwrap_or(Decimal::ZERO);
            if item.received_quantity < Decimal::ZERO
                || damaged < Decimal::ZERO
                || !is_storable_quantity(item.received_quantity)
                || !is_storable_quantity(damaged)
            {
                return Err(AppError::InvalidQuantity);
            }

            Ok(VerificationPlan {
                line_id: line.id,
                material_name: line.material_name.clone(),
                received: item.received_quantity,
                damaged,
                status: MaterialStatus::classify(dispatched, item.received_quantity, damaged),
                remarks: item.remarks.clone().filter(|r| !r.trim().is_empty()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::PgConnection;

    use crate::{
        models::auth::UserRole,
        test_support::{test_db_or_skip, TestDb},
    };

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn line(name: &str, required: i64, dispatched: Option<i64>, status: MaterialStatus) -> LeadMaterial {
        LeadMaterial {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            material_id: Uuid::new_v4(),
            material_name: name.to_string(),
            unit: "pcs".into(),
            required_quantity: dec(required),
            dispatched_quantity: dispatched.map(dec),
            received_quantity: None,
            damaged_quantity: None,
            status,
            remarks: None,
            dispatched_by: dispatched.map(|_| Uuid::new_v4()),
            dispatched_at: dispatched.map(|_| Utc::now()),
            verified_by: None,
            verified_at: None,
        }
    }

    #[test]
    fn dispatch_defaults_to_required_quantity() {
        let panels = line("Panel", 8, None, MaterialStatus::Pending);
        let items = vec![DispatchMaterialInput { material_id: panels.material_id, quantity: None }];

        let plan = plan_dispatch(std::slice::from_ref(&panels), &items).unwrap();
        assert_eq!(plan, vec![(panels.id, dec(8))]);
    }

    #[test]
    fn verified_lines_cannot_be_redispatched() {
        let inverter = line("Inverter", 1, Some(1), MaterialStatus::Verified);
        let items = vec![DispatchMaterialInput { material_id: inverter.material_id, quantity: Some(dec(1)) }];

        let result = plan_dispatch(&[inverter], &items);
        assert!(matches!(result, Err(AppError::MaterialAlreadyVerified(name)) if name == "Inverter"));
    }

    #[test]
    fn dispatch_of_unconfigured_material_fails() {
        let missing = Uuid::new_v4();
        let items = vec![DispatchMaterialInput { material_id: missing, quantity: None }];

        let result = plan_dispatch(&[], &items);
        assert!(matches!(result, Err(AppError::MaterialNotConfigured(id)) if id == missing));
    }

    #[test]
    fn verification_requires_dispatch() {
        let cable = line("Cable", 50, None, MaterialStatus::Pending);
        let items = vec![VerifyMaterialInput {
            material_id: cable.material_id,
            received_quantity: dec(50),
            damaged_quantity: None,
            remarks: None,
        }];

        let result = plan_verification(&[cable], &items);
        assert!(matches!(result, Err(AppError::MaterialNotDispatched(_))));
    }

    #[test]
    fn verification_compares_against_dispatched_quantity() {
        // Exigido 10, despachado 8: receber 8 é conferência ok
        let panels = line("Panel", 10, Some(8), MaterialStatus::Pending);
        let items = vec![VerifyMaterialInput {
            material_id: panels.material_id,
            received_quantity: dec(8),
            damaged_quantity: Some(dec(0)),
            remarks: None,
        }];

        let plan = plan_verification(&[panels], &items).unwrap();
        assert_eq!(plan[0].status, MaterialStatus::Verified);
    }

    #[test]
    fn damaged_wins_over_other_problems() {
        let panels = line("Panel", 10, Some(10), MaterialStatus::Pending);
        let items = vec![VerifyMaterialInput {
            material_id: panels.material_id,
            received_quantity: dec(0),
            damaged_quantity: Some(dec(2)),
            remarks: Some("cracked glass".into()),
        }];

        let plan = plan_verification(&[panels], &items).unwrap();
        assert_eq!(plan[0].status, MaterialStatus::Damaged);
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let panels = line("Panel", 10, Some(10), MaterialStatus::Pending);
        let items = vec![VerifyMaterialInput {
            material_id: panels.material_id,
            received_quantity: dec(-1),
            damaged_quantity: None,
            remarks: None,
        }];

        assert!(matches!(plan_verification(&[panels], &items), Err(AppError::InvalidQuantity)));
    }

    #[test]
    fn quantities_with_more_than_two_decimals_are_rejected() {
        let requirement = |q| RequiredMaterialInput { material_id: Uuid::new_v4(), required_quantity: q };
        assert!(check_requirements(&[requirement(Decimal::new(150, 2))]).is_ok());
        assert!(matches!(
            check_requirements(&[requirement(Decimal::new(4, 3))]),
            Err(AppError::InvalidQuantity)
        ));

        let panels = line("Panel", 10, Some(10), MaterialStatus::Pending);
        let dispatch = vec![DispatchMaterialInput {
            material_id: panels.material_id,
            quantity: Some(Decimal::new(1005, 3)),
        }];
        assert!(matches!(
            plan_dispatch(std::slice::from_ref(&panels), &dispatch),
            Err(AppError::InvalidQuantity)
        ));

        let verify = vec![VerifyMaterialInput {
            material_id: panels.material_id,
            received_quantity: Decimal::new(9995, 3),
            damaged_quantity: None,
            remarks: None,
        }];
        assert!(matches!(plan_verification(&[panels], &verify), Err(AppError::InvalidQuantity)));
    }

    async fn catalog_panel(db: &TestDb, conn: &mut PgConnection) -> Material {
        let payload = CreateMaterialPayload {
            name: format!("Panel {}", Uuid::new_v4().simple()),
            unit: "pcs".into(),
            category: "panels".into(),
        };
        db.state.material_service.create_material(&mut *conn, &payload).await.unwrap()
    }

    #[tokio::test]
    async fn stored_quantities_keep_two_decimals() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let lead = db.lead(&mut tx, &office).await;
        let panel = catalog_panel(&db, &mut tx).await;
        let service = &db.state.material_service;

        let configure = |quantity| ConfigureMaterialsPayload {
            items: vec![RequiredMaterialInput { material_id: panel.id, required_quantity: quantity }],
        };

        let rejected = service.configure(&mut *tx, &office, lead.id, &configure(Decimal::new(10004, 3))).await;
        assert!(matches!(rejected, Err(AppError::InvalidQuantity)));

        let view = service
            .configure(&mut *tx, &office, lead.id, &configure(Decimal::new(1050, 2)))
            .await
            .unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].required_quantity, Decimal::new(1050, 2));
    }

    #[tokio::test]
    async fn redispatch_clears_the_previous_verification() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let lead = db.lead(&mut tx, &office).await;
        let panel = catalog_panel(&db, &mut tx).await;
        let service = &db.state.material_service;

        let requirement = ConfigureMaterialsPayload {
            items: vec![RequiredMaterialInput { material_id: panel.id, required_quantity: dec(10) }],
        };
        service.configure(&mut *tx, &office, lead.id, &requirement).await.unwrap();

        let dispatch = [DispatchMaterialInput { material_id: panel.id, quantity: None }];
        service.dispatch(&mut *tx, &office, lead.id, &dispatch).await.unwrap();

        let receipt = [VerifyMaterialInput {
            material_id: panel.id,
            received_quantity: dec(9),
            damaged_quantity: None,
            remarks: Some("one panel short".into()),
        }];
        let checked = service.verify(&mut *tx, &office, lead.id, &receipt).await.unwrap();
        assert_eq!(checked.items[0].status, MaterialStatus::QuantityMismatch);
        assert_eq!(checked.items[0].remarks.as_deref(), Some("one panel short"));

        let redispatched = service.dispatch(&mut *tx, &office, lead.id, &dispatch).await.unwrap();
        let line = &redispatched.items[0];
        assert_eq!(line.status, MaterialStatus::Pending);
        assert_eq!(line.dispatched_quantity, Some(dec(10)));
        assert_eq!(line.received_quantity, None);
        assert_eq!(line.remarks, None);
    }
}
