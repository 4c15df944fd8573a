// src/models/activity.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- HISTÓRICO (append-only) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "activity_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    LeadCreated,
    LeadUpdated,
    StatusChanged,
    InstallerAssigned,
    CustomerLinked,
    StepCompleted,
    StepReopened,
    DocumentUploaded,
    DocumentCorrupted,
    MaterialsConfigured,
    MaterialsDispatched,
    MaterialsVerified,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub actor_id: Uuid,
    pub action: ActivityAction,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

// --- NOTIFICAÇÕES ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LeadStatusChanged,
    InstallerAssigned,
    CustomerLinked,
    StepCompleted,
    DocumentCorrupted,
    MaterialsDispatched,
    MaterialsIssue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LeadStatusChanged => "lead_status_changed",
            NotificationKind::InstallerAssigned => "installer_assigned",
            NotificationKind::CustomerLinked => "customer_linked",
            NotificationKind::StepCompleted => "step_completed",
            NotificationKind::DocumentCorrupted => "document_corrupted",
            NotificationKind::MaterialsDispatched => "materials_dispatched",
            NotificationKind::MaterialsIssue => "materials_issue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lead_id: Option<Uuid>,
    #[schema(example = "document_corrupted")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Evento a ser notificado; os destinatários são resolvidos pelo serviço.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub lead_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// Remove vazios, duplicados e o próprio autor da ação.
pub fn resolve_recipients(candidates: &[Option<Uuid>], actor_id: Uuid) -> Vec<Uuid> {
    let mut recipients: Vec<Uuid> = Vec::new();
    for id in candidates.iter().flatten() {
        if *id != actor_id && !recipients.contains(id) {
            recipients.push(*id);
        }
    }
    recipients
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_is_never_notified_and_duplicates_collapse() {
        let actor = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let recipients = resolve_recipients(&[Some(agent), Some(actor), None, Some(customer), Some(agent)], actor);
        assert_eq!(recipients, vec![agent, customer]);
    }

    #[test]
    fn no_candidates_means_no_recipients() {
        assert!(resolve_recipients(&[None, None], Uuid::new_v4()).is_empty());
    }

    #[test]
    fn actions_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&ActivityAction::DocumentCorrupted).unwrap(), "\"document_corrupted\"");
        assert_eq!(NotificationKind::MaterialsIssue.as_str(), "materials_issue");
    }
}
