// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::create_user,
        handlers::auth::list_users,
        handlers::auth::update_user_status,

        // --- Leads ---
        handlers::leads::create_lead,
        handlers::leads::list_leads,
        handlers::leads::get_lead,
        handlers::leads::update_lead,
        handlers::leads::change_status,
        handlers::leads::assign_installer,
        handlers::leads::link_customer,
        handlers::leads::list_activity,

        // --- Steps ---
        handlers::steps::list_steps,
        handlers::steps::create_step,
        handlers::steps::update_step,
        handlers::steps::reorder_steps,

        // --- Timeline ---
        handlers::steps::get_timeline,
        handlers::steps::complete_step,
        handlers::steps::reopen_step,

        // --- Documents ---
        handlers::documents::request_upload,
        handlers::documents::register_document,
        handlers::documents::list_documents,
        handlers::documents::mandatory_status,
        handlers::documents::mark_corrupted,
        handlers::documents::download_document,

        // --- Materials ---
        handlers::materials::list_materials,
        handlers::materials::create_material,
        handlers::materials::update_material,
        handlers::materials::lead_materials,
        handlers::materials::configure_materials,
        handlers::materials::dispatch_materials,
        handlers::materials::verify_materials,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,

        // --- Reports ---
        handlers::reports::lead_summary,
        handlers::reports::agent_performance,
        handlers::reports::step_load,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::UserStatus,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserStatusPayload,
            models::auth::AuthResponse,

            // --- Leads ---
            models::leads::LeadStatus,
            models::leads::Lead,
            models::leads::CreateLeadPayload,
            models::leads::UpdateLeadPayload,
            models::leads::ChangeStatusPayload,
            models::leads::AssignInstallerPayload,
            models::leads::LinkCustomerPayload,

            // --- Steps ---
            models::steps::StepStatus,
            models::steps::StepDefinition,
            models::steps::LeadStep,
            models::steps::Timeline,
            models::steps::CreateStepPayload,
            models::steps::UpdateStepPayload,
            models::steps::ReorderStepsPayload,
            models::steps::CompleteStepPayload,

            // --- Documents ---
            models::documents::DocumentCategory,
            models::documents::DocumentStatus,
            models::documents::Document,
            models::documents::MandatoryDocumentStatus,
            models::documents::RequestUploadPayload,
            models::documents::UploadTicket,
            models::documents::RegisterDocumentPayload,
            models::documents::MarkCorruptedPayload,
            models::documents::DownloadLink,

            // --- Materials ---
            models::materials::MaterialStatus,
            models::materials::Material,
            models::materials::LeadMaterial,
            models::materials::MaterialSummary,
            models::materials::CreateMaterialPayload,
            models::materials::UpdateMaterialPayload,
            models::materials::RequiredMaterialInput,
            models::materials::ConfigureMaterialsPayload,
            models::materials::DispatchMaterialInput,
            models::materials::DispatchMaterialsPayload,
            models::materials::VerifyMaterialInput,
            models::materials::VerifyMaterialsPayload,
            models::materials::LeadMaterialsView,

            // --- Activity / Notifications ---
            models::activity::ActivityAction,
            models::activity::ActivityLog,
            models::activity::NotificationKind,
            models::activity::Notification,
            models::activity::UnreadCount,

            // --- Reports ---
            models::reports::LeadSummaryReport,
            models::reports::AgentPerformance,
            models::reports::StepLoad,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Contas e Papéis"),
        (name = "Leads", description = "Cadastro e Ciclo de Vida dos Leads"),
        (name = "Steps", description = "Configuração Mestre das Etapas"),
        (name = "Timeline", description = "Progresso das Etapas por Lead"),
        (name = "Documents", description = "Documentos do Cliente no Storage"),
        (name = "Materials", description = "Catálogo, Despacho e Verificação de Materiais"),
        (name = "Notifications", description = "Avisos In-App"),
        (name = "Reports", description = "Indicadores Gerenciais")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protected_path_declares_bearer_security() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/leads/{id}/steps/{lead_step_id}/complete"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("api_jwt")));

        let complete = &doc.paths.paths["/api/leads/{id}/steps/{lead_step_id}/complete"];
        let params: Vec<&str> = complete
            .post
            .as_ref()
            .and_then(|op| op.parameters.as_ref())
            .map(|ps| ps.iter().map(|p| p.name.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(params, vec!["id", "lead_step_id"]);

        for (path, item) in &doc.paths.paths {
            let public = path.starts_with("/api/auth/");
            let operations = [&item.get, &item.post, &item.put, &item.patch, &item.delete];
            for op in operations.into_iter().flatten() {
                assert_eq!(op.security.is_some(), !public, "segurança incorreta em {}", path);
            }
        }
    }
}
