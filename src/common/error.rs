// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale};

// Erros de domínio. Cada variante vira um código de mensagem traduzível.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Conta desativada")]
    AccountDisabled,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Autenticação necessária")]
    Unauthenticated,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Um administrador não pode desativar a própria conta")]
    CannotDisableSelf,

    #[error("O usuário {0} não é um instalador ativo")]
    InvalidInstaller(uuid::Uuid),

    #[error("O usuário {0} não é uma conta de cliente")]
    InvalidCustomerAccount(uuid::Uuid),

    // --- Leads ---
    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("O lead não está ativo ({0})")]
    LeadNotActive(String),

    // --- Etapas ---
    #[error("Etapa não encontrada")]
    StepNotFound,

    #[error("A nova ordem deve conter todas as etapas exatamente uma vez")]
    InvalidStepOrder,

    #[error("Etapa já concluída")]
    StepAlreadyCompleted,

    #[error("Etapa ainda não concluída")]
    StepNotCompleted,

    #[error("A etapa anterior '{0}' ainda está pendente")]
    StepOutOfOrder(String),

    #[error("Etapa posterior '{0}' já concluída")]
    LaterStepCompleted(String),

    #[error("Papel sem permissão para esta etapa")]
    RoleNotAllowedForStep,

    #[error("Observações obrigatórias")]
    RemarksRequired,

    #[error("Anexo obrigatório")]
    AttachmentRequired,

    #[error("Documentos obrigatórios pendentes: {0:?}")]
    MandatoryDocumentsMissing(Vec<String>),

    #[error("Verificação de materiais incompleta")]
    MaterialsNotVerified,

    // --- Documentos ---
    #[error("Documento não encontrado")]
    DocumentNotFound,

    #[error("Documento não está válido")]
    DocumentNotValid,

    #[error("Caminho de storage inválido")]
    InvalidStoragePath,

    #[error("Tipo de arquivo não suportado: {0}")]
    UnsupportedFileType(String),

    #[error("Arquivo excede o limite de tamanho")]
    FileTooLarge,

    // --- Materiais ---
    #[error("Material não encontrado")]
    MaterialNotFound,

    #[error("Material '{0}' já foi despachado")]
    MaterialAlreadyDispatched(String),

    #[error("Material '{0}' já foi verificado")]
    MaterialAlreadyVerified(String),

    #[error("Material '{0}' ainda não foi despachado")]
    MaterialNotDispatched(String),

    #[error("Material '{0}' não está configurado para este lead")]
    MaterialNotConfigured(uuid::Uuid),

    #[error("Quantidade inválida")]
    InvalidQuantity,

    #[error("Notificação não encontrada")]
    NotificationNotFound,

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Falha no storage: {0}")]
    StorageError(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// A resposta de erro que efetivamente sai pela API
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Status HTTP, chave de tradução e detalhes opcionais.
    fn parts(&self) -> (StatusCode, &'static str, Option<Value>) {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| Value::String(m.to_string()))
                                .unwrap_or_else(|| Value::String(e.code.to_string()))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(codes));
                }
                (StatusCode::BAD_REQUEST, "validation_error", Some(Value::Object(details)))
            }
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "email_already_exists", None),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials", None),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, "account_disabled", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found", None),
            AppError::CannotDisableSelf => (StatusCode::BAD_REQUEST, "cannot_disable_self", None),
            AppError::InvalidInstaller(id) => (
                StatusCode::BAD_REQUEST,
                "invalid_installer",
                Some(json!({ "userId": id })),
            ),
            AppError::InvalidCustomerAccount(id) => (
                StatusCode::BAD_REQUEST,
                "invalid_customer_account",
                Some(json!({ "userId": id })),
            ),
            AppError::LeadNotFound => (StatusCode::NOT_FOUND, "lead_not_found", None),
            AppError::InvalidStatusTransition { from, to } => (
                StatusCode::CONFLICT,
                "invalid_status_transition",
                Some(json!({ "from": from, "to": to })),
            ),
            AppError::LeadNotActive(status) => (
                StatusCode::CONFLICT,
                "lead_not_active",
                Some(json!({ "status": status })),
            ),
            AppError::StepNotFound => (StatusCode::NOT_FOUND, "step_not_found", None),
            AppError::InvalidStepOrder => (StatusCode::BAD_REQUEST, "invalid_step_order", None),
            AppError::StepAlreadyCompleted => (StatusCode::CONFLICT, "step_already_completed", None),
            AppError::StepNotCompleted => (StatusCode::CONFLICT, "step_not_completed", None),
            AppError::StepOutOfOrder(step) => (
                StatusCode::CONFLICT,
                "step_out_of_order",
                Some(json!({ "pendingStep": step })),
            ),
            AppError::LaterStepCompleted(step) => (
                StatusCode::CONFLICT,
                "later_step_completed",
                Some(json!({ "completedStep": step })),
            ),
            AppError::RoleNotAllowedForStep => (StatusCode::FORBIDDEN, "role_not_allowed_for_step", None),
            AppError::RemarksRequired => (StatusCode::BAD_REQUEST, "remarks_required", None),
            AppError::AttachmentRequired => (StatusCode::BAD_REQUEST, "attachment_required", None),
            AppError::MandatoryDocumentsMissing(categories) => (
                StatusCode::CONFLICT,
                "mandatory_documents_missing",
                Some(json!({ "categories": categories })),
            ),
            AppError::MaterialsNotVerified => (StatusCode::CONFLICT, "materials_not_verified", None),
            AppError::DocumentNotFound => (StatusCode::NOT_FOUND, "document_not_found", None),
            AppError::DocumentNotValid => (StatusCode::CONFLICT, "document_not_valid", None),
            AppError::InvalidStoragePath => (StatusCode::BAD_REQUEST, "invalid_storage_path", None),
            AppError::UnsupportedFileType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_file_type",
                Some(json!({ "contentType": content_type })),
            ),
            AppError::FileTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "file_too_large", None),
            AppError::MaterialNotFound => (StatusCode::NOT_FOUND, "material_not_found", None),
            AppError::MaterialAlreadyDispatched(name) => (
                StatusCode::CONFLICT,
                "material_already_dispatched",
                Some(json!({ "material": name })),
            ),
            AppError::MaterialAlreadyVerified(name) => (
                StatusCode::CONFLICT,
                "material_already_verified",
                Some(json!({ "material": name })),
            ),
            AppError::MaterialNotDispatched(name) => (
                StatusCode::CONFLICT,
                "material_not_dispatched",
                Some(json!({ "material": name })),
            ),
            AppError::MaterialNotConfigured(id) => (
                StatusCode::BAD_REQUEST,
                "material_not_configured",
                Some(json!({ "materialId": id })),
            ),
            AppError::InvalidQuantity => (StatusCode::BAD_REQUEST, "invalid_quantity", None),
            AppError::NotificationNotFound => (StatusCode::NOT_FOUND, "notification_not_found", None),
            AppError::UniqueConstraintViolation(what) => (
                StatusCode::CONFLICT,
                "unique_violation",
                Some(json!({ "constraint": what })),
            ),
            AppError::StorageError(_) => (StatusCode::BAD_GATEWAY, "storage_error", None),

            // Todo o resto vira 500. O detalhe fica só no log.
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        }
    }

    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let (status, key, details) = self.parts();

        if status.is_server_error() {
            tracing::error!("Erro Interno do Servidor: {}", self);
        } else {
            tracing::debug!(code = key, "Requisição rejeitada: {}", self);
        }

        ApiError {
            status,
            error: store.translate(&locale.0, key),
            details,
        }
    }
}

// Fallback para quando não há Locale à mão (ex: middleware)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), I18nStore::global()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(AppError::LeadNotFound.parts().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::RoleNotAllowedForStep.parts().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::FileTooLarge.parts().0, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::InvalidStatusTransition { from: "closed".into(), to: "ongoing".into() }.parts().0,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = AppError::StorageError("timeout talking to bucket".into());
        let api = err.to_api_error(&Locale::default(), I18nStore::global());
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert!(api.details.is_none());
        assert!(!api.error.contains("timeout"));
    }

    #[test]
    fn missing_documents_are_listed_in_details() {
        let err = AppError::MandatoryDocumentsMissing(vec!["pan_card".into(), "aadhar_back".into()]);
        let (_, key, details) = err.parts();
        assert_eq!(key, "mandatory_documents_missing");
        assert_eq!(details.unwrap()["categories"][0], "pan_card");
    }
}
