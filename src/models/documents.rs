// src/models/documents.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    AadharFront,
    AadharBack,
    ElectricityBill,
    BankPassbook,
    CancelledCheque,
    PanCard,
    Other,
}

impl DocumentCategory {
    /// As seis categorias exigidas antes da papelada do subsídio.
    pub const MANDATORY: [DocumentCategory; 6] = [
        DocumentCategory::AadharFront,
        DocumentCategory::AadharBack,
        DocumentCategory::ElectricityBill,
        DocumentCategory::BankPassbook,
        DocumentCategory::CancelledCheque,
        DocumentCategory::PanCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::AadharFront => "aadhar_front",
            DocumentCategory::AadharBack => "aadhar_back",
            DocumentCategory::ElectricityBill => "electricity_bill",
            DocumentCategory::BankPassbook => "bank_passbook",
            DocumentCategory::CancelledCheque => "cancelled_cheque",
            DocumentCategory::PanCard => "pan_card",
            DocumentCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Valid,
    Corrupted,
    Replaced,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub category: DocumentCategory,
    #[schema(example = "pan.pdf")]
    pub file_name: String,
    pub storage_path: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub corruption_reason: Option<String>,
    pub replaced_by: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- CHECAGEM DOS OBRIGATÓRIOS ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryDocumentStatus {
    pub complete: bool,
    /// Categorias sem nenhum documento válido
    pub missing: Vec<DocumentCategory>,
    /// Categorias cujo último envio foi marcado como corrompido
    pub corrupted: Vec<DocumentCategory>,
}

impl MandatoryDocumentStatus {
    pub fn evaluate(documents: &[Document]) -> Self {
        let mut missing = Vec::new();
        let mut corrupted = Vec::new();

        for category in DocumentCategory::MANDATORY {
            let has_valid = documents
                .iter()
                .any(|d| d.category == category && d.status == DocumentStatus::Valid);
            if has_valid {
                continue;
            }
            missing.push(category);
            if documents
                .iter()
                .any(|d| d.category == category && d.status == DocumentStatus::Corrupted)
            {
                corrupted.push(category);
            }
        }

        Self { complete: missing.is_empty(), missing, corrupted }
    }

    pub fn missing_codes(&self) -> Vec<String> {
        self.missing.iter().map(|c| c.as_str().to_string()).collect()
    }
}

// --- UPLOAD ---

pub const MAX_DOCUMENT_BYTES: i64 = 10 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["application/pdf", "image/jpeg", "image/png", "image/webp"];

/// Mantém apenas caracteres seguros para o nome no storage.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Prefixo que todo upload de uma categoria do lead deve ter.
pub fn storage_prefix(lead_id: Uuid, category: DocumentCategory) -> String {
    format!("leads/{}/{}/", lead_id, category.as_str())
}

pub fn storage_path(lead_id: Uuid, category: DocumentCategory, file_name: &str) -> String {
    format!(
        "{}{}-{}",
        storage_prefix(lead_id, category),
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

pub fn path_belongs_to(path: &str, lead_id: Uuid, category: DocumentCategory) -> bool {
    path.starts_with(&storage_prefix(lead_id, category)) && !path.contains("..")
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestUploadPayload {
    pub category: DocumentCategory,
    #[validate(length(min = 1, max = 255, message = "required"))]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    #[schema(example = 524288)]
    pub size_bytes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    pub storage_path: String,
    pub upload_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDocumentPayload {
    pub category: DocumentCategory,
    #[validate(length(min = 1, message = "required"))]
    pub storage_path: String,
    #[validate(length(min = 1, max = 255, message = "required"))]
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkCorruptedPayload {
    #[validate(length(min = 3, message = "required"))]
    #[schema(example = "Image is blurred, PAN number unreadable")]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DocumentListQuery {
    /// Inclui versões substituídas (histórico)
    #[serde(default)]
    pub include_replaced: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub url: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(category: DocumentCategory, status: DocumentStatus) -> Document {
        Document {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            category,
            file_name: "f.pdf".into(),
            storage_path: format!("leads/x/{}", Uuid::new_v4()),
            content_type: "application/pdf".into(),
            size_bytes: 10,
            status,
            corruption_reason: None,
            replaced_by: None,
            uploaded_by: Uuid::nil(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_six_valid_categories_complete_the_set() {
        let docs: Vec<_> = DocumentCategory::MANDATORY
            .iter()
            .map(|c| doc(*c, DocumentStatus::Valid))
            .collect();
        let status = MandatoryDocumentStatus::evaluate(&docs);
        assert!(status.complete);
        assert!(status.missing.is_empty());
    }

    #[test]
    fn corrupted_and_replaced_documents_do_not_count() {
        let mut docs: Vec<_> = DocumentCategory::MANDATORY[..4]
            .iter()
            .map(|c| doc(*c, DocumentStatus::Valid))
            .collect();
        docs.push(doc(DocumentCategory::CancelledCheque, DocumentStatus::Corrupted));
        docs.push(doc(DocumentCategory::PanCard, DocumentStatus::Replaced));
        docs.push(doc(DocumentCategory::Other, DocumentStatus::Valid));

        let status = MandatoryDocumentStatus::evaluate(&docs);
        assert!(!status.complete);
        assert_eq!(status.missing, vec![DocumentCategory::CancelledCheque, DocumentCategory::PanCard]);
        assert_eq!(status.corrupted, vec![DocumentCategory::CancelledCheque]);
        assert_eq!(status.missing_codes(), vec!["cancelled_cheque", "pan_card"]);
    }

    #[test]
    fn other_is_never_mandatory() {
        assert!(!DocumentCategory::MANDATORY.contains(&DocumentCategory::Other));
        assert_eq!(DocumentCategory::MANDATORY.len(), 6);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("My Bill (May).pdf"), "My_Bill__May_.pdf");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name("C:\\docs\\pan.png"), "pan.png");
    }

    #[test]
    fn generated_paths_stay_under_lead_and_category() {
        let lead = Uuid::new_v4();
        let path = storage_path(lead, DocumentCategory::PanCard, "pan card.jpg");
        assert!(path_belongs_to(&path, lead, DocumentCategory::PanCard));
        assert!(path.ends_with("-pan_card.jpg"));
        assert!(!path_belongs_to(&path, lead, DocumentCategory::AadharFront));
        assert!(!path_belongs_to(&path, Uuid::new_v4(), DocumentCategory::PanCard));
        let sneaky = format!("{}../../other", storage_prefix(lead, DocumentCategory::PanCard));
        assert!(!path_belongs_to(&sneaky, lead, DocumentCategory::PanCard));
    }
}
