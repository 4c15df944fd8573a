// src/services/document_service.rs

use std::sync::Arc;

use serde_json::json;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, LeadRepository},
    models::{
        activity::{ActivityAction, NewNotification, NotificationKind},
        auth::User,
        documents::{
            path_belongs_to, sanitize_file_name, storage_path, Document, DownloadLink,
            MandatoryDocumentStatus, RegisterDocumentPayload, RequestUploadPayload, UploadTicket,
            ALLOWED_CONTENT_TYPES, MAX_DOCUMENT_BYTES,
        },
    },
    services::{
        activity_service::ActivityService,
        notification_service::NotificationService,
        storage::{ObjectStorage, UPLOAD_URL_TTL_SECS},
    },
};

#[derive(Clone)]
pub struct DocumentService {
    repo: DocumentRepository,
    lead_repo: LeadRepository,
    storage: Arc<dyn ObjectStorage>,
    download_ttl_secs: u64,
    activity: ActivityService,
    notifications: NotificationService,
}

impl DocumentService {
    pub fn new(
        repo: DocumentRepository,
        lead_repo: LeadRepository,
        storage: Arc<dyn ObjectStorage>,
        download_ttl_secs: u64,
        activity: ActivityService,
        notifications: NotificationService,
    ) -> Self {
        Self { repo, lead_repo, storage, download_ttl_secs, activity, notifications }
    }

    /// Gera o caminho do objeto e a URL assinada de upload. O arquivo vai direto ao storage.
    pub async fn request_upload<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        payload: &RequestUploadPayload,
    ) -> Result<UploadTicket, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        validate_upload(&payload.content_type, payload.size_bytes)?;

        let mut tx = conn.begin().await?;
        self.lead_repo.find_visible(&mut *tx, lead_id, actor).await?;
        tx.commit().await?;

        let path = storage_path(lead_id, payload.category, &payload.file_name);
        let upload_url = self.storage.signed_upload_url(&path).await?;

        tracing::debug!("⬆️ URL de upload emitida para {}", path);

        Ok(UploadTicket {
            storage_path: path,
            upload_url,
            expires_in: UPLOAD_URL_TTL_SECS,
        })
    }

    /// Persiste os metadados depois do upload. O documento anterior da categoria vira `replaced`.
    pub async fn register_document<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        payload: &RegisterDocumentPayload,
    ) -> Result<Document, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        validate_upload(&payload.content_type, payload.size_bytes)?;

        if !path_belongs_to(&payload.storage_path, lead_id, payload.category) {
            return Err(AppError::InvalidStoragePath);
        }

        let mut tx = conn.begin().await?;

        // Trava o lead para serializar envios concorrentes da mesma categoria
        self.lead_repo.find_visible_for_update(&mut *tx, lead_id, actor).await?;

        let retired = self.repo.retire_category(&mut *tx, lead_id, payload.category).await?;

        let document = self
            .repo
            .create_document(
                &mut *tx,
                lead_id,
                payload.category,
                &sanitize_file_name(&payload.file_name),
                &payload.storage_path,
                &payload.content_type,
                payload.size_bytes,
                actor.id,
            )
            .await?;

        if !retired.is_empty() {
            self.repo.set_replaced_by(&mut *tx, &retired, document.id).await?;
        }

        self.activity
            .record(
                &mut *tx,
                lead_id,
                actor.id,
                ActivityAction::DocumentUploaded,
                json!({
                    "documentId": document.id,
                    "category": payload.category.as_str(),
                    "replaced": retired,
                }),
            )
            .await?;

        tx.commit().await?;
        Ok(document)
    }

    pub async fn list_documents<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
        include_replaced: bool,
    ) -> Result<Vec<Document>, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        self.lead_repo.find_visible(&mut *tx, lead_id, actor).await?;
        let documents = self.repo.list_for_lead(&mut *tx, lead_id, include_replaced).await?;
        tx.commit().await?;
        Ok(documents)
    }

    pub async fn mark_corrupted<'e, A>(
        &self,
        conn: A,
        actor: &User,
        document_id: Uuid,
        reason: &str,
    ) -> Result<Document, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let document = self.repo.find_by_id(&mut *tx, document_id).await?;
        let lead = self
            .lead_repo
            .find_visible_for_update(&mut *tx, document.lead_id, actor)
            .await
            .map_err(|_| AppError::DocumentNotFound)?;

        let corrupted = self.repo.mark_corrupted(&mut *tx, document_id, reason.trim()).await?;

        self.activity
            .record(
                &mut *tx,
                lead.id,
                actor.id,
                ActivityAction::DocumentCorrupted,
                json!({
                    "documentId": document_id,
                    "category": document.category.as_str(),
                    "reason": reason.trim(),
                }),
            )
            .await?;

        self.notifications
            .notify(
                &mut *tx,
                actor.id,
                &[Some(document.uploaded_by), Some(lead.created_by), lead.customer_id],
                NewNotification {
                    lead_id: Some(lead.id),
                    kind: NotificationKind::DocumentCorrupted,
                    title: "Document needs re-upload".into(),
                    message: format!(
                        "{} for {} was marked corrupted: {}",
                        document.category.as_str(),
                        lead.customer_name,
                        reason.trim()
                    ),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!("⚠️ Documento {} marcado como corrompido", document_id);
        Ok(corrupted)
    }

    pub async fn download_url<'e, A>(
        &self,
        conn: A,
        actor: &User,
        document_id: Uuid,
    ) -> Result<DownloadLink, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        let document = self.repo.find_by_id(&mut *tx, document_id).await?;
        self.lead_repo
            .find_visible(&mut *tx, document.lead_id, actor)
            .await
            .map_err(|_| AppError::DocumentNotFound)?;
        tx.commit().await?;

        let url = self
            .storage
            .signed_download_url(&document.storage_path, self.download_ttl_secs)
            .await?;

        Ok(DownloadLink { url, expires_in: self.download_ttl_secs })
    }

    pub async fn mandatory_status<'e, A>(
        &self,
        conn: A,
        actor: &User,
        lead_id: Uuid,
    ) -> Result<MandatoryDocumentStatus, AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;
        self.lead_repo.find_visible(&mut *tx, lead_id, actor).await?;
        let documents = self.repo.list_for_lead(&mut *tx, lead_id, false).await?;
        tx.commit().await?;
        Ok(MandatoryDocumentStatus::evaluate(&documents))
    }
}

/// Tipo e tamanho aceitos para qualquer documento.
pub(crate) fn validate_upload(content_type: &str, size_bytes: i64) -> Result<(), AppError> {
    let normalized = content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&normalized.as_str()) {
        return Err(AppError::UnsupportedFileType(content_type.to_string()));
    }
    if size_bytes <= 0 || size_bytes > MAX_DOCUMENT_BYTES {
        return Err(AppError::FileTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::PgConnection;

    use super::*;
    use crate::{
        models::{
            auth::UserRole,
            documents::{DocumentCategory, DocumentStatus},
        },
        test_support::{test_db_or_skip, TestDb},
    };

    #[test]
    fn accepts_pdf_and_images_up_to_limit() {
        assert!(validate_upload("application/pdf", 1024).is_ok());
        assert!(validate_upload("image/JPEG", MAX_DOCUMENT_BYTES).is_ok());
        assert!(validate_upload("image/webp", 10).is_ok());
    }

    #[test]
    fn rejects_other_content_types() {
        let result = validate_upload("application/zip", 1024);
        assert!(matches!(result, Err(AppError::UnsupportedFileType(t)) if t == "application/zip"));
    }

    #[test]
    fn rejects_oversized_or_empty_files() {
        assert!(matches!(validate_upload("image/png", MAX_DOCUMENT_BYTES + 1), Err(AppError::FileTooLarge)));
        assert!(matches!(validate_upload("image/png", 0), Err(AppError::FileTooLarge)));
    }

    async fn upload(db: &TestDb, conn: &mut PgConnection, actor: &User, lead_id: Uuid, category: DocumentCategory) -> Document {
        let payload = RegisterDocumentPayload {
            category,
            storage_path: storage_path(lead_id, category, "scan.pdf"),
            file_name: "scan.pdf".into(),
            content_type: "application/pdf".into(),
            size_bytes: 2048,
        };
        db.state
            .document_service
            .register_document(&mut *conn, actor, lead_id, &payload)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_upload_replaces_the_valid_document_of_its_category() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let lead = db.lead(&mut tx, &office).await;

        for category in [DocumentCategory::PanCard, DocumentCategory::Other] {
            let first = upload(&db, &mut tx, &office, lead.id, category).await;
            let second = upload(&db, &mut tx, &office, lead.id, category).await;

            let documents = db
                .state
                .document_service
                .list_documents(&mut *tx, &office, lead.id, true)
                .await
                .unwrap();
            let old = documents.iter().find(|d| d.id == first.id).unwrap();
            assert_eq!(old.status, DocumentStatus::Replaced, "{:?}", category);
            assert_eq!(old.replaced_by, Some(second.id));

            let valid = documents
                .iter()
                .filter(|d| d.category == category && d.status == DocumentStatus::Valid)
                .count();
            assert_eq!(valid, 1, "{:?}", category);
        }
    }

    #[tokio::test]
    async fn corrupted_document_is_replaced_by_the_next_upload() {
        let db = test_db_or_skip!();
        let mut tx = db.begin().await;
        let office = db.user(&mut tx, UserRole::Office).await;
        let lead = db.lead(&mut tx, &office).await;

        let bad = upload(&db, &mut tx, &office, lead.id, DocumentCategory::ElectricityBill).await;
        let marked = db
            .state
            .document_service
            .mark_corrupted(&mut *tx, &office, bad.id, "Blurred scan")
            .await
            .unwrap();
        assert_eq!(marked.status, DocumentStatus::Corrupted);

        let good = upload(&db, &mut tx, &office, lead.id, DocumentCategory::ElectricityBill).await;
        let documents = db
            .state
            .document_service
            .list_documents(&mut *tx, &office, lead.id, true)
            .await
            .unwrap();
        let old = documents.iter().find(|d| d.id == bad.id).unwrap();
        assert_eq!(old.status, DocumentStatus::Replaced);
        assert_eq!(old.replaced_by, Some(good.id));
    }
}
