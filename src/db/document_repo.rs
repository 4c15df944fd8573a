// src/db/document_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::documents::{Document, DocumentCategory, DocumentStatus},
};

const DOCUMENT_COLUMNS: &str = "id, lead_id, category, file_name, storage_path, content_type, \
    size_bytes, status, corruption_reason, replaced_by, uploaded_by, created_at, updated_at";

#[derive(Clone, Default)]
pub struct DocumentRepository;

impl DocumentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_document<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        category: DocumentCategory,
        file_name: &str,
        storage_path: &str,
        content_type: &str,
        size_bytes: i64,
        uploaded_by: Uuid,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (
                lead_id, category, file_name, storage_path,
                content_type, size_bytes, uploaded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(lead_id)
        .bind(category)
        .bind(file_name)
        .bind(storage_path)
        .bind(content_type)
        .bind(size_bytes)
        .bind(uploaded_by)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("documents").to_string();
                    return AppError::UniqueConstraintViolation(constraint);
                }
            }
            e.into()
        })
    }

    /// Tira de circulação os documentos ativos da categoria (valid/corrupted -> replaced).
    pub async fn retire_category<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        category: DocumentCategory,
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE documents
            SET status = 'replaced', updated_at = NOW()
            WHERE lead_id = $1 AND category = $2 AND status IN ('valid', 'corrupted')
            RETURNING id
            "#,
        )
        .bind(lead_id)
        .bind(category)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    pub async fn set_replaced_by<'e, E>(&self, executor: E, old_ids: &[Uuid], new_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE documents SET replaced_by = $2 WHERE id = ANY($1)")
            .bind(old_ids)
            .bind(new_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, document_id: Uuid) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(document_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::DocumentNotFound)
    }

    pub async fn list_for_lead<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        include_replaced: bool,
    ) -> Result<Vec<Document>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let docs = sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS} FROM documents
            WHERE lead_id = $1 AND ($2 OR status <> 'replaced')
            ORDER BY category, created_at DESC
            "#
        ))
        .bind(lead_id)
        .bind(include_replaced)
        .fetch_all(executor)
        .await?;
        Ok(docs)
    }

    pub async fn mark_corrupted<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        reason: &str,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // A condição de status evita corromper um documento já substituído em paralelo
        sqlx::query_as::<_, Document>(&format!(
            r#"
            UPDATE documents
            SET status = $3, corruption_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'valid'
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(document_id)
        .bind(reason)
        .bind(DocumentStatus::Corrupted)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::DocumentNotValid)
    }
}
