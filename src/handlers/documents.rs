// src/handlers/documents.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, StaffOnly},
    },
    models::documents::{
        Document, DocumentListQuery, DownloadLink, MandatoryDocumentStatus, MarkCorruptedPayload,
        RegisterDocumentPayload, RequestUploadPayload, UploadTicket,
    },
};

// POST /api/leads/{id}/documents/upload-url
#[utoipa::path(
    post,
    path = "/api/leads/{id}/documents/upload-url",
    tag = "Documents",
    request_body = RequestUploadPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "URL assinada para envio direto ao storage", body = UploadTicket),
        (status = 413, description = "Arquivo acima do limite"),
        (status = 415, description = "Tipo de arquivo não suportado")
    ),
    security(("api_jwt" = []))
)]
pub async fn request_upload(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<RequestUploadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let ticket = app_state
        .document_service
        .request_upload(&mut *tx, &user, lead_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(ticket)))
}

// POST /api/leads/{id}/documents
#[utoipa::path(
    post,
    path = "/api/leads/{id}/documents",
    tag = "Documents",
    request_body = RegisterDocumentPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 201, description = "Documento registrado", body = Document),
        (status = 400, description = "Caminho fora da pasta do lead")
    ),
    security(("api_jwt" = []))
)]
pub async fn register_document(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<RegisterDocumentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let document = app_state
        .document_service
        .register_document(&mut *tx, &user, lead_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::CREATED, Json(document)))
}

// GET /api/leads/{id}/documents
#[utoipa::path(
    get,
    path = "/api/leads/{id}/documents",
    tag = "Documents",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        DocumentListQuery
    ),
    responses(
        (status = 200, description = "Documentos do lead", body = Vec<Document>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_documents(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
    Query(query): Query<DocumentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let documents = app_state
        .document_service
        .list_documents(&mut *tx, &user, lead_id, query.include_replaced)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(documents)))
}

// GET /api/leads/{id}/documents/mandatory
#[utoipa::path(
    get,
    path = "/api/leads/{id}/documents/mandatory",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Situação das categorias obrigatórias", body = MandatoryDocumentStatus)
    ),
    security(("api_jwt" = []))
)]
pub async fn mandatory_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let status = app_state
        .document_service
        .mandatory_status(&mut *tx, &user, lead_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(status)))
}

// POST /api/documents/{id}/corrupted
#[utoipa::path(
    post,
    path = "/api/documents/{id}/corrupted",
    tag = "Documents",
    request_body = MarkCorruptedPayload,
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses(
        (status = 200, description = "Documento marcado como corrompido", body = Document),
        (status = 409, description = "Documento não está válido")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_corrupted(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<StaffOnly>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<MarkCorruptedPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let document = app_state
        .document_service
        .mark_corrupted(&mut *tx, &user, document_id, payload.reason.trim())
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(document)))
}

// GET /api/documents/{id}/download
#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses(
        (status = 200, description = "URL de download temporária", body = DownloadLink),
        (status = 502, description = "Falha no storage")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_document(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let link = app_state
        .document_service
        .download_url(&mut *tx, &user, document_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(link)))
}
