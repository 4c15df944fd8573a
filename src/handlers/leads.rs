// src/handlers/leads.rs

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
        rbac::{LeadCreators, RequireRole, StaffOnly},
    },
    models::{
        activity::ActivityLog,
        leads::{
            AssignInstallerPayload, ChangeStatusPayload, CreateLeadPayload, Lead, LeadListQuery,
            LinkCustomerPayload, UpdateLeadPayload,
        },
    },
};

// POST /api/leads
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 201, description = "Lead criado com a timeline instanciada", body = Lead),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Papel sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<LeadCreators>,
    Json(payload): Json<CreateLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .create_lead(&mut *tx, &user, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::CREATED, Json(lead)))
}

// GET /api/leads
#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    params(LeadListQuery),
    responses(
        (status = 200, description = "Leads visíveis para o usuário", body = Vec<Lead>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<LeadListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let leads = app_state
        .lead_service
        .list_leads(&mut *tx, &user, &query)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 404, description = "Lead inexistente ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .get_lead(&mut *tx, &user, lead_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(lead)))
}

// PATCH /api/leads/{id}
#[utoipa::path(
    patch,
    path = "/api/leads/{id}",
    tag = "Leads",
    request_body = UpdateLeadPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead atualizado", body = Lead),
        (status = 403, description = "Sem permissão para editar")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<LeadCreators>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .update_lead(&mut *tx, &user, lead_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(lead)))
}

// POST /api/leads/{id}/status
#[utoipa::path(
    post,
    path = "/api/leads/{id}/status",
    tag = "Leads",
    request_body = ChangeStatusPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Status alterado", body = Lead),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_status(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<LeadCreators>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .change_status(&mut *tx, &user, lead_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(lead)))
}

// PUT /api/leads/{id}/installer
#[utoipa::path(
    put,
    path = "/api/leads/{id}/installer",
    tag = "Leads",
    request_body = AssignInstallerPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Instalador atribuído", body = Lead),
        (status = 400, description = "Usuário não é um instalador ativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_installer(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<StaffOnly>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<AssignInstallerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .assign_installer(&mut *tx, &user, lead_id, payload.installer_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(lead)))
}

// PUT /api/leads/{id}/customer
#[utoipa::path(
    put,
    path = "/api/leads/{id}/customer",
    tag = "Leads",
    request_body = LinkCustomerPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Conta de cliente vinculada", body = Lead),
        (status = 400, description = "Usuário não é cliente")
    ),
    security(("api_jwt" = []))
)]
pub async fn link_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<StaffOnly>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<LinkCustomerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let lead = app_state
        .lead_service
        .link_customer(&mut *tx, &user, lead_id, payload.customer_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(lead)))
}

// GET /api/leads/{id}/activity
#[utoipa::path(
    get,
    path = "/api/leads/{id}/activity",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Histórico do lead (mais recente primeiro)", body = Vec<ActivityLog>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_activity(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let logs = app_state
        .activity_service
        .list_for_lead(&mut *tx, &user, lead_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(logs)))
}
