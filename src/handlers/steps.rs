// src/handlers/steps.rs

use axum::{
    extract::{Path, State},
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
        rbac::{AdminOnly, RequireRole},
    },
    models::steps::{
        CompleteStepPayload, CreateStepPayload, ReorderStepsPayload, StepDefinition, Timeline, UpdateStepPayload,
    },
};

// =============================================================================
//  CONFIGURAÇÃO MESTRE (ADMIN)
// =============================================================================

// GET /api/steps
#[utoipa::path(
    get,
    path = "/api/steps",
    tag = "Steps",
    responses(
        (status = 200, description = "Etapas mestre em ordem", body = Vec<StepDefinition>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_steps(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let steps = app_state
        .workflow_service
        .list_steps(&app_state.db_pool)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(steps)))
}

// POST /api/steps
#[utoipa::path(
    post,
    path = "/api/steps",
    tag = "Steps",
    request_body = CreateStepPayload,
    responses(
        (status = 201, description = "Etapa criada", body = StepDefinition),
        (status = 409, description = "Slug já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_step(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireRole<AdminOnly>,
    Json(payload): Json<CreateStepPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let step = app_state
        .workflow_service
        .create_step(&app_state.db_pool, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(step)))
}

// PATCH /api/steps/{id}
#[utoipa::path(
    patch,
    path = "/api/steps/{id}",
    tag = "Steps",
    request_body = UpdateStepPayload,
    params(("id" = Uuid, Path, description = "ID da etapa mestre")),
    responses(
        (status = 200, description = "Etapa atualizada", body = StepDefinition),
        (status = 404, description = "Etapa não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_step(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireRole<AdminOnly>,
    Path(step_id): Path<Uuid>,
    Json(payload): Json<UpdateStepPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let step = app_state
        .workflow_service
        .update_step(&app_state.db_pool, step_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(step)))
}

// PUT /api/steps/order
#[utoipa::path(
    put,
    path = "/api/steps/order",
    tag = "Steps",
    request_body = ReorderStepsPayload,
    responses(
        (status = 200, description = "Nova ordem aplicada", body = Vec<StepDefinition>),
        (status = 400, description = "Lista não contém todas as etapas exatamente uma vez")
    ),
    security(("api_jwt" = []))
)]
pub async fn reorder_steps(
    State(app_state): State<AppState>,
    locale: Locale,
    _admin: RequireRole<AdminOnly>,
    Json(payload): Json<ReorderStepsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let steps = app_state
        .workflow_service
        .reorder_steps(&app_state.db_pool, &payload.step_ids)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(steps)))
}

// =============================================================================
//  TIMELINE DO LEAD
// =============================================================================

// GET /api/leads/{id}/timeline
#[utoipa::path(
    get,
    path = "/api/leads/{id}/timeline",
    tag = "Timeline",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Etapas do lead com progresso", body = Timeline),
        (status = 404, description = "Lead inexistente ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_timeline(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let timeline = app_state
        .workflow_service
        .timeline(&mut *tx, &user, lead_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(timeline)))
}

// POST /api/leads/{id}/steps/{lead_step_id}/complete
#[utoipa::path(
    post,
    path = "/api/leads/{id}/steps/{lead_step_id}/complete",
    tag = "Timeline",
    request_body = CompleteStepPayload,
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("lead_step_id" = Uuid, Path, description = "ID da etapa do lead")
    ),
    responses(
        (status = 200, description = "Etapa concluída; timeline atualizada", body = Timeline),
        (status = 400, description = "Observação ou anexo obrigatório ausente"),
        (status = 403, description = "Papel não autorizado para a etapa"),
        (status = 409, description = "Etapa anterior pendente ou pré-condição não atendida")
    ),
    security(("api_jwt" = []))
)]
pub async fn complete_step(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((lead_id, lead_step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CompleteStepPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let timeline = app_state
        .workflow_service
        .complete_step(&mut *tx, &user, lead_id, lead_step_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(timeline)))
}

// POST /api/leads/{id}/steps/{lead_step_id}/reopen
#[utoipa::path(
    post,
    path = "/api/leads/{id}/steps/{lead_step_id}/reopen",
    tag = "Timeline",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("lead_step_id" = Uuid, Path, description = "ID da etapa do lead")
    ),
    responses(
        (status = 200, description = "Etapa reaberta", body = Timeline),
        (status = 409, description = "Etapa pendente ou etapa posterior concluída")
    ),
    security(("api_jwt" = []))
)]
pub async fn reopen_step(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<AdminOnly>,
    Path((lead_id, lead_step_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let timeline = app_state
        .workflow_service
        .reopen_step(&mut *tx, &user, lead_id, lead_step_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(timeline)))
}
