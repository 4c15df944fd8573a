// src/handlers/materials.rs

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
        rbac::{MaterialVerifiers, RequireRole, StaffOnly},
    },
    models::materials::{
        ConfigureMaterialsPayload, CreateMaterialPayload, DispatchMaterialsPayload, LeadMaterialsView, Material,
        MaterialListQuery, UpdateMaterialPayload, VerifyMaterialsPayload,
    },
};

// =============================================================================
//  CATÁLOGO
// =============================================================================

// GET /api/materials
#[utoipa::path(
    get,
    path = "/api/materials",
    tag = "Materials",
    params(MaterialListQuery),
    responses(
        (status = 200, description = "Catálogo de materiais", body = Vec<Material>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<MaterialListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let materials = app_state
        .material_service
        .list_materials(&app_state.db_pool, query.include_inactive)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(materials)))
}

// POST /api/materials
#[utoipa::path(
    post,
    path = "/api/materials",
    tag = "Materials",
    request_body = CreateMaterialPayload,
    responses(
        (status = 201, description = "Material criado", body = Material),
        (status = 409, description = "Nome já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_material(
    State(app_state): State<AppState>,
    locale: Locale,
    _staff: RequireRole<StaffOnly>,
    Json(payload): Json<CreateMaterialPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let material = app_state
        .material_service
        .create_material(&app_state.db_pool, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(material)))
}

// PATCH /api/materials/{id}
#[utoipa::path(
    patch,
    path = "/api/materials/{id}",
    tag = "Materials",
    request_body = UpdateMaterialPayload,
    params(("id" = Uuid, Path, description = "ID do material")),
    responses(
        (status = 200, description = "Material atualizado", body = Material),
        (status = 404, description = "Material não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_material(
    State(app_state): State<AppState>,
    locale: Locale,
    _staff: RequireRole<StaffOnly>,
    Path(material_id): Path<Uuid>,
    Json(payload): Json<UpdateMaterialPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let material = app_state
        .material_service
        .update_material(&app_state.db_pool, material_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(material)))
}

// =============================================================================
//  MATERIAIS DO LEAD
// =============================================================================

// GET /api/leads/{id}/materials
#[utoipa::path(
    get,
    path = "/api/leads/{id}/materials",
    tag = "Materials",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Materiais do lead com resumo", body = LeadMaterialsView)
    ),
    security(("api_jwt" = []))
)]
pub async fn lead_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let view = app_state
        .material_service
        .lead_materials(&mut *tx, &user, lead_id)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(view)))
}

// PUT /api/leads/{id}/materials
#[utoipa::path(
    put,
    path = "/api/leads/{id}/materials",
    tag = "Materials",
    request_body = ConfigureMaterialsPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Materiais exigidos configurados", body = LeadMaterialsView),
        (status = 400, description = "Quantidade inválida ou material inativo"),
        (status = 409, description = "Material já despachado")
    ),
    security(("api_jwt" = []))
)]
pub async fn configure_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<StaffOnly>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<ConfigureMaterialsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let view = app_state
        .material_service
        .configure(&mut *tx, &user, lead_id, &payload)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(view)))
}

// POST /api/leads/{id}/materials/dispatch
#[utoipa::path(
    post,
    path = "/api/leads/{id}/materials/dispatch",
    tag = "Materials",
    request_body = DispatchMaterialsPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Despacho registrado", body = LeadMaterialsView),
        (status = 409, description = "Material não configurado ou já verificado")
    ),
    security(("api_jwt" = []))
)]
pub async fn dispatch_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<StaffOnly>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<DispatchMaterialsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let view = app_state
        .material_service
        .dispatch(&mut *tx, &user, lead_id, &payload.items)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(view)))
}

// POST /api/leads/{id}/materials/verify
#[utoipa::path(
    post,
    path = "/api/leads/{id}/materials/verify",
    tag = "Materials",
    request_body = VerifyMaterialsPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Recebimento verificado", body = LeadMaterialsView),
        (status = 409, description = "Material ainda não despachado")
    ),
    security(("api_jwt" = []))
)]
pub async fn verify_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(user, _): RequireRole<MaterialVerifiers>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<VerifyMaterialsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    payload.validate().map_err(|e| to_api(e.into()))?;

    let mut tx = begin_rls_transaction(&app_state, &user).await.map_err(to_api)?;
    let view = app_state
        .material_service
        .verify(&mut *tx, &user, lead_id, &payload.items)
        .await
        .map_err(to_api)?;
    tx.commit().await.map_err(|e| to_api(e.into()))?;

    Ok((StatusCode::OK, Json(view)))
}
