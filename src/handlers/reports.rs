// src/handlers/reports.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{RequireRole, StaffOnly},
    },
    models::reports::{AgentPerformance, LeadSummaryReport, ReportQuery, StepLoad},
};

// GET /api/reports/summary
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    tag = "Reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Leads por status e taxa de conversão", body = LeadSummaryReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn lead_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    _staff: RequireRole<StaffOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .report_service
        .lead_summary(&app_state.db_pool, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(report)))
}

// GET /api/reports/agents
#[utoipa::path(
    get,
    path = "/api/reports/agents",
    tag = "Reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Desempenho por agente", body = Vec<AgentPerformance>)
    ),
    security(("api_jwt" = []))
)]
pub async fn agent_performance(
    State(app_state): State<AppState>,
    locale: Locale,
    _staff: RequireRole<StaffOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .report_service
        .agent_performance(&app_state.db_pool, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(rows)))
}

// GET /api/reports/steps
#[utoipa::path(
    get,
    path = "/api/reports/steps",
    tag = "Reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Leads abertos parados em cada etapa", body = Vec<StepLoad>)
    ),
    security(("api_jwt" = []))
)]
pub async fn step_load(
    State(app_state): State<AppState>,
    locale: Locale,
    _staff: RequireRole<StaffOnly>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .report_service
        .step_load(&app_state.db_pool, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(rows)))
}
