//! Export and dashboard endpoints

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    models::report::{DashboardStats, ExportQuery},
    services::reports::render_csv,
};

/// Download a CSV export
#[utoipa::path(
    get,
    path = "/reports/export",
    tag = "reports",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String)
    )
)]
pub async fn export(
    State(state): State<crate::AppState>,
    Query(query): Query<ExportQuery>,
) -> AppResult<impl IntoResponse> {
    let export = state
        .services
        .reports
        .export(query.kind.unwrap_or_default())
        .await?;
    let body = render_csv(&export)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename()),
            ),
        ],
        body,
    ))
}

/// Dashboard figures
#[utoipa::path(
    get,
    path = "/reports/dashboard",
    tag = "reports",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats)
    )
)]
pub async fn dashboard(State(state): State<crate::AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = state.services.reports.dashboard().await?;
    Ok(Json(stats))
}
