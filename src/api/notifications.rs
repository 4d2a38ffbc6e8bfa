//! Overdue notification endpoints

use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    services::overdue::ScanSummary,
};

/// Run an overdue scan now
#[utoipa::path(
    post,
    path = "/notifications/overdue/scan",
    tag = "notifications",
    responses(
        (status = 200, description = "Scan summary", body = ScanSummary),
        (status = 400, description = "Email delivery is disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn scan_overdue(State(state): State<crate::AppState>) -> AppResult<Json<ScanSummary>> {
    if !state.config.email.enabled {
        return Err(AppError::Validation(
            "Email notifications are disabled".to_string(),
        ));
    }
    let summary = state.services.overdue.scan_and_notify().await?;
    Ok(Json(summary))
}
