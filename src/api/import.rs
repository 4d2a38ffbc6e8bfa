//! Bulk import endpoints
//!
//! Rows arrive as a JSON array of `{column: value}` objects or as a CSV file
//! in the multipart field `file`.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::Multipart;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::import_report::{ItemImportReport, MemberImportReport, RawRow},
};

/// Multipart upload carrying a CSV file
#[derive(ToSchema)]
pub struct CsvUpload {
    /// CSV text with a header line
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

fn json_rows(payload: Result<Json<Vec<RawRow>>, JsonRejection>) -> AppResult<Vec<RawRow>> {
    payload
        .map(|Json(rows)| rows)
        .map_err(|e| AppError::Transport(format!("Cannot read import rows: {}", e.body_text())))
}

/// Contents of the `file` field of a multipart upload
async fn uploaded_file(mut multipart: Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Transport(format!("Cannot read upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Transport(format!("Cannot read uploaded file: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(AppError::Validation("No file provided".to_string()))
}

/// Import item rows (JSON)
#[utoipa::path(
    post,
    path = "/import/items",
    tag = "import",
    request_body(content = Vec<HashMap<String, String>>, description = "Item rows: name, category, description, serialNumber, condition, notes"),
    responses(
        (status = 200, description = "Import report, also when rows failed", body = ItemImportReport),
        (status = 400, description = "Empty, oversized or unreadable input", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_items(
    State(state): State<crate::AppState>,
    payload: Result<Json<Vec<RawRow>>, JsonRejection>,
) -> AppResult<Json<ItemImportReport>> {
    let report = state.services.import.import_items(json_rows(payload)?).await?;
    Ok(Json(report))
}

/// Import item rows from an uploaded CSV file
#[utoipa::path(
    post,
    path = "/import/items/csv",
    tag = "import",
    request_body(content = CsvUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import report, also when rows failed", body = ItemImportReport),
        (status = 400, description = "Missing, empty, oversized or unreadable file", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_items_csv(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> AppResult<Json<ItemImportReport>> {
    let file = uploaded_file(multipart).await?;
    let report = state.services.import.import_items_csv(&file).await?;
    Ok(Json(report))
}

/// Import member rows (JSON)
#[utoipa::path(
    post,
    path = "/import/members",
    tag = "import",
    request_body(content = Vec<HashMap<String, String>>, description = "Member rows: name, email, phone, role"),
    responses(
        (status = 200, description = "Import report, also when rows failed", body = MemberImportReport),
        (status = 400, description = "Empty, oversized or unreadable input", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_members(
    State(state): State<crate::AppState>,
    payload: Result<Json<Vec<RawRow>>, JsonRejection>,
) -> AppResult<Json<MemberImportReport>> {
    let report = state.services.import.import_members(json_rows(payload)?).await?;
    Ok(Json(report))
}

/// Import member rows from an uploaded CSV file
#[utoipa::path(
    post,
    path = "/import/members/csv",
    tag = "import",
    request_body(content = CsvUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import report, also when rows failed", body = MemberImportReport),
        (status = 400, description = "Missing, empty, oversized or unreadable file", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_members_csv(
    State(state): State<crate::AppState>,
    multipart: Multipart,
) -> AppResult<Json<MemberImportReport>> {
    let file = uploaded_file(multipart).await?;
    let report = state.services.import.import_members_csv(&file).await?;
    Ok(Json(report))
}
