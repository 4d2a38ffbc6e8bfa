//! Category endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::category::{Category, CategoryWithCount, CreateCategory},
};

/// List categories with item counts
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    responses(
        (status = 200, description = "Categories ordered by name", body = Vec<CategoryWithCount>)
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<CategoryWithCount>>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(categories))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid name", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = state.services.catalog.create_category(data).await?;
    Ok((StatusCode::CREATED, Json(category)))
}
