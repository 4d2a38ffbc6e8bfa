//! Item registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        item::{CreateItem, Item, ItemDetails, ItemQuery, ItemSummary, UpdateItem},
        loan::LoanDetails,
    },
};

/// List items with optional filters
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "Matching items", body = Vec<ItemSummary>)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<Vec<ItemSummary>>> {
    let items = state.services.catalog.list_items(&query).await?;
    Ok(Json(items))
}

/// Get item details, including its open loan
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = ItemDetails),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ItemDetails>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Resolve a scanned token to its item
#[utoipa::path(
    get,
    path = "/items/scan/{token}",
    tag = "items",
    params(
        ("token" = String, Path, description = "Decoded scan token")
    ),
    responses(
        (status = 200, description = "Item details", body = ItemDetails),
        (status = 404, description = "Unknown token", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item_by_scan_token(
    State(state): State<crate::AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<ItemDetails>> {
    let item = state.services.catalog.get_item_by_scan_token(&token).await?;
    Ok(Json(item))
}

/// Register a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Serial number already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = state.services.catalog.create_item(data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update an item
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Serial number already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdateItem>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.update_item(id, data).await?;
    Ok(Json(item))
}

/// Deactivate an item (soft delete)
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item deactivated", body = Item),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn deactivate_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.deactivate_item(id).await?;
    Ok(Json(item))
}

/// Loan history of an item, newest first
#[utoipa::path(
    get,
    path = "/items/{id}/loans",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Loan history", body = Vec<LoanDetails>),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_item_loans(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_item_history(id).await?;
    Ok(Json(loans))
}
