//! Packing list endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::packing_list::{
        AddPackingListEntry, CreatePackingList, PackingList, PackingListDetails, PackingListEntry,
        PackingListSummary, UpdatePackingList, UpdatePackingListEntry,
    },
};

/// List packing lists, newest first
#[utoipa::path(
    get,
    path = "/packing-lists",
    tag = "packing-lists",
    responses(
        (status = 200, description = "Packing lists", body = Vec<PackingListSummary>)
    )
)]
pub async fn list_packing_lists(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<PackingListSummary>>> {
    let lists = state.services.packing_lists.list().await?;
    Ok(Json(lists))
}

/// Get a packing list with its entries
#[utoipa::path(
    get,
    path = "/packing-lists/{id}",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID")
    ),
    responses(
        (status = 200, description = "Packing list", body = PackingListDetails),
        (status = 404, description = "Packing list not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_packing_list(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<PackingListDetails>> {
    let list = state.services.packing_lists.get(id).await?;
    Ok(Json(list))
}

/// Create a packing list
#[utoipa::path(
    post,
    path = "/packing-lists",
    tag = "packing-lists",
    request_body = CreatePackingList,
    responses(
        (status = 201, description = "Packing list created", body = PackingList),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_packing_list(
    State(state): State<crate::AppState>,
    Json(data): Json<CreatePackingList>,
) -> AppResult<(StatusCode, Json<PackingList>)> {
    let list = state.services.packing_lists.create(data).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// Update a packing list
#[utoipa::path(
    put,
    path = "/packing-lists/{id}",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID")
    ),
    request_body = UpdatePackingList,
    responses(
        (status = 200, description = "Packing list updated", body = PackingList),
        (status = 404, description = "Packing list not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_packing_list(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdatePackingList>,
) -> AppResult<Json<PackingList>> {
    let list = state.services.packing_lists.update(id, data).await?;
    Ok(Json(list))
}

/// Delete a packing list and its entries
#[utoipa::path(
    delete,
    path = "/packing-lists/{id}",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID")
    ),
    responses(
        (status = 204, description = "Packing list deleted"),
        (status = 404, description = "Packing list not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_packing_list(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.packing_lists.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add an item to a packing list
#[utoipa::path(
    post,
    path = "/packing-lists/{id}/entries",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID")
    ),
    request_body = AddPackingListEntry,
    responses(
        (status = 201, description = "Entry added", body = PackingListEntry),
        (status = 400, description = "Invalid quantity", body = crate::error::ErrorResponse),
        (status = 404, description = "Packing list or item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_entry(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<AddPackingListEntry>,
) -> AppResult<(StatusCode, Json<PackingListEntry>)> {
    let entry = state.services.packing_lists.add_entry(id, data).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Update a packing list entry
#[utoipa::path(
    put,
    path = "/packing-lists/{id}/entries/{entry_id}",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID"),
        ("entry_id" = i32, Path, description = "Entry ID")
    ),
    request_body = UpdatePackingListEntry,
    responses(
        (status = 200, description = "Entry updated", body = PackingListEntry),
        (status = 404, description = "Entry not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_entry(
    State(state): State<crate::AppState>,
    Path((id, entry_id)): Path<(i32, i32)>,
    Json(data): Json<UpdatePackingListEntry>,
) -> AppResult<Json<PackingListEntry>> {
    let entry = state
        .services
        .packing_lists
        .update_entry(id, entry_id, data)
        .await?;
    Ok(Json(entry))
}

/// Remove an entry from a packing list
#[utoipa::path(
    delete,
    path = "/packing-lists/{id}/entries/{entry_id}",
    tag = "packing-lists",
    params(
        ("id" = i32, Path, description = "Packing list ID"),
        ("entry_id" = i32, Path, description = "Entry ID")
    ),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 404, description = "Entry not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_entry(
    State(state): State<crate::AppState>,
    Path((id, entry_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    state
        .services
        .packing_lists
        .remove_entry(id, entry_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
