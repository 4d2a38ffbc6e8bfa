//! Membership registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        member::{CreateMember, Member, MemberQuery, MemberWithLoans},
    },
};

/// List members with their open loan counts
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Members ordered by name", body = Vec<MemberWithLoans>)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<MemberWithLoans>>> {
    let members = state
        .services
        .members
        .list_members(query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(members))
}

/// Get member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Register a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let member = state.services.members.create_member(data).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Deactivate a member (soft delete)
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member deactivated", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn deactivate_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.deactivate_member(id).await?;
    Ok(Json(member))
}

/// Loans a member currently holds
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanDetails>),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_member_loans(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_member_loans(id).await?;
    Ok(Json(loans))
}
