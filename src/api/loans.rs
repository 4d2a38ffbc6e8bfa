//! Checkout ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{CloseLoan, CreateLoan, LoanDetails, LoanQuery},
};

/// List loans: all (default), active or overdue
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state
        .services
        .loans
        .list_loans(query.status.unwrap_or_default())
        .await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Check an item out
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan opened", body = LoanDetails),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Item or member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item already on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state.services.loans.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Check an item back in
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = CloseLoan,
    responses(
        (status = 200, description = "Loan closed", body = LoanDetails),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "No open loan with this ID", body = crate::error::ErrorResponse)
    )
)]
pub async fn check_in(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(request): Json<CloseLoan>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.check_in(id, request).await?;
    Ok(Json(loan))
}
