//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{LoanDetails, LoanFilter},
    },
    services::circulation::ReturnReceipt,
};

use super::AuthenticatedUser;

/// Loan listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<LoanStatus>,
}

impl From<LoanQuery> for LoanFilter {
    fn from(query: LoanQuery) -> Self {
        LoanFilter {
            user_id: query.user_id,
            book_id: query.book_id,
            status: query.status,
            due_before: None,
        }
    }
}

/// List loans, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<LoanDetails>),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_staff()?;

    let loans = state.services.circulation.list_loans(&query.into()).await?;
    Ok(Json(loans))
}

/// Active loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanDetails>),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_staff()?;

    let loans = state.services.circulation.overdue_loans().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let details = state.services.circulation.get_loan(id).await?;

    // Members only see their own loans
    if !claims.is_staff() && details.loan.user_id != claims.user_id {
        return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
    }

    Ok(Json(details))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnReceipt),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not active")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnReceipt>> {
    let receipt = if claims.is_staff() {
        state.services.circulation.return_book(id).await?
    } else {
        state
            .services
            .circulation
            .return_own_book(id, claims.user_id)
            .await?
    };

    Ok(Json(receipt))
}
