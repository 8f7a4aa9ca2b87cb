//! Endpoints scoped to the authenticated user

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        reservation::ReservationDetails,
        user::{UpdateProfile, User},
    },
};

use super::AuthenticatedUser;

/// Get the current user's account
#[utoipa::path(
    get,
    path = "/me",
    tag = "me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Token refers to an unknown user")
    )
)]
pub async fn get_me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_user(claims.user_id).await?;
    Ok(Json(user))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/me",
    tag = "me",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn update_me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    let user = state
        .services
        .users
        .update_profile(claims.user_id, profile)
        .await?;
    Ok(Json(user))
}

/// Loans the current user still holds
#[utoipa::path(
    get,
    path = "/me/loans",
    tag = "me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>)
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state
        .services
        .circulation
        .active_user_loans(claims.user_id)
        .await?;
    Ok(Json(loans))
}

#[utoipa::path(
    get,
    path = "/me/reservations",
    tag = "me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reservations of the current user", body = Vec<ReservationDetails>)
    )
)]
pub async fn my_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state
        .services
        .circulation
        .user_reservations(claims.user_id)
        .await?;
    Ok(Json(reservations))
}
