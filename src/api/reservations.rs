//! Reservation endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::reservation::{Reservation, ReservationDetails},
};

use super::AuthenticatedUser;

/// Pending reservations in queue order
#[utoipa::path(
    get,
    path = "/reservations/pending",
    tag = "reservations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending reservations, oldest first", body = Vec<ReservationDetails>),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn pending_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    claims.require_staff()?;

    let reservations = state.services.circulation.pending_reservations().await?;
    Ok(Json(reservations))
}

/// Get reservation by ID
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetails),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state.services.circulation.get_reservation(id).await?;

    if !claims.is_staff() && details.reservation.user_id != claims.user_id {
        return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
    }

    Ok(Json(details))
}

/// Cancel one of the caller's pending reservations
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation is no longer pending")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .circulation
        .cancel_reservation(id, claims.user_id)
        .await?;
    Ok(Json(reservation))
}
