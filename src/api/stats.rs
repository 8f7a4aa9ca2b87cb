//! Statistics endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, services::stats::LibraryStats};

use super::AuthenticatedUser;

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = LibraryStats),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LibraryStats>> {
    claims.require_admin()?;

    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}
