//! Publisher endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::publisher::{Publisher, PublisherInput},
};

use super::AuthenticatedUser;

/// List publishers
#[utoipa::path(
    get,
    path = "/publishers",
    tag = "catalog",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Publishers", body = Vec<Publisher>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_publishers(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Publisher>>> {
    let publishers = state.services.catalog.list_publishers().await?;
    Ok(Json(publishers))
}

/// Get publisher by ID
#[utoipa::path(
    get,
    path = "/publishers/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    responses(
        (status = 200, description = "Publisher details", body = Publisher),
        (status = 404, description = "Publisher not found")
    )
)]
pub async fn get_publisher(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Publisher>> {
    let publisher = state.services.catalog.get_publisher(id).await?;
    Ok(Json(publisher))
}

/// Create a publisher
#[utoipa::path(
    post,
    path = "/publishers",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = PublisherInput,
    responses(
        (status = 201, description = "Publisher created", body = Publisher),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Insufficient privileges")
    )
)]
pub async fn create_publisher(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<PublisherInput>,
) -> AppResult<(StatusCode, Json<Publisher>)> {
    claims.require_staff()?;

    let publisher = state.services.catalog.create_publisher(input).await?;
    Ok((StatusCode::CREATED, Json(publisher)))
}

/// Update a publisher
#[utoipa::path(
    put,
    path = "/publishers/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    request_body = PublisherInput,
    responses(
        (status = 200, description = "Publisher updated", body = Publisher),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Publisher not found")
    )
)]
pub async fn update_publisher(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<PublisherInput>,
) -> AppResult<Json<Publisher>> {
    claims.require_staff()?;

    let publisher = state.services.catalog.update_publisher(id, input).await?;
    Ok(Json(publisher))
}

/// Delete a publisher
#[utoipa::path(
    delete,
    path = "/publishers/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Publisher ID")
    ),
    responses(
        (status = 204, description = "Publisher deleted"),
        (status = 404, description = "Publisher not found"),
        (status = 409, description = "Publisher is still referenced by books")
    )
)]
pub async fn delete_publisher(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;

    state.services.catalog.delete_publisher(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
