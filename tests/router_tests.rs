//! In-process router tests that never reach the database

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use bibliotheca_server::{
    api,
    clock::SystemClock,
    config::AppConfig,
    models::{enums::Role, user::UserClaims},
    repository::Repository,
    services::Services,
    AppState,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, String) {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();
    let services = Services::new(Repository::new(pool), &config, Arc::new(SystemClock));
    let secret = config.auth.jwt_secret.clone();
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    (api::create_router(state), secret)
}

fn bearer(role: Role, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let token = UserClaims {
        sub: "tester".to_string(),
        user_id: 5,
        role,
        exp: now + 600,
        iat: now,
    }
    .create_token(secret)
    .unwrap();
    format!("Bearer {}", token)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/v1/books").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "NotAuthorized");
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/v1/me")
                .header(AUTHORIZATION, bearer(Role::Admin, "not-the-secret"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_checks_run_before_storage() {
    let (app, secret) = app();

    for (method, uri) in [
        ("GET", "/api/v1/stats"),
        ("GET", "/api/v1/users"),
        ("GET", "/api/v1/loans/overdue"),
        ("GET", "/api/v1/reservations/pending"),
        ("DELETE", "/api/v1/books/1"),
        ("GET", "/api/v1/users/6/loans"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(AUTHORIZATION, bearer(Role::Member, &secret))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/books/{id}/borrow"].is_object());
}
