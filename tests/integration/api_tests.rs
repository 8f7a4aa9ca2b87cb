//! API integration tests against a running server and database

use bibliotheca_server::models::{enums::Role, user::UserClaims};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const JWT_SECRET: &str = "change-this-secret-in-production";

/// Mint a bearer token the way the identity provider would
fn token_for(user_id: i32, role: Role) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: format!("user-{}", user_id),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(JWT_SECRET)
    .expect("Failed to sign token")
}

fn unique_suffix() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

async fn create_member(client: &Client, admin: &str) -> i32 {
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "email": format!("reader{}@library.local", unique_suffix()),
            "first_name": "Ada",
            "last_name": "Reader",
            "date_of_birth": "1990-05-17"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No user id") as i32
}

async fn create_book(client: &Client, librarian: &str, copies: i32) -> i32 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(librarian)
        .json(&json!({
            "title": "Nineteen Eighty-Four",
            "isbn": "978-0451524935",
            "published_year": 1949,
            "total_copies": copies,
            "category_id": 1,
            "publisher_id": 1,
            "author_ids": [1]
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["book"]["isbn"], "9780451524935");
    assert_eq!(body["book"]["available_copies"], copies);
    body["book"]["id"].as_i64().expect("No book id") as i32
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_invalid_isbn_rejected() {
    let client = Client::new();
    let librarian = token_for(0, Role::Librarian);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&librarian)
        .json(&json!({
            "title": "Bad checksum",
            "isbn": "1234567890123",
            "published_year": 2001,
            "total_copies": 1,
            "category_id": 1,
            "publisher_id": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_and_reservation_flow() {
    let client = Client::new();
    let admin = token_for(0, Role::Admin);

    let book_id = create_book(&client, &admin, 1).await;
    let first = token_for(create_member(&client, &admin).await, Role::Member);
    let second = token_for(create_member(&client, &admin).await, Role::Member);

    // First reader takes the only copy
    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .bearer_auth(&first)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    // Second reader finds the shelf empty and queues up
    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .bearer_auth(&second)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "BookNotAvailable");

    let response = client
        .post(format!("{}/books/{}/reserve", BASE_URL, book_id))
        .bearer_auth(&second)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let reservation: Value = response.json().await.expect("Failed to parse response");

    // Only the borrower may return from a member account
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&second)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&first)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let receipt: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(receipt["loan"]["status"], "returned");
    assert_eq!(receipt["fulfilled_reservation"]["id"], reservation["id"]);
    assert_eq!(receipt["fulfilled_reservation"]["status"], "fulfilled");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&first)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotActive");
}

#[tokio::test]
#[ignore]
async fn test_member_cannot_list_users() {
    let client = Client::new();
    let member = token_for(1, Role::Member);

    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&member)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}
