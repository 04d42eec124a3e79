//! API integration tests
//!
//! Run against a live server with a migrated database and Redis:
//! `cargo test --test api_tests -- --ignored`. Admin tests expect an
//! ADMIN account whose credentials are in `UNILIB_TEST_ADMIN_EMAIL` and
//! `UNILIB_TEST_ADMIN_PASSWORD`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_email() -> String {
    format!("student-{}@uni.test", Uuid::new_v4().simple())
}

/// Register a fresh account and return (token, user json)
async fn sign_up(client: &Client, email: &str) -> (String, Value) {
    let response = client
        .post(format!("{}/auth/sign-up", BASE_URL))
        .json(&json!({
            "fullname": "Integration Student",
            "email": email,
            "university_id": 4242,
            "password": "correct-horse-battery",
            "university_card": "/ids/integration.png"
        }))
        .send()
        .await
        .expect("Failed to send sign-up request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse sign-up response");
    assert_eq!(body["success"], true);
    (
        body["data"]["token"].as_str().expect("No token in response").to_string(),
        body["data"]["user"].clone(),
    )
}

/// Sign in as the configured administrator
async fn admin_token(client: &Client) -> String {
    let email = std::env::var("UNILIB_TEST_ADMIN_EMAIL").unwrap_or_else(|_| "admin@uni.test".to_string());
    let password = std::env::var("UNILIB_TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "admin-password".to_string());

    let response = client
        .post(format!("{}/auth/sign-in", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send sign-in request");

    let body: Value = response.json().await.expect("Failed to parse sign-in response");
    body["data"]["token"].as_str().expect("No admin token").to_string()
}

async fn create_book(client: &Client, token: &str, copies: i32) -> Value {
    let response = client
        .post(format!("{}/admin/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": "Integration Testing in Practice",
            "author": "Jane Doe",
            "genre": "Software",
            "rating": 4,
            "total_copies": copies,
            "description": "A book created by the integration tests.",
            "cover_url": "/books/covers/integration.png",
            "cover_color": "#1a2b3c",
            "video_url": "/books/videos/integration.mp4",
            "summary": "Summary of the integration testing book."
        }))
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse book");
    body["data"].clone()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_sign_up_then_duplicate_is_rejected() {
    let client = Client::new();
    let email = unique_email();

    let (_token, user) = sign_up(&client, &email).await;
    assert_eq!(user["status"], "PENDING");
    assert!(user.get("password").is_none());

    let response = client
        .post(format!("{}/auth/sign-up", BASE_URL))
        .json(&json!({
            "fullname": "Integration Student",
            "email": email,
            "university_id": 4242,
            "password": "correct-horse-battery",
            "university_card": "/ids/integration.png"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
#[ignore]
async fn test_sign_in_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/sign-in", BASE_URL))
        .json(&json!({
            "email": unique_email(),
            "password": "definitely-wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_books_require_authentication() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_list_books_metadata() {
    let client = Client::new();
    let (token, _) = sign_up(&client, &unique_email()).await;

    let response = client
        .get(format!("{}/books?limit=5&sort=highestRated", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["data"].as_array().expect("data array").len() <= 5);
    assert_eq!(body["data"]["metadata"]["current_page"], 1);
}

#[tokio::test]
#[ignore]
async fn test_pending_user_cannot_borrow() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book = create_book(&client, &admin, 1).await;
    let (token, _) = sign_up(&client, &unique_email()).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book["id"].as_str().unwrap()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_last_copy_can_only_be_borrowed_once() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book = create_book(&client, &admin, 1).await;
    let book_id = book["id"].as_str().unwrap().to_string();

    let mut tokens = Vec::new();
    for _ in 0..2 {
        let (token, user) = sign_up(&client, &unique_email()).await;
        let response = client
            .put(format!("{}/admin/users/{}/status", BASE_URL, user["id"].as_str().unwrap()))
            .bearer_auth(&admin)
            .json(&json!({ "status": "APPROVED" }))
            .send()
            .await
            .expect("Failed to approve user");
        assert!(response.status().is_success());
        tokens.push(token);
    }

    let first = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .bearer_auth(&tokens[0])
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(first.status(), StatusCode::CREATED);
    let record: Value = first.json().await.expect("Failed to parse record");
    assert_eq!(record["data"]["status"], "BORROWED");

    let second = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .bearer_auth(&tokens[1])
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "Book is not available");

    // Returning the copy puts it back on the shelf
    let returned = client
        .put(format!(
            "{}/admin/borrow-records/{}/status",
            BASE_URL,
            record["data"]["id"].as_str().unwrap()
        ))
        .bearer_auth(&admin)
        .json(&json!({ "status": "RETURNED" }))
        .send()
        .await
        .expect("Failed to return");
    assert!(returned.status().is_success());
    let body: Value = returned.json().await.expect("Failed to parse record");
    assert!(body["data"]["return_date"].is_string());

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to get book")
        .json()
        .await
        .expect("Failed to parse book");
    assert_eq!(book["data"]["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_book_with_records_cannot_be_deleted() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book = create_book(&client, &admin, 2).await;
    let book_id = book["id"].as_str().unwrap();

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .delete(format!("{}/admin/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send delete");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["code"], "FOREIGN_KEY_VIOLATION");
}

#[tokio::test]
#[ignore]
async fn test_admin_routes_reject_regular_users() {
    let client = Client::new();
    let (token, _) = sign_up(&client, &unique_email()).await;

    let response = client
        .get(format!("{}/admin/stats", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_workflow_tick_requires_token() {
    let client = Client::new();

    let response = client
        .post(format!("{}/workflow/tick", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = std::env::var("UNILIB_WORKFLOW__CRON_TOKEN")
        .unwrap_or_else(|_| "change-this-token-in-production".to_string());
    let response = client
        .post(format!("{}/workflow/tick", BASE_URL))
        .header("x-workflow-token", token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse report");
    assert!(body["data"]["claimed"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_asset_auth_parameters() {
    let client = Client::new();

    let body: Value = client
        .get(format!("{}/assets/auth", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert!(body["token"].is_string());
    assert!(body["expire"].is_number());
    assert_eq!(body["signature"].as_str().map(str::len), Some(40));
    assert!(body["public_key"].is_string());
}
