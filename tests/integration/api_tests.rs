//! API integration tests
//!
//! Run against a live server started with a bootstrap admin:
//! `LIBRARY_BOOTSTRAP__ADMIN_PASSWORD=... cargo test -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("LIBRARY_BOOTSTRAP__ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string()),
        std::env::var("LIBRARY_BOOTSTRAP__ADMIN_PASSWORD").unwrap_or_else(|_| "change-me-now".to_string()),
    )
}

async fn login(client: &Client, email: &str, password: &str) -> Value {
    let response = client
        .post(format!("{}/auth/token", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("Failed to parse login response")
}

/// Helper to get an admin token
async fn admin_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    let body = login(client, &email, &password).await;
    body["token"].as_str().expect("No token in response").to_string()
}

/// Create a plain member and return their token
async fn member_token(client: &Client, admin: &str) -> String {
    let email = format!("member-{}@library.local", uuid::Uuid::new_v4());
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "name": "Member",
            "email": email,
            "roles": ["user"],
            "password": "member-password",
            "password_confirm": "member-password"
        }))
        .send()
        .await
        .expect("Failed to create member");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = login(client, &email, "member-password").await;
    body["token"].as_str().expect("No token in response").to_string()
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
async fn test_login_issues_token_and_cookies() {
    let client = Client::new();
    let (email, password) = admin_credentials();

    let response = client
        .post(format!("{}/auth/token", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .cookies()
        .map(|c| c.name().to_string())
        .collect();
    assert!(cookies.contains(&"SESSION-COOKIE".to_string()));
    assert!(cookies.contains(&"XSRF-TOKEN".to_string()));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert!(body["csrf_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/auth/token", BASE_URL))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_missing_token_is_unauthorized() {
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
async fn test_member_cannot_manage_catalog() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client, &admin).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({
            "title": "Forbidden Book",
            "isbn": "9780000000001",
            "category": "none",
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_refresh_then_logout() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client, &admin).await;

    let response = client
        .post(format!("{}/auth/refresh", BASE_URL))
        .bearer_auth(&member)
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    let refreshed = body["token"].as_str().expect("No token").to_string();

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .bearer_auth(&refreshed)
        .send()
        .await
        .expect("Failed to logout");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Both tokens are still unexpired but the session is gone.
    for token in [&member, &refreshed] {
        let response = client
            .get(format!("{}/auth/me", BASE_URL))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
#[ignore]
async fn test_demotion_ends_session() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let email = format!("deputy-{}@library.local", uuid::Uuid::new_v4());
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Deputy",
            "email": email,
            "roles": ["admin"],
            "password": "deputy-password",
            "password_confirm": "deputy-password"
        }))
        .send()
        .await
        .expect("Failed to create deputy");
    assert_eq!(response.status(), StatusCode::CREATED);
    let deputy: Value = response.json().await.expect("Failed to parse user");
    let deputy_id = deputy["id"].as_str().expect("No user id").to_string();

    let body = login(&client, &email, "deputy-password").await;
    let deputy_token = body["token"].as_str().expect("No token in response").to_string();

    let response = client
        .put(format!("{}/users/{}", BASE_URL, deputy_id))
        .bearer_auth(&admin)
        .json(&json!({ "roles": ["user"] }))
        .send()
        .await
        .expect("Failed to update roles");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/auth/refresh", BASE_URL))
        .bearer_auth(&deputy_token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = login(&client, &email, "deputy-password").await;
    let demoted = body["token"].as_str().expect("No token in response").to_string();
    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&demoted)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_loan_lifecycle_tracks_quantity() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client, &admin).await;

    let isbn = format!("978{:010}", rand_suffix());
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Single Copy",
            "isbn": isbn,
            "category": "tests",
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);
    let book: Value = response.json().await.expect("Failed to parse book");
    let book_id = book["id"].as_str().expect("No book id").to_string();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to start loan");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_str().expect("No loan id").to_string();

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&member)
        .send()
        .await
        .expect("Failed to end loan");
    assert_eq!(response.status(), StatusCode::OK);

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&member)
        .send()
        .await
        .expect("Failed to fetch book")
        .json()
        .await
        .expect("Failed to parse book");
    assert_eq!(book["quantity"], 1);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to delete book");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

fn rand_suffix() -> u64 {
    uuid::Uuid::new_v4().as_u128() as u64 % 10_000_000_000
}
