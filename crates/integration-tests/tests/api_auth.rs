//! Staff authentication and role checks.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_health_and_unknown_endpoint() {
    let app = TestApp::new().await;

    let (status, _) = app.raw(axum::http::Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn test_register_login_profile() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "Jan@Example.nl",
                "password": PASSWORD,
                "first_name": "Jan",
                "last_name": "Jansen",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["email"], "jan@example.nl");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "jan@example.nl", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/auth/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["first_name"], "Jan");
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let app = TestApp::new().await;
    let body = json!({
        "email": "dubbel@example.nl",
        "password": PASSWORD,
        "first_name": "Dubbel",
        "last_name": "Account",
    });

    let (status, _) = app.post("/api/auth/register", None, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post("/api/auth/register", None, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "email": "kees@example.nl",
                "password": PASSWORD,
                "first_name": "Kees",
                "last_name": "Smit",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "kees@example.nl", "password": "verkeerd" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/customers", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access token required");

    let (status, _) = app.get("/api/customers", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let token = app.staff_token(UserRole::User).await;

    let (status, _) = app
        .put(
            "/api/auth/change-password",
            Some(&token),
            json!({ "current_password": "verkeerd", "new_password": "nieuw12345" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .put(
            "/api/auth/change-password",
            Some(&token),
            json!({ "current_password": PASSWORD, "new_password": "nieuw12345" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_gates() {
    let app = TestApp::new().await;
    let user = app.staff_token(UserRole::User).await;
    let manager = app.staff_token(UserRole::Manager).await;
    let admin = app.staff_token(UserRole::Admin).await;

    let product = json!({ "name": "Fietsbel", "purchase_price": 2.1, "selling_price": 6.95 });
    let (status, _) = app.post("/api/products", Some(&user), product.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/products", Some(&manager), product).await;
    assert_eq!(status, StatusCode::CREATED);

    let setting = json!({ "value": "abc" });
    let (status, _) = app
        .put("/api/settings/dhl/api_key", Some(&manager), setting.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .put("/api/settings/dhl/api_key", Some(&admin), setting)
        .await;
    assert_eq!(status, StatusCode::OK);
}
