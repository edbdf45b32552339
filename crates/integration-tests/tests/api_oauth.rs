//! Connecting ad accounts through OAuth.

use axum::http::{Method, StatusCode, header};

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;
use webshop_crm_server::config::{AppConfig, OAuthApp, OAuthConfig};

fn with_google() -> AppConfig {
    AppConfig {
        oauth: OAuthConfig {
            google: Some(OAuthApp {
                client_id: "google-client".to_string(),
                client_secret: None,
            }),
            meta: Some(OAuthApp {
                client_id: "meta-app".to_string(),
                client_secret: None,
            }),
        },
        ..AppConfig::for_tests()
    }
}

#[tokio::test]
async fn test_status_reports_configured_providers() {
    let app = TestApp::new().await;
    let admin = app.staff_token(UserRole::Admin).await;

    let (status, _) = app.get("/api/oauth/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/oauth/status", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["google_oauth_enabled"], false);
    assert_eq!(body["meta_oauth_enabled"], false);

    let app = TestApp::with_config(with_google()).await;
    let admin = app.staff_token(UserRole::Admin).await;
    let (_, body) = app.get("/api/oauth/status", Some(&admin)).await;
    assert_eq!(body["google_oauth_enabled"], true);
    assert_eq!(body["meta_oauth_enabled"], true);
}

#[tokio::test]
async fn test_start_without_client_id_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/oauth/google/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("GOOGLE_OAUTH_CLIENT_ID"));

    let (status, body) = app.get("/api/oauth/meta/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("META_APP_ID"));
}

#[tokio::test]
async fn test_start_redirects_to_consent_page() {
    let app = TestApp::with_config(with_google()).await;

    let response = app
        .response(Method::GET, "/api/oauth/google/start", None, None)
        .await;
    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("client_id=google-client"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("state="));

    let response = app.response(Method::GET, "/api/oauth/meta/start", None, None).await;
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://www.facebook.com/"));
    assert!(location.contains("client_id=meta-app"));
}

#[tokio::test]
async fn test_callback_rejects_missing_code_and_bad_state() {
    let app = TestApp::with_config(with_google()).await;

    let (status, _) = app.get("/api/oauth/google/callback", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/api/oauth/google/callback?error=access_denied", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get("/api/oauth/google/callback?code=abc&state=vervalst", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("state"));

    // A state issued for Meta is not accepted by the Google callback
    let meta_state = app.state.keys().oauth_state("meta").unwrap();
    let (status, _) = app
        .get(&format!("/api/oauth/google/callback?code=abc&state={meta_state}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_without_app_secret_fails_upstream() {
    let app = TestApp::with_config(with_google()).await;
    let state = app.state.keys().oauth_state("meta").unwrap();

    let (status, body) = app
        .get(&format!("/api/oauth/meta/callback?code=abc&state={state}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "External service error");
}
