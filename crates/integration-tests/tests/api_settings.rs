//! Integration credentials are stored write-only.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

#[tokio::test]
async fn test_values_are_masked() {
    let app = TestApp::new().await;
    let admin = app.staff_token(UserRole::Admin).await;

    let (status, _) = app
        .put(
            "/api/settings/dhl/api_key",
            Some(&admin),
            json!({ "value": "zeer-geheim" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, raw) = app
        .raw(axum::http::Method::GET, "/api/settings", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(raw).unwrap();
    assert!(!text.contains("zeer-geheim"));

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["settings"]["dhl"]["api_key"], "***CONFIGURED***");
    assert!(body["platforms"].as_array().unwrap().iter().any(|p| p["id"] == "dhl"));
}

#[tokio::test]
async fn test_status_follows_complete_credentials() {
    let app = TestApp::new().await;
    let admin = app.staff_token(UserRole::Admin).await;

    let (_, body) = app.get("/api/settings/status", Some(&admin)).await;
    assert_eq!(body["dhl"]["status"], "not_configured");

    for (key, value) in [
        ("api_key", "key"),
        ("api_secret", "secret"),
        ("account_number", "123456"),
    ] {
        let (status, _) = app
            .put(
                &format!("/api/settings/dhl/{key}"),
                Some(&admin),
                json!({ "value": value }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get("/api/settings/status", Some(&admin)).await;
    assert_eq!(body["dhl"]["status"], "active");
    assert_eq!(body["dhl"]["connected"], true);

    let (status, _) = app
        .delete("/api/settings/dhl/api_secret", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/settings/status", Some(&admin)).await;
    assert_eq!(body["dhl"]["connected"], false);
}

#[tokio::test]
async fn test_unknown_platform_and_missing_setting() {
    let app = TestApp::new().await;
    let admin = app.staff_token(UserRole::Admin).await;

    let (status, _) = app
        .put("/api/settings/tiktok/token", Some(&admin), json!({ "value": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete("/api/settings/dhl/api_key", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connection_test_reports_missing_keys() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/settings/test/meta_ads",
            Some(&staff),
            json!({ "credentials": { "access_token": "abc" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ad_account_id"));

    let (status, body) = app
        .post(
            "/api/settings/test/meta_ads",
            Some(&staff),
            json!({ "credentials": { "access_token": "abc", "ad_account_id": "act_1" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
