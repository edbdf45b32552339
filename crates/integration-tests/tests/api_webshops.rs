//! Webshop tenants, their subscription and members.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

#[tokio::test]
async fn test_webshop_crud_with_role_gates() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let manager = app.staff_token(UserRole::Manager).await;
    let admin = app.staff_token(UserRole::Admin).await;

    let body = json!({ "name": "Fietsenwinkel", "domain": "fietsen.nl" });
    let (status, _) = app.post("/api/webshops", Some(&staff), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/webshops", Some(&manager), body).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["webshop"]["subscription_plan"], "starter");
    assert_eq!(created["webshop"]["settings"]["currency"], "EUR");
    let id = created["webshop"]["id"].as_i64().unwrap();
    let uri = format!("/api/webshops/{id}");

    let (status, shop) = app.get(&uri, Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shop["name"], "Fietsenwinkel");
    assert_eq!(shop["subscription"]["plan"], "starter");
    assert_eq!(shop["subscription"]["status"], "active");
    assert_eq!(shop["members"].as_array().unwrap().len(), 1);
    assert_eq!(shop["members"][0]["role"], "owner");

    let update = json!({ "subscription_plan": "professional" });
    let (status, _) = app.put(&uri, Some(&manager), update.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, updated) = app.put(&uri, Some(&admin), update).await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["webshop"]["subscription_plan"], "professional");

    let (_, shop) = app.get(&uri, Some(&staff)).await;
    assert_eq!(shop["subscription"]["plan"], "professional");
    assert_eq!(shop["subscription"]["price_monthly"].as_f64(), Some(79.0));

    let (status, body) = app.put(&uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No valid fields to update");

    let (status, _) = app.delete(&uri, Some(&manager)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.get("/api/webshops", Some(&staff)).await;
    assert!(list["webshops"].as_array().unwrap().iter().all(|w| w["id"] != id));

    let (status, body) = app.delete("/api/webshops/9999", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Webshop not found");
}

#[tokio::test]
async fn test_webshop_settings_must_be_an_object() {
    let app = TestApp::new().await;
    let manager = app.staff_token(UserRole::Manager).await;

    let (status, body) = app
        .post(
            "/api/webshops",
            Some(&manager),
            json!({ "name": "Boekhandel", "settings": ["nl"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "settings");
}
