//! Fixed costs and profit analysis.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

#[tokio::test]
async fn test_fixed_cost_lifecycle() {
    let app = TestApp::new().await;
    let user = app.staff_token(UserRole::User).await;
    let manager = app.staff_token(UserRole::Manager).await;

    let cost = json!({
        "name": "Boekhouder",
        "category": "Administratie",
        "amount": 300,
        "billing_cycle": "quarterly",
        "start_date": "2024-01-01",
    });
    let (status, _) = app.post("/api/costs/fixed-costs", Some(&user), cost.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/costs/fixed-costs", Some(&manager), cost).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["cost"]["id"].as_i64().unwrap();

    let (status, body) = app.get("/api/costs/fixed-costs/summary", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["total_items"], 1);
    assert_eq!(body["totals"]["monthly"], 100.0);
    assert_eq!(body["totals"]["yearly"], 1200.0);

    let (_, body) = app.get("/api/costs/categories", Some(&user)).await;
    assert!(
        body["categories"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "Administratie")
    );

    let (status, _) = app
        .put(
            &format!("/api/costs/fixed-costs/{id}"),
            Some(&manager),
            json!({ "end_date": "2023-06-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/api/costs/fixed-costs/{id}"), Some(&manager))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/costs/fixed-costs/summary", Some(&user)).await;
    assert_eq!(body["totals"]["total_items"], 0);
}

#[tokio::test]
async fn test_period_costs_require_start_date() {
    let app = TestApp::new().await;
    let user = app.staff_token(UserRole::User).await;

    let (status, _) = app.get("/api/costs/period-costs", Some(&user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(
            "/api/costs/period-costs?start_date=2024-02-01&end_date=2024-01-01",
            Some(&user),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profit_analysis_on_empty_database() {
    let app = TestApp::new().await;
    let manager = app.staff_token(UserRole::Manager).await;

    let (status, body) = app.get("/api/profit/analysis", Some(&manager)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .get("/api/profit/comparison?current_start=2024-01-01", Some(&manager))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/profit/snapshot",
            Some(&manager),
            json!({ "period_start": "2024-01-01", "period_end": "2024-01-31" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["snapshot_id"].is_i64());

    let (_, body) = app.get("/api/profit/snapshots", Some(&manager)).await;
    assert_eq!(body["snapshots"].as_array().unwrap().len(), 1);
}
