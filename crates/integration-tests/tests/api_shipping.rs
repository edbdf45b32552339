//! Shipping and tax calculators.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

#[tokio::test]
async fn test_calculate_rejects_out_of_range_quantity() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/shipping/calculate",
            Some(&staff),
            json!({
                "country": "NL",
                "items": [{ "sku": "BOX1", "quantity": i64::MAX }],
                "total_value": 10,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "items.quantity");

    let (status, body) = app
        .post(
            "/api/shipping/calculate",
            Some(&staff),
            json!({
                "country": "NL",
                "items": [{ "sku": "BOX1", "quantity": 3 }],
                "total_value": 10,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_calculators_reject_huge_amounts() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/shipping/calculate",
            Some(&staff),
            json!({
                "country": "NL",
                "items": [{ "sku": "BOX1", "quantity": 1 }],
                "total_value": 1e20,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "total_value");

    let (status, body) = app
        .post(
            "/api/shipping/calculate-tax",
            Some(&staff),
            json!({ "country": "NL", "items": [], "subtotal": 1e20 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "subtotal");
}
