//! Labels and packing slips against the simulated carrier.

use axum::http::{Method, StatusCode};
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

async fn order(app: &TestApp, token: &str) -> i64 {
    let (_, body) = app
        .post(
            "/api/customers",
            Some(token),
            json!({
                "email": "ontvanger@example.nl",
                "first_name": "Sanne",
                "last_name": "Visser",
                "address": "Kerkstraat 5",
                "postal_code": "1017 GB",
                "city": "Amsterdam",
            }),
        )
        .await;
    let customer_id = body["customer"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/orders",
            Some(token),
            json!({
                "customer_id": customer_id,
                "order_number": "WS-5001",
                "total_amount": 20.0,
                "shipping_address": "Kerkstraat 5, 1017 GB Amsterdam",
                "items": [{ "product_name": "Fietsbel", "product_sku": "BEL-01", "quantity": 2, "unit_price": 10.0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["order_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_label_marks_order_shipped() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let order_id = order(&app, &staff).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/fulfillment/orders/{order_id}/create-label"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let tracking = body["tracking_number"].as_str().unwrap().to_string();
    assert!(tracking.starts_with("DHL"));

    let (_, body) = app.get(&format!("/api/orders/{order_id}"), Some(&staff)).await;
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["tracking_number"], tracking.as_str());

    let (status, body) = app
        .get(
            &format!("/api/fulfillment/orders/{order_id}/shipping-info"),
            Some(&staff),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shipments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_label_for_unknown_order() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, _) = app
        .post(
            "/api/fulfillment/create-dhl-label",
            Some(&staff),
            json!({ "weight": 500 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/fulfillment/create-dhl-label",
            Some(&staff),
            json!({ "order_id": 777 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_packing_slip() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let order_id = order(&app, &staff).await;

    let (status, body) = app
        .get(
            &format!("/api/fulfillment/orders/{order_id}/packing-slip"),
            Some(&staff),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], "WS-5001");
    assert_eq!(body["items"][0]["quantity"], 2);

    let (status, html) = app
        .raw(
            Method::GET,
            &format!("/api/fulfillment/orders/{order_id}/packing-slip.html"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(html).unwrap();
    assert!(html.contains("WS-5001"));
    assert!(html.contains("Fietsbel"));
}
