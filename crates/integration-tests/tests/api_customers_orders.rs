//! CRM customers, interactions and orders.

use axum::http::StatusCode;
use serde_json::{Value, json};

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

async fn create_customer(app: &TestApp, token: &str, email: &str) -> i64 {
    let (status, body) = app
        .post(
            "/api/customers",
            Some(token),
            json!({
                "email": email,
                "first_name": "Anna",
                "last_name": "Bakker",
                "address": "Lange Voorhout 3",
                "postal_code": "2514 EA",
                "city": "Den Haag",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["customer"]["id"].as_i64().unwrap()
}

fn order_body(customer_id: i64, number: &str) -> Value {
    json!({
        "customer_id": customer_id,
        "order_number": number,
        "total_amount": 31.9,
        "items": [
            { "product_name": "Fietsbel", "product_sku": "BEL-01", "quantity": 2, "unit_price": 6.95 },
            { "product_name": "LED set", "product_sku": "LMP-LED", "quantity": 1, "unit_price": 18.0 },
        ],
    })
}

#[tokio::test]
async fn test_customer_crud() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let manager = app.staff_token(UserRole::Manager).await;

    let id = create_customer(&app, &staff, "Anna@Example.nl").await;

    let (status, body) = app.get(&format!("/api/customers/{id}"), Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "anna@example.nl");
    assert_eq!(body["country"], "NL");
    assert_eq!(body["orders"], json!([]));

    let (status, body) = app
        .put(
            &format!("/api/customers/{id}"),
            Some(&staff),
            json!({ "customer_status": "vip", "city": "Leiden" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer"]["customer_status"], "vip");
    assert_eq!(body["customer"]["city"], "Leiden");

    let (status, body) = app
        .put(&format!("/api/customers/{id}"), Some(&staff), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No valid fields to update");

    let (status, _) = app.delete(&format!("/api/customers/{id}"), Some(&staff)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .delete(&format!("/api/customers/{id}"), Some(&manager))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/api/customers/{id}"), Some(&staff)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Customer not found");
}

#[tokio::test]
async fn test_duplicate_customer_email_rejected() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    create_customer(&app, &staff, "dubbel@example.nl").await;

    let (status, _) = app
        .post(
            "/api/customers",
            Some(&staff),
            json!({ "email": "dubbel@example.nl", "first_name": "A", "last_name": "B" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customer_validation_errors() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/customers",
            Some(&staff),
            json!({ "email": "geen-email", "first_name": "A", "last_name": "B" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "email");

    let (status, _) = app
        .post("/api/customers", Some(&staff), json!({ "email": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customer_search_and_pagination() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    for n in 0..3 {
        create_customer(&app, &staff, &format!("zoek{n}@example.nl")).await;
    }

    let (status, body) = app
        .get("/api/customers?search=zoek&limit=2&page=1", Some(&staff))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customers"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["pages"], 2);
}

#[tokio::test]
async fn test_interactions_logged() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let id = create_customer(&app, &staff, "contact@example.nl").await;

    let (status, body) = app
        .post(
            &format!("/api/customers/{id}/interactions"),
            Some(&staff),
            json!({ "interaction_type": "phone", "subject": "Vraag over levering" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["interaction"]["created_by"], "System");

    let (_, body) = app.get(&format!("/api/customers/{id}"), Some(&staff)).await;
    assert_eq!(body["interactions"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/api/customers/9999/interactions",
            Some(&staff),
            json!({ "interaction_type": "note", "subject": "Niemand" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_updates_customer_totals() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let customer_id = create_customer(&app, &staff, "koper@example.nl").await;

    let (status, body) = app
        .post("/api/orders", Some(&staff), order_body(customer_id, "WS-1001"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["order_id"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/api/orders/{order_id}"), Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], "WS-1001");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .get(&format!("/api/customers/{customer_id}"), Some(&staff))
        .await;
    assert_eq!(body["total_orders"], 1);
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post("/api/orders", Some(&staff), order_body(customer_id, "WS-1001"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_validation_and_unknown_customer() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/orders",
            Some(&staff),
            json!({ "customer_id": 1, "order_number": "WS-1", "total_amount": 10, "items": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "items");

    let (status, _) = app
        .post("/api/orders", Some(&staff), order_body(4242, "WS-2"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_status_update() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let customer_id = create_customer(&app, &staff, "status@example.nl").await;
    let (_, body) = app
        .post("/api/orders", Some(&staff), order_body(customer_id, "WS-2001"))
        .await;
    let order_id = body["order_id"].as_i64().unwrap();

    let (status, _) = app
        .request(
            axum::http::Method::PATCH,
            &format!("/api/orders/{order_id}/status"),
            Some(&staff),
            Some(json!({ "status": "shipped", "tracking_number": "3SABC123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/orders/{order_id}"), Some(&staff)).await;
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["tracking_number"], "3SABC123");

    let (status, _) = app
        .request(
            axum::http::Method::PATCH,
            &format!("/api/orders/{order_id}/status"),
            Some(&staff),
            Some(json!({ "status": "lost" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_huge_page_number_is_not_an_error() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    create_customer(&app, &staff, "pagina@example.nl").await;

    let (status, body) = app
        .get(&format!("/api/customers?page={}&limit=20", i64::MAX), Some(&staff))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["customers"], json!([]));
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["pages"], 1);
}

#[tokio::test]
async fn test_order_line_overflow_is_rejected() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let customer_id = create_customer(&app, &staff, "overloop@example.nl").await;

    let (status, body) = app
        .post(
            "/api/orders",
            Some(&staff),
            json!({
                "customer_id": customer_id,
                "order_number": "WS-MAX",
                "total_amount": 10,
                "items": [
                    { "product_name": "Fietsbel", "quantity": i64::MAX, "unit_price": 999_999 },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "items.quantity");
    assert_eq!(body["errors"][0]["message"], "quantity must be between 1 and 100000");
}
