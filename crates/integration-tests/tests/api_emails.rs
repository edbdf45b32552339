//! Customer email sending and logs. Without SMTP every message is logged.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

async fn customer(app: &TestApp, token: &str, email: &str) -> i64 {
    let (status, body) = app
        .post(
            "/api/customers",
            Some(token),
            json!({ "email": email, "first_name": "Lotte", "last_name": "Smit" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["customer"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_bulk_email_counts_sent_and_failed() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let manager = app.staff_token(UserRole::Manager).await;

    let first = customer(&app, &staff, "lotte@example.nl").await;
    let second = customer(&app, &staff, "bram@example.nl").await;
    let body = json!({
        "customer_ids": [first, 9999, second],
        "subject": "Winteractie",
        "message": "Tot 20% korting op alle jassen.",
        "template": "marketing",
    });

    let (status, _) = app.post("/api/emails/send-bulk-email", Some(&staff), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, result) = app.post("/api/emails/send-bulk-email", Some(&manager), body).await;
    assert_eq!(status, StatusCode::OK, "{result}");
    assert_eq!(result["sent"], 2);
    assert_eq!(result["failed"], 1);
    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "logged");
    assert_eq!(results[1]["customer_id"], 9999);
    assert_eq!(results[1]["status"], "failed");
    assert_eq!(results[1]["error"], "Customer not found");

    let (status, history) = app
        .get(&format!("/api/emails/customer/{first}/history"), Some(&staff))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["emails"].as_array().unwrap().len(), 1);
    assert_eq!(history["emails"][0]["subject"], "Winteractie");

    let (_, stats) = app.get("/api/emails/stats", Some(&staff)).await;
    assert_eq!(stats["by_status"]["logged"], 2);
}

#[tokio::test]
async fn test_bulk_email_requires_recipients() {
    let app = TestApp::new().await;
    let manager = app.staff_token(UserRole::Manager).await;

    let (status, body) = app
        .post(
            "/api/emails/send-bulk-email",
            Some(&manager),
            json!({ "customer_ids": [], "subject": "Leeg", "message": "Niemand" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "customer_ids");
}
