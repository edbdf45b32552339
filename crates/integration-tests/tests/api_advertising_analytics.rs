//! Campaign metrics and the reporting queries built on orders.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;

fn metrics(date: &str, impressions: i64, clicks: i64, spent: f64, revenue: f64) -> Value {
    json!({
        "date": date,
        "impressions": impressions,
        "clicks": clicks,
        "spent": spent,
        "conversions": 2,
        "revenue": revenue,
    })
}

#[tokio::test]
async fn test_metrics_upsert_recomputes_campaign_totals() {
    let app = TestApp::new().await;
    let manager = app.staff_token(UserRole::Manager).await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/advertising/campaigns",
            Some(&manager),
            json!({ "name": "Najaarsactie", "platform": "google", "budget": 500 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["campaign_id"].as_i64().unwrap();
    let uri = format!("/api/advertising/campaigns/{id}/metrics");

    let (status, _) = app
        .post(&uri, Some(&staff), metrics("2026-09-01", 1000, 50, 25.0, 80.0))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for body in [
        metrics("2026-09-01", 1000, 50, 25.0, 80.0),
        metrics("2026-09-02", 400, 10, 5.0, 0.0),
        // Second report for the same day replaces the first
        metrics("2026-09-01", 2000, 100, 40.0, 120.0),
    ] {
        let (status, response) = app.post(&uri, Some(&manager), body).await;
        assert_eq!(status, StatusCode::OK, "{response}");
    }

    let (status, body) = app
        .get(&format!("/api/advertising/campaigns/{id}"), Some(&staff))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"].as_array().unwrap().len(), 2);
    assert_eq!(body["impressions"], 2400);
    assert_eq!(body["clicks"], 110);
    assert_eq!(body["conversions"], 4);
    assert_eq!(body["spent"].as_f64(), Some(45.0));
    assert_eq!(body["revenue"].as_f64(), Some(120.0));

    let (status, body) = app
        .post(
            "/api/advertising/campaigns/9999/metrics",
            Some(&manager),
            metrics("2026-09-01", 1, 1, 1.0, 1.0),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Campaign not found");

    let (status, body) = app
        .post(&uri, Some(&manager), metrics("2026-09-03", -1, 0, 1.0, 1.0))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "impressions");
}

async fn customer(app: &TestApp, token: &str, email: &str) -> i64 {
    let (status, body) = app
        .post(
            "/api/customers",
            Some(token),
            json!({ "email": email, "first_name": "Sanne", "last_name": "Visser" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["customer"]["id"].as_i64().unwrap()
}

async fn order(
    app: &TestApp,
    token: &str,
    customer_id: i64,
    number: &str,
    amount: f64,
    days_ago: i64,
) {
    let order_date = (Utc::now() - Duration::days(days_ago)).naive_utc();
    let (status, body) = app
        .post(
            "/api/orders",
            Some(token),
            json!({
                "customer_id": customer_id,
                "order_number": number,
                "total_amount": amount,
                "order_date": order_date,
                "items": [{ "product_name": "Regenjas", "quantity": 1, "unit_price": amount }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

fn segment<'a>(segments: &'a Value, name: &str) -> &'a Value {
    segments
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["segment"] == name)
        .unwrap_or_else(|| panic!("segment {name} missing in {segments}"))
}

#[tokio::test]
async fn test_sales_lifetime_value_and_retention() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let loyal = customer(&app, &staff, "trouw@example.nl").await;
    let once = customer(&app, &staff, "eenmalig@example.nl").await;
    customer(&app, &staff, "nooit@example.nl").await;

    order(&app, &staff, loyal, "WS-100", 100.0, 2).await;
    order(&app, &staff, loyal, "WS-101", 50.0, 2).await;
    order(&app, &staff, once, "WS-102", 30.0, 5).await;
    // Outside a 30 day window
    order(&app, &staff, once, "WS-OLD", 10.0, 90).await;

    let (status, body) = app
        .get("/api/analytics/sales-over-time?period=30&interval=day", Some(&staff))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["interval"], "day");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    let two_days_ago = (Utc::now() - Duration::days(2)).format("%Y-%m-%d").to_string();
    let bucket = data.iter().find(|p| p["period"] == two_days_ago.as_str()).unwrap();
    assert_eq!(bucket["orders"], 2);
    assert_eq!(bucket["revenue"].as_f64(), Some(150.0));
    assert_eq!(bucket["avg_order_value"].as_f64(), Some(75.0));

    let (_, body) = app
        .get("/api/analytics/sales-over-time?period=365&interval=month", Some(&staff))
        .await;
    let total: i64 = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["orders"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 4);

    let (status, body) = app.get("/api/analytics/customers", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    let segments = &body["lifetime_value_segments"];
    assert_eq!(segment(segments, "No purchases")["customers"], 1);
    assert_eq!(segment(segments, "€0 - €100")["customers"], 1);
    let big = segment(segments, "€100 - €250");
    assert_eq!(big["customers"], 1);
    assert_eq!(big["total_revenue"].as_f64(), Some(150.0));

    let (status, body) = app.get("/api/analytics/retention", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    // Both ordering customers have two orders, the one without orders is left out
    assert_eq!(segment(&body["segments"], "2 orders")["customers"], 2);
    assert_eq!(body["repeat_purchase_rate"]["total_customers"], 2);
    assert_eq!(body["repeat_purchase_rate"]["repeat_customers"], 2);
    assert_eq!(body["repeat_purchase_rate"]["repeat_rate"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn test_analytics_requires_staff() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/analytics/retention", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, customer) = app.customer_login().await;
    let (status, _) = app.get("/api/analytics/dashboard", Some(&customer)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
