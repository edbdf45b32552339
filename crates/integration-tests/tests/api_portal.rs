//! Customer portal accounts and self-service routes.

use axum::http::StatusCode;
use serde_json::json;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_unverified_login_requires_verification() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/customer-auth/register",
            None,
            json!({
                "email": "nieuw@example.nl",
                "password": PASSWORD,
                "first_name": "Nieuw",
                "last_name": "Klant",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["customer_id"].is_i64());

    let (status, body) = app
        .post(
            "/api/customer-auth/login",
            None,
            json!({ "email": "nieuw@example.nl", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requires_verification"], true);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let app = TestApp::new().await;

    let (status, unknown) = app
        .post(
            "/api/customer-auth/forgot-password",
            None,
            json!({ "email": "niemand@example.nl" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (customer, _) = app.customer_login().await;
    let (status, known) = app
        .post(
            "/api/customer-auth/forgot-password",
            None,
            json!({ "email": customer.email.as_str() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown["message"], known["message"]);
}

#[tokio::test]
async fn test_invalid_verification_token() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/customer-auth/verify/onzin", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_portal_rejects_staff_tokens() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::Admin).await;

    let (status, _) = app.get("/api/customer-portal/profile", Some(&staff)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, customer) = app.customer_login().await;
    let (status, _) = app.get("/api/customers", Some(&customer)).await;
    assert!(
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN,
        "customer token reached a staff route: {status}"
    );
}

#[tokio::test]
async fn test_profile_update() {
    let app = TestApp::new().await;
    let (_, token) = app.customer_login().await;

    let (status, body) = app
        .put(
            "/api/customer-portal/profile",
            Some(&token),
            json!({ "city": "Utrecht", "phone": "0301234567" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["customer"]["city"], "Utrecht");

    let (status, _) = app
        .put(
            "/api/customer-portal/profile",
            Some(&token),
            json!({ "first_name": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/customer-portal/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer"]["first_name"], "Piet");
    assert_eq!(body["customer"]["phone"], "0301234567");
}

#[tokio::test]
async fn test_customer_only_sees_own_orders() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;
    let (me, token) = app.customer_login().await;
    let (other, _) = app.customer_login().await;

    let mut order_ids = Vec::new();
    for (customer_id, number) in [(me.id.as_i64(), "P-1"), (other.id.as_i64(), "P-2")] {
        let (status, body) = app
            .post(
                "/api/orders",
                Some(&staff),
                json!({
                    "customer_id": customer_id,
                    "order_number": number,
                    "total_amount": 12.5,
                    "items": [{ "product_name": "Thee", "quantity": 1, "unit_price": 12.5 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        order_ids.push(body["order_id"].as_i64().unwrap());
    }

    let (status, body) = app.get("/api/customer-portal/orders", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_number"], "P-1");
    assert_eq!(body["pagination"]["limit"], 10);

    let (status, body) = app
        .get(&format!("/api/customer-portal/orders/{}", order_ids[0]), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .get(&format!("/api/customer-portal/orders/{}", order_ids[1]), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/customer-portal/analytics", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favourite_products"][0]["product_name"], "Thee");
}

#[tokio::test]
async fn test_register_claims_existing_customer() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, body) = app
        .post(
            "/api/customers",
            Some(&staff),
            json!({ "email": "winkel@example.nl", "first_name": "Eva", "last_name": "Mulder" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let crm_id = body["customer"]["id"].as_i64().unwrap();

    let registration = json!({
        "email": "Winkel@Example.nl",
        "password": PASSWORD,
        "first_name": "Eva",
        "last_name": "Mulder",
    });
    let (status, body) = app
        .post("/api/customer-auth/register", None, registration.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["customer_id"], crm_id);

    // The claimed account now has a password, but is not verified yet
    let (status, body) = app
        .post(
            "/api/customer-auth/login",
            None,
            json!({ "email": "winkel@example.nl", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requires_verification"], true);

    let (status, body) = app
        .post("/api/customer-auth/register", None, registration)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, body) = app.get("/api/customers?search=winkel", Some(&staff)).await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_reset_password_with_token() {
    let app = TestApp::new().await;
    let (customer, _) = app.customer_login().await;
    let token = app.state.keys().reset_token(&customer).unwrap();
    let uri = format!("/api/customer-auth/reset-password/{token}");

    let (status, body) = app.post(&uri, None, json!({ "password": "kort" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post(&uri, None, json!({ "password": "nieuwgeheim" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let login = |password: &'static str| {
        json!({ "email": customer.email.as_str(), "password": password })
    };
    let (status, _) = app
        .post("/api/customer-auth/login", None, login(PASSWORD))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .post("/api/customer-auth/login", None, login("nieuwgeheim"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .post(
            "/api/customer-auth/reset-password/onzin",
            None,
            json!({ "password": "nieuwgeheim" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A verification token is not a reset token
    let verify = app.state.keys().verification_token(&customer).unwrap();
    let (status, _) = app
        .post(
            &format!("/api/customer-auth/reset-password/{verify}"),
            None,
            json!({ "password": "nieuwgeheim" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
