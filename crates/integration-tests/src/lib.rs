//! Integration test harness for Webshop CRM.
//!
//! Every test gets its own in-memory database with the migrations applied
//! and drives the full router in-process, middleware included.
//!
//! ```rust,ignore
//! let app = TestApp::new().await;
//! let token = app.staff_token(UserRole::Manager).await;
//! let (status, body) = app.get("/api/customers", Some(&token)).await;
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::response::Response;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use webshop_crm_core::UserRole;
use webshop_crm_server::config::AppConfig;
use webshop_crm_server::db;
use webshop_crm_server::models::Customer;
use webshop_crm_server::services::{
    CustomerAuthService, StaffAuthService,
    auth::{CustomerRegistration, StaffRegistration},
};
use webshop_crm_server::state::AppState;

/// Password used for every account the harness creates.
pub const PASSWORD: &str = "geheim123";

const BODY_LIMIT: usize = 4 * 1024 * 1024;

static ACCOUNTS: AtomicUsize = AtomicUsize::new(0);

fn unique_email(prefix: &str) -> String {
    let n = ACCOUNTS.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{n}@example.nl")
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_tests()).await
    }

    /// Build the app with a custom configuration.
    pub async fn with_config(config: AppConfig) -> Self {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let state = AppState::new(config, pool).unwrap();
        let router = webshop_crm_server::app(state.clone());
        Self { state, router }
    }

    /// Send a request and return the status with the body parsed as JSON
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.raw(method, uri, token, body).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Send a request and return the raw response body.
    pub async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let response = self.response(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        (status, bytes.to_vec())
    }

    /// Send a request and return the full response, headers included.
    pub async fn response(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Create a staff account with `role` and return its session token.
    pub async fn staff_token(&self, role: UserRole) -> String {
        let email = unique_email(role.as_str());
        let (_, token) = StaffAuthService::new(self.state.pool(), self.state.keys())
            .register(&StaffRegistration {
                email: &email,
                password: PASSWORD,
                first_name: "Test",
                last_name: "Medewerker",
                role,
            })
            .await
            .unwrap();
        token
    }

    /// Register and verify a portal customer, then log in through the API.
    pub async fn customer_login(&self) -> (Customer, String) {
        let email = unique_email("klant");
        let auth = CustomerAuthService::new(self.state.pool(), self.state.keys());
        let (customer, verify_token) = auth
            .register(CustomerRegistration {
                email: &email,
                password: PASSWORD,
                first_name: "Piet",
                last_name: "de Vries",
                phone: None,
                webshop_id: None,
            })
            .await
            .unwrap();
        auth.verify_email(&verify_token).await.unwrap();

        let (status, body) = self
            .post(
                "/api/customer-auth/login",
                None,
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "customer login failed: {body}");
        let token = body["token"].as_str().unwrap().to_string();
        (customer, token)
    }
}
