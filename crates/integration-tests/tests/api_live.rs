//! Live viewing socket roles.

use axum::http::StatusCode;

use webshop_crm_core::UserRole;
use webshop_crm_integration_tests::TestApp;
use webshop_crm_server::live::{Role, connection_role};

#[tokio::test]
async fn test_socket_role_comes_from_token_param() {
    let app = TestApp::new().await;
    let keys = app.state.keys();
    let staff = app.staff_token(UserRole::User).await;
    let (_, customer) = app.customer_login().await;

    assert_eq!(connection_role(keys, Some(&staff)), Role::Admin);
    assert_eq!(connection_role(keys, Some(&customer)), Role::Customer);
    assert_eq!(connection_role(keys, Some("onzin")), Role::Customer);
    assert_eq!(connection_role(keys, None), Role::Customer);
}

#[tokio::test]
async fn test_socket_route_needs_upgrade() {
    let app = TestApp::new().await;
    let staff = app.staff_token(UserRole::User).await;

    let (status, _) = app
        .raw(
            axum::http::Method::GET,
            &format!("/api/live/ws?token={staff}"),
            None,
            None,
        )
        .await;
    assert_ne!(status, StatusCode::NOT_FOUND);
    assert!(status.is_client_error());
}
