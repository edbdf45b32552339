//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! /api/auth              - Staff registration, login, profile
//! /api/customers         - CRM customers and interactions
//! /api/orders            - Orders and order statistics
//! /api/products          - Catalogue, sales history, margins
//! /api/shipping          - Shipping and tax rules, calculators
//! /api/costs             - Fixed costs
//! /api/profit            - Profit analysis, break-even, snapshots
//! /api/advertising       - Ad campaigns, metrics, platform sync
//! /api/analytics         - Dashboard and reporting queries
//! /api/ai                - Rule-based recommendations
//! /api/webshops          - Tenants
//! /api/emails            - Customer email and logs
//! /api/settings          - Integration credentials
//! /api/fulfillment       - Labels, packing slips, tracking
//! /api/customer-auth     - Portal registration and login (public)
//! /api/customer-portal   - Portal for signed-in customers
//! /api/live              - Live viewing socket and sessions
//! /api/oauth             - Ad account connection through OAuth
//! ```

pub mod advertising;
pub mod ai;
pub mod analytics;
pub mod auth;
pub mod costs;
pub mod customer_auth;
pub mod customer_portal;
pub mod customers;
pub mod emails;
pub mod fulfillment;
pub mod live;
pub mod oauth;
pub mod orders;
pub mod products;
pub mod profit;
pub mod settings;
pub mod shipping;
pub mod webshops;

use axum::{
    Router,
    extract::{FromRequest, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Pagination;
use crate::state::AppState;

/// Default look-back window for period queries, in days.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Build the `/api` router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/customers", customers::router())
        .nest("/orders", orders::router())
        .nest("/products", products::router())
        .nest("/shipping", shipping::router())
        .nest("/costs", costs::router())
        .nest("/profit", profit::router())
        .nest("/advertising", advertising::router())
        .nest("/analytics", analytics::router())
        .nest("/ai", ai::router())
        .nest("/webshops", webshops::router())
        .nest("/emails", emails::router())
        .nest("/settings", settings::router())
        .nest("/fulfillment", fulfillment::router())
        .nest("/customer-auth", customer_auth::router())
        .nest("/customer-portal", customer_portal::router())
        .nest("/live", live::router())
        .nest("/oauth", oauth::router())
}

/// JSON request body whose rejections render as `AppError` (400 with a
/// JSON body) instead of axum's plain-text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `?period=<days>` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<i64>,
}

impl PeriodQuery {
    /// Window length in days, at least 1.
    #[must_use]
    pub fn days(&self) -> i64 {
        self.period.unwrap_or(DEFAULT_PERIOD_DAYS).max(1)
    }
}

/// A page of list results.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    #[serde(flatten)]
    pub items: T,
    pub pagination: Pagination,
}

/// `{"message": "..."}` response body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    #[must_use]
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_days() {
        assert_eq!(PeriodQuery::default().days(), 30);
        assert_eq!(PeriodQuery { period: Some(7) }.days(), 7);
        assert_eq!(PeriodQuery { period: Some(-3) }.days(), 1);
    }

    #[test]
    fn test_paginated_flattens_items() {
        #[derive(Serialize)]
        struct Customers {
            customers: Vec<u8>,
        }

        let page = crate::models::PageRequest::new(Some(2), Some(10), 20);
        let body = serde_json::to_value(Paginated {
            items: Customers {
                customers: vec![1, 2],
            },
            pagination: page.paginate(25),
        })
        .expect("serializable");

        assert_eq!(body["customers"], serde_json::json!([1, 2]));
        assert_eq!(body["pagination"]["pages"], 3);
    }
}
