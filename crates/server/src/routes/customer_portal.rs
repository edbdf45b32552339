//! Routes for signed-in portal customers. Every handler only sees the
//! customer's own data.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{OrderId, OrderStatus};

use crate::{
    db::{CustomerRepository, OrderRepository, TrackingRepository},
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::RequireCustomer,
    models::{
        Customer, CustomerOrderStats, CustomerUpdate, FavouriteProduct, MonthlySpend, Order,
        OrderItem, PageRequest, PortalOrder, ShipmentRecord,
    },
    state::AppState,
};

use super::{JsonBody, Paginated};

const FAVOURITE_PRODUCTS: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/orders", get(orders))
        .route("/orders/{id}", get(order))
        .route("/analytics", get(analytics))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<(), AppError> {
        let non_empty = |v: &Option<String>| v.as_deref().is_none_or(|s| !s.trim().is_empty());
        Validator::new()
            .check(non_empty(&self.first_name), "first_name", "first_name cannot be empty")
            .check(non_empty(&self.last_name), "last_name", "last_name cannot be empty")
            .finish()
    }
}

impl From<UpdateProfileRequest> for CustomerUpdate {
    fn from(body: UpdateProfileRequest) -> Self {
        Self {
            first_name: body.first_name.map(|s| s.trim().to_string()),
            last_name: body.last_name.map(|s| s.trim().to_string()),
            phone: body.phone,
            address: body.address,
            postal_code: body.postal_code,
            city: body.city,
            country: body.country,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdated {
    pub message: &'static str,
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct PortalOrders {
    pub orders: Vec<PortalOrder>,
}

#[derive(Debug, Serialize)]
pub struct PortalOrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub tracking: Vec<ShipmentRecord>,
}

#[derive(Debug, Serialize)]
pub struct PortalAnalytics {
    #[serde(flatten)]
    pub stats: CustomerOrderStats,
    pub customer_since_days: i64,
    pub monthly_history: Vec<MonthlySpend>,
    pub favourite_products: Vec<FavouriteProduct>,
}

#[instrument(skip_all, fields(customer_id = %customer.id))]
async fn profile(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let customer = CustomerRepository::new(state.pool())
        .get(customer.id)
        .await
        .or_not_found("Customer")?;
    Ok(Json(ProfileResponse { customer }))
}

#[instrument(skip_all, fields(customer_id = %customer.id))]
async fn update_profile(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdated>, AppError> {
    body.validate()?;
    let update = CustomerUpdate::from(body);
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let updated = CustomerRepository::new(state.pool())
        .update(customer.id, update)
        .await
        .missing_as("Customer")?;

    info!("Customer updated their profile");
    Ok(Json(ProfileUpdated {
        message: "Profile updated successfully",
        customer: updated,
    }))
}

#[instrument(skip_all, fields(customer_id = %customer.id))]
async fn orders(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Paginated<PortalOrders>>, AppError> {
    let page = PageRequest::new(query.page, query.limit, 10);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_portal(customer.id, query.status, page)
        .await?;

    Ok(Json(Paginated {
        items: PortalOrders { orders },
        pagination: page.paginate(total),
    }))
}

#[instrument(skip_all, fields(customer_id = %customer.id, order_id = %id))]
async fn order(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<PortalOrderDetail>, AppError> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_for_customer(id, customer.id)
        .await
        .or_not_found("Order")?;
    let items = orders.items(id).await?;
    let tracking = TrackingRepository::new(state.pool())
        .list_for_order(id)
        .await?;

    Ok(Json(PortalOrderDetail {
        order,
        items,
        tracking,
    }))
}

#[instrument(skip_all, fields(customer_id = %customer.id))]
async fn analytics(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> Result<Json<PortalAnalytics>, AppError> {
    let profile = CustomerRepository::new(state.pool())
        .get(customer.id)
        .await
        .or_not_found("Customer")?;
    let orders = OrderRepository::new(state.pool());

    Ok(Json(PortalAnalytics {
        stats: orders.customer_stats(customer.id).await?,
        customer_since_days: (Utc::now() - profile.date_created).num_days().max(0),
        monthly_history: orders.customer_monthly_history(customer.id).await?,
        favourite_products: orders
            .customer_favourite_products(customer.id, FAVOURITE_PRODUCTS)
            .await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpdateProfileRequest {
        UpdateProfileRequest {
            first_name: None,
            last_name: None,
            phone: None,
            address: None,
            postal_code: None,
            city: None,
            country: None,
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let body = UpdateProfileRequest {
            first_name: Some("  ".to_string()),
            ..request()
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_only_given_fields_update() {
        let update = CustomerUpdate::from(UpdateProfileRequest {
            city: Some("Utrecht".to_string()),
            ..request()
        });
        assert_eq!(update.city.as_deref(), Some("Utrecht"));
        assert!(update.first_name.is_none());
        assert!(update.email.is_none());
        assert!(CustomerUpdate::from(request()).is_empty());
    }
}
