//! Order routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{CustomerId, OrderId, OrderStatus, WebshopId, money};

use crate::{
    db::OrderRepository,
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::RequireStaff,
    models::{
        NewOrder, NewOrderItem, OrderFilter, OrderItem, OrderSummary, OrderTotals, PageRequest,
        StatusBreakdown, line_total,
    },
    services::pricing::MAX_LINE_QUANTITY,
    state::AppState,
};

use super::{JsonBody, MessageResponse, Paginated, PeriodQuery};

const DEFAULT_CURRENCY: &str = "EUR";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(update_status))
        .route("/stats/summary", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub webshop_id: Option<WebshopId>,
    pub order_number: String,
    pub total_amount: Decimal,
    pub items: Vec<CreateOrderItem>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub order_date: Option<NaiveDateTime>,
}

impl CreateOrderRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.check(
            self.customer_id.as_i64() >= 1,
            "customer_id",
            "customer_id must be a positive integer",
        )
        .required(&self.order_number, "order_number")
        .check(
            money::is_amount(self.total_amount),
            "total_amount",
            "total_amount must be between 0 and 1000000000",
        )
        .check(!self.items.is_empty(), "items", "at least one item is required");

        for item in &self.items {
            v.required(&item.product_name, "items.product_name")
                .check(
                    (1..=MAX_LINE_QUANTITY).contains(&item.quantity),
                    "items.quantity",
                    "quantity must be between 1 and 100000",
                )
                .check(
                    money::is_amount(item.unit_price),
                    "items.unit_price",
                    "unit_price must be between 0 and 1000000000",
                )
                .check(
                    line_total(item.quantity, item.unit_price).is_some(),
                    "items.unit_price",
                    "quantity * unit_price is out of range",
                );
        }
        v.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub message: &'static str,
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderStats {
    pub overall: OrderTotals,
    pub by_status: Vec<StatusBreakdown>,
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<OrderList>>, AppError> {
    let page = PageRequest::new(query.page, query.limit, 20);
    let filter = OrderFilter {
        status: query.status,
        customer_id: query.customer_id,
    };

    let (orders, total) = OrderRepository::new(state.pool()).list(&filter, page).await?;

    Ok(Json(Paginated {
        items: OrderList { orders },
        pagination: page.paginate(total),
    }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let orders = OrderRepository::new(state.pool());
    let order = orders.get(id).await.or_not_found("Order")?;
    let items = orders.items(id).await?;

    Ok(Json(OrderDetail { order, items }))
}

#[instrument(skip(_staff, state, body), fields(order_number = %body.order_number))]
async fn create(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    body.validate()?;

    let order = NewOrder {
        customer_id: body.customer_id,
        webshop_id: body.webshop_id,
        order_number: body.order_number.trim().to_string(),
        order_date: body.order_date.unwrap_or_else(|| Utc::now().naive_utc()),
        total_amount: body.total_amount,
        currency: body
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        payment_method: body.payment_method,
        shipping_address: body.shipping_address,
        notes: body.notes,
        items: body
            .items
            .into_iter()
            .map(|item| {
                let total_price = line_total(item.quantity, item.unit_price).ok_or_else(|| {
                    AppError::BadRequest("quantity * unit_price is out of range".to_string())
                })?;
                Ok(NewOrderItem {
                    product_name: item.product_name,
                    product_sku: item.product_sku,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price,
                })
            })
            .collect::<Result<_, AppError>>()?,
    };

    let order_id = OrderRepository::new(state.pool())
        .create(&order)
        .await
        .missing_as("Customer")?;

    info!(order_id = %order_id, customer_id = %order.customer_id, "Order created");
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created successfully",
            order_id,
        }),
    ))
}

#[instrument(skip(_staff, state))]
async fn update_status(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    OrderRepository::new(state.pool())
        .update_status(id, body.status, body.tracking_number.as_deref())
        .await
        .missing_as("Order")?;

    info!(order_id = %id, status = %body.status, "Order status updated");
    Ok(Json(MessageResponse::new("Order status updated successfully")))
}

#[instrument(skip(_staff, state))]
async fn stats(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<OrderStats>, AppError> {
    let (overall, by_status) = OrderRepository::new(state.pool())
        .stats(period.days())
        .await?;

    Ok(Json(OrderStats { overall, by_status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(items: Vec<CreateOrderItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: CustomerId::new(1),
            webshop_id: None,
            order_number: "ORD-1001".to_string(),
            total_amount: dec!(59.90),
            items,
            currency: None,
            payment_method: None,
            shipping_address: None,
            notes: None,
            order_date: None,
        }
    }

    #[test]
    fn test_order_needs_items() {
        let Err(AppError::Validation(errors)) = request(vec![]).validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].field, "items");
    }

    #[test]
    fn test_item_quantity_checked() {
        let item = CreateOrderItem {
            product_name: "Mok".to_string(),
            product_sku: Some("MOK-1".to_string()),
            quantity: 0,
            unit_price: dec!(9.95),
        };
        let Err(AppError::Validation(errors)) = request(vec![item]).validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].field, "items.quantity");
    }

    #[test]
    fn test_line_total_overflow_rejected() {
        assert_eq!(line_total(i64::MAX, Decimal::MAX), None);
        assert_eq!(line_total(3, dec!(2.50)), Some(dec!(7.50)));

        let item = CreateOrderItem {
            product_name: "Mok".to_string(),
            product_sku: None,
            quantity: i64::MAX,
            unit_price: dec!(99999999999.0),
        };
        let Err(AppError::Validation(errors)) = request(vec![item]).validate() else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["items.quantity", "items.unit_price", "items.unit_price"]);
    }

    #[test]
    fn test_valid_order() {
        let item = CreateOrderItem {
            product_name: "Mok".to_string(),
            product_sku: None,
            quantity: 2,
            unit_price: dec!(29.95),
        };
        assert!(request(vec![item]).validate().is_ok());
    }
}
