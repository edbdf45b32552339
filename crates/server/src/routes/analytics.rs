//! Dashboard and reporting routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    db::{AnalyticsRepository, OrderRepository},
    error::AppError,
    middleware::RequireStaff,
    models::{
        CityStat, CustomerSegment, DashboardCounts, MonthlyAcquisition, OrderSummary,
        ProductSales, RepeatRate, SalesInterval, SalesPoint, StatusBreakdown, StatusCount,
        TopCustomer,
    },
    state::AppState,
};

use super::PeriodQuery;

const DASHBOARD_LIST_LIMIT: i64 = 10;
const TOP_CITIES: i64 = 15;
const TOP_PRODUCTS: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/sales-over-time", get(sales_over_time))
        .route("/customers", get(customers))
        .route("/products", get(products))
        .route("/retention", get(retention))
}

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    pub period: Option<i64>,
    #[serde(default)]
    pub interval: SalesInterval,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub overview: DashboardCounts,
    pub top_customers: Vec<TopCustomer>,
    pub recent_orders: Vec<OrderSummary>,
    pub status_distribution: Vec<StatusBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct SalesOverTime {
    pub period_days: i64,
    pub interval: SalesInterval,
    pub data: Vec<SalesPoint>,
}

#[derive(Debug, Serialize)]
pub struct CustomerAnalytics {
    pub by_status: Vec<StatusCount>,
    pub acquisition: Vec<MonthlyAcquisition>,
    pub lifetime_value_segments: Vec<CustomerSegment>,
    pub top_cities: Vec<CityStat>,
}

#[derive(Debug, Serialize)]
pub struct ProductAnalytics {
    pub period_days: i64,
    pub top_products: Vec<ProductSales>,
}

#[derive(Debug, Serialize)]
pub struct Retention {
    pub segments: Vec<CustomerSegment>,
    pub repeat_purchase_rate: RepeatRate,
}

#[instrument(skip(_staff, state))]
async fn dashboard(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>, AppError> {
    let analytics = AnalyticsRepository::new(state.pool());

    Ok(Json(Dashboard {
        overview: analytics.dashboard_counts().await?,
        top_customers: analytics.top_customers(DASHBOARD_LIST_LIMIT).await?,
        recent_orders: OrderRepository::new(state.pool())
            .recent(DASHBOARD_LIST_LIMIT)
            .await?,
        status_distribution: analytics.status_distribution().await?,
    }))
}

#[instrument(skip(_staff, state))]
async fn sales_over_time(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<SalesQuery>,
) -> Result<Json<SalesOverTime>, AppError> {
    let days = PeriodQuery {
        period: query.period,
    }
    .days();
    let data = AnalyticsRepository::new(state.pool())
        .sales_over_time(days, query.interval)
        .await?;

    Ok(Json(SalesOverTime {
        period_days: days,
        interval: query.interval,
        data,
    }))
}

#[instrument(skip(_staff, state))]
async fn customers(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<CustomerAnalytics>, AppError> {
    let analytics = AnalyticsRepository::new(state.pool());

    Ok(Json(CustomerAnalytics {
        by_status: analytics.customers_by_status().await?,
        acquisition: analytics.customer_acquisition().await?,
        lifetime_value_segments: analytics.lifetime_value_segments().await?,
        top_cities: analytics.top_cities(TOP_CITIES).await?,
    }))
}

#[instrument(skip(_staff, state))]
async fn products(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<ProductAnalytics>, AppError> {
    let days = period.days();
    let top_products = AnalyticsRepository::new(state.pool())
        .top_products(days, TOP_PRODUCTS)
        .await?;

    Ok(Json(ProductAnalytics {
        period_days: days,
        top_products,
    }))
}

#[instrument(skip(_staff, state))]
async fn retention(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Retention>, AppError> {
    let analytics = AnalyticsRepository::new(state.pool());

    Ok(Json(Retention {
        segments: analytics.retention_segments().await?,
        repeat_purchase_rate: analytics.repeat_rate().await?,
    }))
}
