//! Rule-based recommendation routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::instrument;

use webshop_crm_core::ProductId;

use crate::{
    error::AppError,
    middleware::RequireStaff,
    services::{
        InsightService,
        insights::{
            BusinessHealth, CustomerAnalysis, Dashboard, DetailedAnalysis, ProductAdvice,
            ProductAnalysis, SeasonalRecommendation, seasonal_recommendations,
        },
    },
    state::AppState,
};

use super::PeriodQuery;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/product-recommendations", get(product_recommendations))
        .route("/customer-insights", get(customer_insights))
        .route("/business-health", get(business_health))
        .route("/seasonal-recommendations", get(seasonal))
        .route("/dashboard", get(dashboard))
        .route("/product/{id}/recommendation", get(product_recommendation))
        .route("/insights", get(insights))
}

#[derive(Debug, Serialize)]
pub struct SeasonalResponse {
    pub month: u32,
    pub recommendations: Vec<SeasonalRecommendation>,
}

#[instrument(skip(_staff, state))]
async fn product_recommendations(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<ProductAnalysis>, AppError> {
    let analysis = InsightService::new(state.pool())
        .products(period.days())
        .await?;
    Ok(Json(analysis))
}

#[instrument(skip(_staff, state))]
async fn customer_insights(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<CustomerAnalysis>, AppError> {
    Ok(Json(InsightService::new(state.pool()).customers().await?))
}

#[instrument(skip(_staff, state))]
async fn business_health(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<BusinessHealth>, AppError> {
    Ok(Json(InsightService::new(state.pool()).business_health().await?))
}

#[instrument(skip(_staff))]
async fn seasonal(RequireStaff(_staff): RequireStaff) -> Json<SeasonalResponse> {
    let month = Utc::now().month();
    Json(SeasonalResponse {
        month,
        recommendations: seasonal_recommendations(month),
    })
}

#[instrument(skip(_staff, state))]
async fn dashboard(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(InsightService::new(state.pool()).dashboard().await?))
}

#[instrument(skip(_staff, state))]
async fn product_recommendation(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductAdvice>, AppError> {
    Ok(Json(InsightService::new(state.pool()).product(id).await?))
}

#[instrument(skip(_staff, state))]
async fn insights(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<DetailedAnalysis>, AppError> {
    Ok(Json(InsightService::new(state.pool()).detailed().await?))
}
