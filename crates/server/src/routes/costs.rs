//! Fixed cost routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{BillingCycle, FixedCostId, money};

use crate::{
    db::FixedCostRepository,
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::{RequireManager, RequireStaff},
    models::{FixedCost, FixedCostUpdate, NewFixedCost},
    services::profit::{CostSummary, PeriodCosts, Period, allocate_period, summarize_costs},
    state::AppState,
};

use super::{JsonBody, MessageResponse};

/// Categories offered by the dashboard even before any cost uses them.
pub const PREDEFINED_CATEGORIES: &[&str] = &[
    "Housing",
    "Personnel",
    "IT & Communication",
    "Utilities",
    "Insurance",
    "Professional Services",
    "Marketing",
    "Financial",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fixed-costs", get(list).post(create))
        .route("/fixed-costs/summary", get(summary))
        .route(
            "/fixed-costs/{id}",
            get(show).put(update).delete(destroy),
        )
        .route("/categories", get(categories))
        .route("/period-costs", get(period_costs))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCostRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub amount: Decimal,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCostRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub billing_cycle: Option<BillingCycle>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CostsResponse {
    pub costs: Vec<FixedCost>,
}

#[derive(Debug, Serialize)]
pub struct CostResponse {
    pub message: &'static str,
    pub cost: FixedCost,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

fn check_dates(v: &mut Validator, start: NaiveDate, end: Option<NaiveDate>) {
    v.check(
        end.is_none_or(|end| end >= start),
        "end_date",
        "end_date cannot be before start_date",
    );
}

/// Predefined categories followed by any others in use, without duplicates.
fn merge_categories(in_use: Vec<String>) -> Vec<String> {
    let mut categories: Vec<String> = PREDEFINED_CATEGORIES
        .iter()
        .map(ToString::to_string)
        .collect();
    for category in in_use {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CostsResponse>, AppError> {
    let costs = FixedCostRepository::new(state.pool())
        .list(query.category.as_deref(), query.is_active)
        .await?;
    Ok(Json(CostsResponse { costs }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<FixedCostId>,
) -> Result<Json<FixedCost>, AppError> {
    let cost = FixedCostRepository::new(state.pool())
        .get(id)
        .await
        .or_not_found("Fixed cost")?;
    Ok(Json(cost))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, name = %body.name))]
async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateCostRequest>,
) -> Result<(StatusCode, Json<CostResponse>), AppError> {
    let mut v = Validator::new();
    v.required(&body.name, "name")
        .required(&body.category, "category")
        .check(
            money::is_amount(body.amount),
            "amount",
            "amount must be between 0 and 1000000000",
        );
    check_dates(&mut v, body.start_date, body.end_date);
    v.finish()?;

    let cost = FixedCostRepository::new(state.pool())
        .create(&NewFixedCost {
            name: body.name.trim().to_string(),
            description: body.description,
            category: body.category.trim().to_string(),
            amount: body.amount,
            billing_cycle: body.billing_cycle,
            start_date: body.start_date,
            end_date: body.end_date,
        })
        .await?;

    info!(cost_id = %cost.id, "Fixed cost created");
    Ok((
        StatusCode::CREATED,
        Json(CostResponse {
            message: "Fixed cost created successfully",
            cost,
        }),
    ))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<FixedCostId>,
    JsonBody(body): JsonBody<UpdateCostRequest>,
) -> Result<Json<CostResponse>, AppError> {
    let repo = FixedCostRepository::new(state.pool());
    let existing = repo.get(id).await.or_not_found("Fixed cost")?;

    let mut v = Validator::new();
    v.check(
        body.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
        "name",
        "name cannot be empty",
    )
    .check(
        body.amount.is_none_or(money::is_amount),
        "amount",
        "amount must be between 0 and 1000000000",
    );
    check_dates(
        &mut v,
        body.start_date.unwrap_or(existing.start_date),
        body.end_date.or(existing.end_date),
    );
    v.finish()?;

    let update = FixedCostUpdate {
        name: body.name,
        description: body.description,
        category: body.category,
        amount: body.amount,
        billing_cycle: body.billing_cycle,
        start_date: body.start_date,
        end_date: body.end_date,
        is_active: body.is_active,
    };
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let cost = repo.update(id, update).await.missing_as("Fixed cost")?;

    info!(cost_id = %id, "Fixed cost updated");
    Ok(Json(CostResponse {
        message: "Fixed cost updated successfully",
        cost,
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn destroy(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<FixedCostId>,
) -> Result<Json<MessageResponse>, AppError> {
    FixedCostRepository::new(state.pool())
        .deactivate(id)
        .await
        .missing_as("Fixed cost")?;

    info!(cost_id = %id, "Fixed cost deactivated");
    Ok(Json(MessageResponse::new("Fixed cost deleted successfully")))
}

#[instrument(skip(_staff, state))]
async fn summary(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<CostSummary>, AppError> {
    let costs = FixedCostRepository::new(state.pool()).list_active().await?;
    Ok(Json(summarize_costs(&costs)))
}

#[instrument(skip(_staff, state))]
async fn categories(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let in_use = FixedCostRepository::new(state.pool())
        .categories_in_use()
        .await?;
    Ok(Json(CategoriesResponse {
        categories: merge_categories(in_use),
    }))
}

#[instrument(skip(_staff, state))]
async fn period_costs(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<PeriodCosts>, AppError> {
    let start = query
        .start_date
        .ok_or_else(|| AppError::BadRequest("start_date is required".to_string()))?;
    let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
    if end < start {
        return Err(AppError::BadRequest(
            "end_date cannot be before start_date".to_string(),
        ));
    }

    let costs = FixedCostRepository::new(state.pool())
        .active_in_period(start, end)
        .await?;
    Ok(Json(allocate_period(costs, Period::new(start, end))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_merge_keeps_order_and_drops_duplicates() {
        let merged = merge_categories(vec!["Marketing".to_string(), "Software".to_string()]);
        assert_eq!(merged.len(), PREDEFINED_CATEGORIES.len() + 1);
        assert_eq!(merged.first().map(String::as_str), Some("Housing"));
        assert_eq!(merged.last().map(String::as_str), Some("Software"));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let mut v = Validator::new();
        check_dates(&mut v, start, start.pred_opt());
        assert!(v.finish().is_err());

        let mut v = Validator::new();
        check_dates(&mut v, start, Some(start));
        assert!(v.finish().is_ok());
    }
}
