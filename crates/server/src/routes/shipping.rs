//! Shipping and tax routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{TaxScope, money};

use crate::{
    db::ShippingRepository,
    error::{AppError, Validator},
    middleware::{RequireManager, RequireStaff},
    models::{NewShippingRule, NewTaxRule, ShippingRule, TaxRule},
    services::{
        PricingService,
        pricing::{MAX_LINE_QUANTITY, ShippingItem, ShippingQuote, TaxCalculation, TaxItem},
    },
    state::AppState,
};

use super::JsonBody;

const DEFAULT_MAX_WEIGHT: i64 = 999_999;
const DEFAULT_MAX_ORDER_VALUE: Decimal = dec!(999999.99);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/calculate-tax", post(calculate_tax))
        .route("/tax-rules", get(list_tax_rules).post(create_tax_rule))
}

#[derive(Debug, Deserialize)]
pub struct CountryQuery {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingRequest {
    pub country: String,
    pub items: Vec<ShippingItem>,
    pub total_value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TaxRequest {
    pub country: String,
    #[serde(default)]
    pub items: Vec<TaxItem>,
    pub subtotal: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub country: String,
    pub min_weight: Option<i64>,
    pub max_weight: Option<i64>,
    pub min_order_value: Option<Decimal>,
    pub max_order_value: Option<Decimal>,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaxRuleRequest {
    pub name: String,
    pub country: String,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub applies_to: TaxScope,
    pub product_category: Option<String>,
}

impl CreateTaxRuleRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .required(&self.name, "name")
            .required(&self.country, "country")
            .check(
                (Decimal::ZERO..=dec!(100)).contains(&self.tax_rate),
                "tax_rate",
                "tax_rate must be between 0 and 100",
            )
            .check(
                self.applies_to != TaxScope::Category
                    || self
                        .product_category
                        .as_deref()
                        .is_some_and(|c| !c.trim().is_empty()),
                "product_category",
                "product_category is required for category rules",
            )
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub rules: Vec<ShippingRule>,
}

#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub message: &'static str,
    pub rule: ShippingRule,
}

#[derive(Debug, Serialize)]
pub struct TaxRulesResponse {
    pub rules: Vec<TaxRule>,
}

#[derive(Debug, Serialize)]
pub struct TaxRuleResponse {
    pub message: &'static str,
    pub rule: TaxRule,
}

#[instrument(skip(_staff, state, body), fields(country = %body.country))]
async fn calculate(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ShippingRequest>,
) -> Result<Json<ShippingQuote>, AppError> {
    let mut v = Validator::new();
    v.required(&body.country, "country")
        .check(!body.items.is_empty(), "items", "at least one item is required")
        .check(
            money::is_amount(body.total_value),
            "total_value",
            "total_value must be between 0 and 1000000000",
        );
    for item in &body.items {
        v.check(
            (1..=MAX_LINE_QUANTITY).contains(&item.quantity),
            "items.quantity",
            "quantity must be between 1 and 100000",
        );
    }
    v.finish()?;

    let quote = PricingService::new(state.pool())
        .shipping(&body.country, &body.items, body.total_value)
        .await?;
    Ok(Json(quote))
}

#[instrument(skip(_staff, state))]
async fn list_rules(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<RulesResponse>, AppError> {
    let rules = ShippingRepository::new(state.pool())
        .list_rules(query.country.as_deref())
        .await?;
    Ok(Json(RulesResponse { rules }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, country = %body.country))]
async fn create_rule(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), AppError> {
    Validator::new()
        .required(&body.name, "name")
        .required(&body.country, "country")
        .check(
            money::is_amount(body.shipping_cost),
            "shipping_cost",
            "shipping_cost must be between 0 and 1000000000",
        )
        .check(
            body.free_shipping_threshold.is_none_or(money::is_amount),
            "free_shipping_threshold",
            "free_shipping_threshold must be between 0 and 1000000000",
        )
        .finish()?;

    let rule = ShippingRepository::new(state.pool())
        .create_rule(&NewShippingRule {
            name: body.name.trim().to_string(),
            country: body.country.trim().to_string(),
            min_weight: body.min_weight.unwrap_or(0),
            max_weight: body.max_weight.unwrap_or(DEFAULT_MAX_WEIGHT),
            min_order_value: body.min_order_value.unwrap_or(Decimal::ZERO),
            max_order_value: body.max_order_value.unwrap_or(DEFAULT_MAX_ORDER_VALUE),
            shipping_cost: body.shipping_cost,
            free_shipping_threshold: body.free_shipping_threshold,
        })
        .await?;

    info!(rule_id = %rule.id, "Shipping rule created");
    Ok((
        StatusCode::CREATED,
        Json(RuleResponse {
            message: "Shipping rule created successfully",
            rule,
        }),
    ))
}

#[instrument(skip(_staff, state, body), fields(country = %body.country))]
async fn calculate_tax(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<TaxRequest>,
) -> Result<Json<TaxCalculation>, AppError> {
    let mut v = Validator::new();
    v.required(&body.country, "country").check(
        money::is_amount(body.subtotal),
        "subtotal",
        "subtotal must be between 0 and 1000000000",
    );
    for item in &body.items {
        v.check(
            money::is_amount(item.total_price),
            "items.total_price",
            "total_price must be between 0 and 1000000000",
        );
    }
    v.finish()?;

    let calculation = PricingService::new(state.pool())
        .tax(&body.country, &body.items, body.subtotal)
        .await?;
    Ok(Json(calculation))
}

#[instrument(skip(_staff, state))]
async fn list_tax_rules(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<TaxRulesResponse>, AppError> {
    let rules = ShippingRepository::new(state.pool())
        .list_tax_rules(query.country.as_deref())
        .await?;
    Ok(Json(TaxRulesResponse { rules }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, country = %body.country))]
async fn create_tax_rule(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateTaxRuleRequest>,
) -> Result<(StatusCode, Json<TaxRuleResponse>), AppError> {
    body.validate()?;

    let product_category = match body.applies_to {
        TaxScope::Category => body.product_category.map(|c| c.trim().to_string()),
        TaxScope::All => None,
    };
    let rule = ShippingRepository::new(state.pool())
        .create_tax_rule(&NewTaxRule {
            name: body.name.trim().to_string(),
            country: body.country.trim().to_string(),
            tax_rate: body.tax_rate,
            applies_to: body.applies_to,
            product_category,
        })
        .await?;

    info!(rule_id = %rule.id, "Tax rule created");
    Ok((
        StatusCode::CREATED,
        Json(TaxRuleResponse {
            message: "Tax rule created successfully",
            rule,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax_rule(
        applies_to: TaxScope,
        category: Option<&str>,
        rate: Decimal,
    ) -> CreateTaxRuleRequest {
        CreateTaxRuleRequest {
            name: "BTW".to_string(),
            country: "Nederland".to_string(),
            tax_rate: rate,
            applies_to,
            product_category: category.map(String::from),
        }
    }

    #[test]
    fn test_category_rule_needs_category() {
        assert!(tax_rule(TaxScope::Category, None, dec!(9)).validate().is_err());
        assert!(tax_rule(TaxScope::Category, Some("Boeken"), dec!(9)).validate().is_ok());
        assert!(tax_rule(TaxScope::All, None, dec!(21)).validate().is_ok());
    }

    #[test]
    fn test_rate_bounds() {
        assert!(tax_rule(TaxScope::All, None, dec!(100)).validate().is_ok());
        assert!(tax_rule(TaxScope::All, None, dec!(100.01)).validate().is_err());
        assert!(tax_rule(TaxScope::All, None, dec!(-1)).validate().is_err());
    }
}
