//! Shipping cost and tax calculation.
//!
//! The rule matching itself is pure; [`PricingService`] loads the rules and
//! product data it needs from the database.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use webshop_crm_core::{TaxScope, money};

use crate::db::{ProductRepository, RepositoryError, ShippingRepository};
use crate::models::{PackageSpec, ShippingRule, TaxRule};

/// Flat rate charged when no shipping rule covers an order.
pub const DEFAULT_SHIPPING_COST: Decimal = dec!(15.95);
pub const DEFAULT_SHIPPING_RULE: &str = "Standard Shipping";
/// Rate applied when a country has no general tax rule.
pub const DEFAULT_TAX_RATE: Decimal = dec!(21);
/// Largest quantity accepted on a single quote line.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// A line of a shipping quote request.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingItem {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Combined package of an order: items are stacked on top of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PackageInfo {
    pub total_weight_grams: i64,
    pub dimensions_cm: Dimensions,
}

/// Sum weights and heights, take the largest footprint. Unknown SKUs are
/// ignored.
#[must_use]
pub fn combine_package(items: &[ShippingItem], specs: &[PackageSpec]) -> PackageInfo {
    let by_sku: HashMap<&str, &PackageSpec> = specs.iter().map(|s| (s.sku.as_str(), s)).collect();

    items
        .iter()
        .filter_map(|item| by_sku.get(item.sku.as_str()).map(|spec| (item.quantity, spec)))
        .fold(PackageInfo::default(), |mut package, (quantity, spec)| {
            package.total_weight_grams = package
                .total_weight_grams
                .saturating_add(spec.weight_grams.saturating_mul(quantity));
            package.dimensions_cm.length = package.dimensions_cm.length.max(spec.length_cm);
            package.dimensions_cm.width = package.dimensions_cm.width.max(spec.width_cm);
            #[allow(clippy::cast_precision_loss)]
            let stacked = spec.height_cm * quantity as f64;
            package.dimensions_cm.height += stacked;
            package
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct ShippingQuote {
    pub shipping_cost: Decimal,
    pub free_shipping: bool,
    pub shipping_rule: String,
    pub package_info: PackageInfo,
    pub free_shipping_threshold: Option<Decimal>,
    pub amount_for_free_shipping: Option<Decimal>,
}

/// Price an order against the matched rule, if any.
#[must_use]
pub fn quote_shipping(
    rule: Option<&ShippingRule>,
    package_info: PackageInfo,
    order_value: Decimal,
) -> ShippingQuote {
    let Some(rule) = rule else {
        return ShippingQuote {
            shipping_cost: DEFAULT_SHIPPING_COST,
            free_shipping: false,
            shipping_rule: DEFAULT_SHIPPING_RULE.to_string(),
            package_info,
            free_shipping_threshold: None,
            amount_for_free_shipping: None,
        };
    };

    let threshold = rule.free_shipping_threshold.filter(|t| !t.is_zero());
    let free_shipping = threshold.is_some_and(|t| order_value >= t);

    ShippingQuote {
        shipping_cost: if free_shipping {
            Decimal::ZERO
        } else {
            rule.shipping_cost
        },
        free_shipping,
        shipping_rule: rule.name.clone(),
        package_info,
        free_shipping_threshold: rule.free_shipping_threshold,
        amount_for_free_shipping: threshold.map(|t| (t - order_value).max(Decimal::ZERO)),
    }
}

/// A line of a tax calculation request.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxItem {
    pub sku: String,
    pub total_price: Decimal,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub rule_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxCalculation {
    pub country: String,
    pub tax_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_breakdown: Vec<TaxLine>,
    pub total_with_tax: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Apply a country's tax rules to an order.
///
/// `categories` maps item SKUs to their product category. A category rule
/// matching the item's category takes precedence over the general rule;
/// items no rule covers are untaxed.
#[must_use]
pub fn calculate_tax(
    country: &str,
    rules: &[TaxRule],
    items: &[TaxItem],
    categories: &HashMap<String, Option<String>>,
    subtotal: Decimal,
) -> TaxCalculation {
    if rules.is_empty() {
        return TaxCalculation {
            country: country.to_string(),
            tax_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_breakdown: Vec::new(),
            total_with_tax: subtotal,
            message: Some(format!("No tax rules found for {country}")),
        };
    }

    let general = rules.iter().find(|r| r.applies_to == TaxScope::All);

    if items.is_empty() {
        let rate = general.map_or(DEFAULT_TAX_RATE, |r| r.tax_rate);
        let tax = money::round2(subtotal * rate / Decimal::ONE_HUNDRED);
        return TaxCalculation {
            country: country.to_string(),
            tax_amount: tax,
            tax_rate: rate,
            tax_breakdown: vec![TaxLine {
                sku: None,
                name: None,
                category: None,
                tax_rate: rate,
                tax_amount: tax,
                rule_name: general.map_or_else(|| "Standard VAT".to_string(), |r| r.name.clone()),
            }],
            total_with_tax: subtotal + tax,
            message: None,
        };
    }

    let breakdown: Vec<TaxLine> = items
        .iter()
        .filter_map(|item| {
            let category = categories.get(&item.sku).cloned().flatten();
            let rule = rules
                .iter()
                .find(|r| {
                    r.applies_to == TaxScope::Category
                        && category.is_some()
                        && r.product_category == category
                })
                .or(general)?;

            Some(TaxLine {
                sku: Some(item.sku.clone()),
                name: Some(item.name.clone().unwrap_or_else(|| item.sku.clone())),
                category,
                tax_rate: rule.tax_rate,
                tax_amount: money::round2(item.total_price * rule.tax_rate / Decimal::ONE_HUNDRED),
                rule_name: rule.name.clone(),
            })
        })
        .collect();

    let tax: Decimal = breakdown.iter().map(|l| l.tax_amount).sum();

    TaxCalculation {
        country: country.to_string(),
        tax_amount: tax,
        tax_rate: if tax.is_zero() {
            Decimal::ZERO
        } else {
            money::percentage(tax, subtotal)
        },
        tax_breakdown: breakdown,
        total_with_tax: subtotal + tax,
        message: None,
    }
}

/// Database-backed shipping and tax calculator.
pub struct PricingService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PricingService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Quote shipping for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn shipping(
        &self,
        country: &str,
        items: &[ShippingItem],
        order_value: Decimal,
    ) -> Result<ShippingQuote, RepositoryError> {
        let skus: Vec<String> = items.iter().map(|i| i.sku.clone()).collect();
        let specs = ProductRepository::new(self.pool).package_specs(&skus).await?;
        let package = combine_package(items, &specs);

        let rule = ShippingRepository::new(self.pool)
            .find_rule(country, package.total_weight_grams, order_value)
            .await?;

        Ok(quote_shipping(rule.as_ref(), package, order_value))
    }

    /// Calculate tax for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn tax(
        &self,
        country: &str,
        items: &[TaxItem],
        subtotal: Decimal,
    ) -> Result<TaxCalculation, RepositoryError> {
        let rules = ShippingRepository::new(self.pool)
            .list_tax_rules(Some(country))
            .await?;

        let skus: Vec<String> = items.iter().map(|i| i.sku.clone()).collect();
        let categories = ProductRepository::new(self.pool)
            .package_specs(&skus)
            .await?
            .into_iter()
            .map(|s| (s.sku, s.category))
            .collect();

        Ok(calculate_tax(country, &rules, items, &categories, subtotal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use webshop_crm_core::{ShippingRuleId, TaxRuleId};

    fn spec(sku: &str, weight: i64, l: f64, w: f64, h: f64) -> PackageSpec {
        PackageSpec {
            sku: sku.to_string(),
            category: None,
            weight_grams: weight,
            length_cm: l,
            width_cm: w,
            height_cm: h,
        }
    }

    fn shipping_rule(cost: Decimal, threshold: Option<Decimal>) -> ShippingRule {
        ShippingRule {
            id: ShippingRuleId::new(1),
            name: "NL Standaard".to_string(),
            country: "NL".to_string(),
            min_weight: 0,
            max_weight: 999_999,
            min_order_value: Decimal::ZERO,
            max_order_value: dec!(999999.99),
            shipping_cost: cost,
            free_shipping_threshold: threshold,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn tax_rule(name: &str, rate: Decimal, category: Option<&str>) -> TaxRule {
        TaxRule {
            id: TaxRuleId::new(1),
            name: name.to_string(),
            country: "NL".to_string(),
            tax_rate: rate,
            applies_to: if category.is_some() {
                TaxScope::Category
            } else {
                TaxScope::All
            },
            product_category: category.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn item(sku: &str, quantity: i64) -> ShippingItem {
        ShippingItem {
            sku: sku.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_combine_package_stacks_heights() {
        let specs = vec![
            spec("A", 500, 30.0, 20.0, 5.0),
            spec("B", 250, 40.0, 10.0, 2.0),
        ];
        let package = combine_package(&[item("A", 2), item("B", 1), item("GHOST", 9)], &specs);

        assert_eq!(package.total_weight_grams, 1250);
        assert!((package.dimensions_cm.length - 40.0).abs() < f64::EPSILON);
        assert!((package.dimensions_cm.width - 20.0).abs() < f64::EPSILON);
        assert!((package.dimensions_cm.height - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_combine_package_weight_saturates() {
        let specs = vec![spec("BOX1", 1000, 10.0, 10.0, 1.0)];
        let package = combine_package(&[item("BOX1", i64::MAX), item("BOX1", 1)], &specs);
        assert_eq!(package.total_weight_grams, i64::MAX);
    }

    #[test]
    fn test_quote_without_rule_uses_default() {
        let quote = quote_shipping(None, PackageInfo::default(), dec!(20));
        assert_eq!(quote.shipping_cost, dec!(15.95));
        assert_eq!(quote.shipping_rule, "Standard Shipping");
        assert!(quote.amount_for_free_shipping.is_none());
    }

    #[test]
    fn test_quote_below_threshold() {
        let rule = shipping_rule(dec!(4.95), Some(dec!(50)));
        let quote = quote_shipping(Some(&rule), PackageInfo::default(), dec!(35));
        assert_eq!(quote.shipping_cost, dec!(4.95));
        assert!(!quote.free_shipping);
        assert_eq!(quote.amount_for_free_shipping, Some(dec!(15)));
    }

    #[test]
    fn test_quote_at_threshold_is_free() {
        let rule = shipping_rule(dec!(4.95), Some(dec!(50)));
        let quote = quote_shipping(Some(&rule), PackageInfo::default(), dec!(50));
        assert_eq!(quote.shipping_cost, Decimal::ZERO);
        assert!(quote.free_shipping);
        assert_eq!(quote.amount_for_free_shipping, Some(Decimal::ZERO));
    }

    #[test]
    fn test_tax_category_rule_wins() {
        let rules = vec![
            tax_rule("BTW hoog", dec!(21), None),
            tax_rule("BTW laag", dec!(9), Some("Boeken")),
        ];
        let items = vec![
            TaxItem {
                sku: "BOOK".to_string(),
                total_price: dec!(100),
                name: Some("Roman".to_string()),
            },
            TaxItem {
                sku: "MUG".to_string(),
                total_price: dec!(100),
                name: None,
            },
        ];
        let categories = HashMap::from([
            ("BOOK".to_string(), Some("Boeken".to_string())),
            ("MUG".to_string(), Some("Keuken".to_string())),
        ]);

        let calc = calculate_tax("NL", &rules, &items, &categories, dec!(200));
        assert_eq!(calc.tax_amount, dec!(30));
        assert_eq!(calc.tax_rate, dec!(15));
        assert_eq!(calc.total_with_tax, dec!(230));
        assert_eq!(calc.tax_breakdown.len(), 2);
        assert_eq!(calc.tax_breakdown[0].rule_name, "BTW laag");
        assert_eq!(calc.tax_breakdown[1].name.as_deref(), Some("MUG"));
    }

    #[test]
    fn test_tax_without_rules() {
        let calc = calculate_tax("XX", &[], &[], &HashMap::new(), dec!(80));
        assert_eq!(calc.tax_amount, Decimal::ZERO);
        assert_eq!(calc.total_with_tax, dec!(80));
        assert!(calc.message.is_some());
    }

    #[test]
    fn test_tax_with_empty_items_uses_general_rate() {
        let rules = vec![tax_rule("BTW laag", dec!(9), Some("Boeken"))];
        let calc = calculate_tax("NL", &rules, &[], &HashMap::new(), dec!(100));
        assert_eq!(calc.tax_rate, dec!(21));
        assert_eq!(calc.tax_amount, dec!(21));
    }
}
