//! Shipping and tax rule repository.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{ShippingRuleId, TaxRuleId, money};

use super::{RepositoryError, parse_column};
use crate::models::{NewShippingRule, NewTaxRule, ShippingRule, TaxRule};

const SHIPPING_COLUMNS: &str = "id, name, country, min_weight, max_weight, min_order_value, \
     max_order_value, shipping_cost, free_shipping_threshold, is_active, created_at";

const TAX_COLUMNS: &str =
    "id, name, country, tax_rate, applies_to, product_category, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ShippingRuleRow {
    id: i64,
    name: String,
    country: String,
    min_weight: i64,
    max_weight: i64,
    min_order_value: f64,
    max_order_value: f64,
    shipping_cost: f64,
    free_shipping_threshold: Option<f64>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl From<ShippingRuleRow> for ShippingRule {
    fn from(row: ShippingRuleRow) -> Self {
        Self {
            id: ShippingRuleId::new(row.id),
            name: row.name,
            country: row.country,
            min_weight: row.min_weight,
            max_weight: row.max_weight,
            min_order_value: money::from_db(row.min_order_value),
            max_order_value: money::from_db(row.max_order_value),
            shipping_cost: money::from_db(row.shipping_cost),
            free_shipping_threshold: row.free_shipping_threshold.map(money::from_db),
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaxRuleRow {
    id: i64,
    name: String,
    country: String,
    tax_rate: f64,
    applies_to: String,
    product_category: Option<String>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<TaxRuleRow> for TaxRule {
    type Error = RepositoryError;

    fn try_from(row: TaxRuleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TaxRuleId::new(row.id),
            name: row.name,
            country: row.country,
            tax_rate: money::from_db(row.tax_rate),
            applies_to: parse_column(&row.applies_to)?,
            product_category: row.product_category,
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
        })
    }
}

/// Repository for shipping and tax rules.
pub struct ShippingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShippingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Active shipping rules, optionally for one country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_rules(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<ShippingRule>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_rules WHERE is_active = 1"
        ));
        if let Some(country) = country {
            qb.push(" AND country = ").push_bind(country);
        }
        qb.push(" ORDER BY country, min_weight");

        let rows = qb
            .build_query_as::<ShippingRuleRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cheapest active rule covering the package weight and order value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_rule(
        &self,
        country: &str,
        weight_grams: i64,
        order_value: Decimal,
    ) -> Result<Option<ShippingRule>, RepositoryError> {
        let value = money::to_db(order_value);
        let row = sqlx::query_as::<_, ShippingRuleRow>(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_rules
             WHERE is_active = 1
               AND country = ?
               AND min_weight <= ? AND max_weight >= ?
               AND min_order_value <= ? AND max_order_value >= ?
             ORDER BY shipping_cost ASC, id ASC
             LIMIT 1"
        ))
        .bind(country)
        .bind(weight_grams)
        .bind(weight_grams)
        .bind(value)
        .bind(value)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a shipping rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_rule(&self, rule: &NewShippingRule) -> Result<ShippingRule, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingRuleRow>(&format!(
            "INSERT INTO shipping_rules
                (name, country, min_weight, max_weight, min_order_value, max_order_value,
                 shipping_cost, free_shipping_threshold)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {SHIPPING_COLUMNS}"
        ))
        .bind(&rule.name)
        .bind(&rule.country)
        .bind(rule.min_weight)
        .bind(rule.max_weight)
        .bind(money::to_db(rule.min_order_value))
        .bind(money::to_db(rule.max_order_value))
        .bind(money::to_db(rule.shipping_cost))
        .bind(rule.free_shipping_threshold.map(money::to_db))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Whether an identical shipping rule (same name and country) exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rule_exists(&self, name: &str, country: &str) -> Result<bool, RepositoryError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM shipping_rules WHERE name = ? AND country = ?")
                .bind(name)
                .bind(country)
                .fetch_optional(self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Active tax rules, optionally for one country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_tax_rules(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<TaxRule>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TAX_COLUMNS} FROM tax_rules WHERE is_active = 1"
        ));
        if let Some(country) = country {
            qb.push(" AND country = ").push_bind(country);
        }
        qb.push(" ORDER BY country, applies_to, id");

        let rows = qb
            .build_query_as::<TaxRuleRow>()
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create a tax rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_tax_rule(&self, rule: &NewTaxRule) -> Result<TaxRule, RepositoryError> {
        let row = sqlx::query_as::<_, TaxRuleRow>(&format!(
            "INSERT INTO tax_rules (name, country, tax_rate, applies_to, product_category)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {TAX_COLUMNS}"
        ))
        .bind(&rule.name)
        .bind(&rule.country)
        .bind(money::to_db(rule.tax_rate))
        .bind(rule.applies_to)
        .bind(&rule.product_category)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Whether a tax rule with the same name and country exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tax_rule_exists(&self, name: &str, country: &str) -> Result<bool, RepositoryError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM tax_rules WHERE name = ? AND country = ?")
                .bind(name)
                .bind(country)
                .fetch_optional(self.pool)
                .await?;
        Ok(found.is_some())
    }
}
