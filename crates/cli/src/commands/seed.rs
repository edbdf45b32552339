//! Seed data import.
//!
//! `crm-cli seed` makes sure the default admin account exists. With
//! `--file`, it also imports demo data from YAML:
//!
//! ```yaml
//! webshops:
//!   - name: Fietsenwinkel
//!     domain: fietsen.example.nl
//! customers:
//!   - webshop: Fietsenwinkel
//!     email: piet@example.nl
//!     first_name: Piet
//!     last_name: de Vries
//! products:
//!   - webshop: Fietsenwinkel
//!     sku: BEL-01
//!     name: Fietsbel
//!     purchase_price: 2.10
//!     selling_price: 6.95
//! shipping_rules:
//!   - { name: NL standaard, country: NL, shipping_cost: 6.95, free_shipping_threshold: 50 }
//! tax_rules:
//!   - { name: BTW hoog, country: NL, tax_rate: 21 }
//! fixed_costs:
//!   - { name: Hosting, category: Software, amount: 29.00, start_date: 2024-01-01 }
//! ```
//!
//! Entries that already exist are skipped, so the same file can be applied
//! repeatedly.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use webshop_crm_core::{BillingCycle, Email, EmailError, SubscriptionPlan, TaxScope, WebshopId};
use webshop_crm_server::db::{
    CustomerRepository, FixedCostRepository, ProductRepository, RepositoryError,
    ShippingRepository, WebshopRepository,
};
use webshop_crm_server::models::{
    NewCustomer, NewFixedCost, NewProduct, NewShippingRule, NewTaxRule, NewWebshop,
    default_webshop_settings,
};
use webshop_crm_server::services::{AuthError, auth};

/// Upper bound used for open-ended weight and order value ranges.
const OPEN_RANGE: i64 = 999_999;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unknown webshop: {0}")]
    UnknownWebshop(String),

    #[error("Invalid email {email}: {source}")]
    InvalidEmail { email: String, source: EmailError },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub webshops: Vec<SeedWebshop>,
    pub customers: Vec<SeedCustomer>,
    pub products: Vec<SeedProduct>,
    pub shipping_rules: Vec<SeedShippingRule>,
    pub tax_rules: Vec<SeedTaxRule>,
    pub fixed_costs: Vec<SeedFixedCost>,
}

#[derive(Debug, Deserialize)]
pub struct SeedWebshop {
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub subscription_plan: SubscriptionPlan,
    pub settings: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCustomer {
    /// Webshop name; must be defined in the same file or already exist.
    pub webshop: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub webshop: Option<String>,
    /// Required so repeated imports can detect the product.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub weight_grams: i64,
    #[serde(default)]
    pub length_cm: f64,
    #[serde(default)]
    pub width_cm: f64,
    #[serde(default)]
    pub height_cm: f64,
    pub shipping_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_sku: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedShippingRule {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub min_weight: i64,
    #[serde(default = "open_range")]
    pub max_weight: i64,
    #[serde(default)]
    pub min_order_value: Decimal,
    #[serde(default = "open_value")]
    pub max_order_value: Decimal,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SeedTaxRule {
    pub name: String,
    pub country: String,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub applies_to: TaxScope,
    pub product_category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedFixedCost {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub amount: Decimal,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn default_country() -> String {
    "NL".to_string()
}

const fn open_range() -> i64 {
    OPEN_RANGE
}

fn open_value() -> Decimal {
    Decimal::from(OPEN_RANGE)
}

/// Inserted and skipped counts per section.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub inserted: usize,
    pub skipped: usize,
}

impl Tally {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub webshops: Tally,
    pub customers: Tally,
    pub products: Tally,
    pub shipping_rules: Tally,
    pub tax_rules: Tally,
    pub fixed_costs: Tally,
}

// =============================================================================
// Command
// =============================================================================

/// Ensure the default admin exists and import `file` if given.
pub async fn run(file: Option<&Path>) -> Result<(), SeedError> {
    let seed = match file {
        Some(path) => Some(load(path).await?),
        None => None,
    };

    let pool = super::connect().await?;

    match auth::ensure_default_admin(&pool).await? {
        Some(admin) => warn!(
            "Created default admin {} with password '{}', change it after logging in",
            admin.email,
            auth::DEFAULT_ADMIN_PASSWORD
        ),
        None => info!("Staff users already present, default admin not needed"),
    }

    let Some(seed) = seed else {
        return Ok(());
    };

    let summary = import(&pool, &seed).await?;

    info!("Seeding complete!");
    for (section, tally) in [
        ("Webshops", summary.webshops),
        ("Customers", summary.customers),
        ("Products", summary.products),
        ("Shipping rules", summary.shipping_rules),
        ("Tax rules", summary.tax_rules),
        ("Fixed costs", summary.fixed_costs),
    ] {
        info!(
            "  {section}: {} inserted, {} skipped (already exist)",
            tally.inserted, tally.skipped
        );
    }
    Ok(())
}

/// Read and parse a seed file.
pub async fn load(path: &Path) -> Result<SeedFile, SeedError> {
    info!(path = %path.display(), "Loading seed data from file");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Insert every entry of `seed` that is not in the database yet.
pub async fn import(pool: &SqlitePool, seed: &SeedFile) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    let mut webshop_ids = HashMap::new();

    let webshops = WebshopRepository::new(pool);
    for shop in &seed.webshops {
        let (id, inserted) = match webshops.find_by_name(&shop.name).await? {
            Some(existing) => (existing.id, false),
            None => {
                let created = webshops
                    .create(&NewWebshop {
                        name: shop.name.clone(),
                        domain: shop.domain.clone(),
                        description: shop.description.clone(),
                        owner_id: None,
                        subscription_plan: shop.subscription_plan,
                        settings: shop.settings.clone().unwrap_or_else(default_webshop_settings),
                    })
                    .await?;
                (created.id, true)
            }
        };
        webshop_ids.insert(shop.name.as_str(), id);
        summary.webshops.record(inserted);
    }

    let customers = CustomerRepository::new(pool);
    for customer in &seed.customers {
        let email = Email::normalized(&customer.email).map_err(|source| {
            SeedError::InvalidEmail {
                email: customer.email.clone(),
                source,
            }
        })?;
        let new = NewCustomer {
            webshop_id: resolve_webshop(pool, &mut webshop_ids, customer.webshop.as_deref())
                .await?,
            email,
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
            city: customer.city.clone(),
            postal_code: customer.postal_code.clone(),
            country: customer.country.clone(),
            tags: customer.tags.clone(),
            notes: customer.notes.clone(),
        };
        summary
            .customers
            .record(inserted_unless_conflict(customers.create(&new).await)?);
    }

    let products = ProductRepository::new(pool);
    for product in &seed.products {
        let new = NewProduct {
            webshop_id: resolve_webshop(pool, &mut webshop_ids, product.webshop.as_deref())
                .await?,
            sku: Some(product.sku.clone()),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            purchase_price: product.purchase_price,
            selling_price: product.selling_price,
            stock_quantity: product.stock_quantity,
            weight_grams: product.weight_grams,
            length_cm: product.length_cm,
            width_cm: product.width_cm,
            height_cm: product.height_cm,
            shipping_cost: product.shipping_cost,
            supplier: product.supplier.clone(),
            supplier_sku: product.supplier_sku.clone(),
        };
        summary
            .products
            .record(inserted_unless_conflict(products.create(&new).await)?);
    }

    let shipping = ShippingRepository::new(pool);
    for rule in &seed.shipping_rules {
        let country = rule.country.to_uppercase();
        let exists = shipping.rule_exists(&rule.name, &country).await?;
        if !exists {
            shipping
                .create_rule(&NewShippingRule {
                    name: rule.name.clone(),
                    country,
                    min_weight: rule.min_weight,
                    max_weight: rule.max_weight,
                    min_order_value: rule.min_order_value,
                    max_order_value: rule.max_order_value,
                    shipping_cost: rule.shipping_cost,
                    free_shipping_threshold: rule.free_shipping_threshold,
                })
                .await?;
        }
        summary.shipping_rules.record(!exists);
    }

    for rule in &seed.tax_rules {
        let country = rule.country.to_uppercase();
        let exists = shipping.tax_rule_exists(&rule.name, &country).await?;
        if !exists {
            shipping
                .create_tax_rule(&NewTaxRule {
                    name: rule.name.clone(),
                    country,
                    tax_rate: rule.tax_rate,
                    applies_to: rule.applies_to,
                    product_category: rule.product_category.clone(),
                })
                .await?;
        }
        summary.tax_rules.record(!exists);
    }

    let costs = FixedCostRepository::new(pool);
    let today = Utc::now().date_naive();
    for cost in &seed.fixed_costs {
        let exists = costs.exists(&cost.name, &cost.category).await?;
        if !exists {
            costs
                .create(&NewFixedCost {
                    name: cost.name.clone(),
                    description: cost.description.clone(),
                    category: cost.category.clone(),
                    amount: cost.amount,
                    billing_cycle: cost.billing_cycle,
                    start_date: cost.start_date.unwrap_or(today),
                    end_date: cost.end_date,
                })
                .await?;
        }
        summary.fixed_costs.record(!exists);
    }

    Ok(summary)
}

async fn resolve_webshop<'s>(
    pool: &SqlitePool,
    known: &mut HashMap<&'s str, WebshopId>,
    name: Option<&'s str>,
) -> Result<Option<WebshopId>, SeedError> {
    let Some(name) = name else {
        return Ok(None);
    };
    if let Some(id) = known.get(name) {
        return Ok(Some(*id));
    }
    let webshop = WebshopRepository::new(pool)
        .find_by_name(name)
        .await?
        .ok_or_else(|| SeedError::UnknownWebshop(name.to_string()))?;
    known.insert(name, webshop.id);
    Ok(Some(webshop.id))
}

fn inserted_unless_conflict<T>(result: Result<T, RepositoryError>) -> Result<bool, SeedError> {
    match result {
        Ok(_) => Ok(true),
        Err(RepositoryError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use webshop_crm_server::db;

    const DEMO: &str = r"
webshops:
  - name: Fietsenwinkel
    domain: fietsen.example.nl
customers:
  - webshop: Fietsenwinkel
    email: Piet@Example.nl
    first_name: Piet
    last_name: de Vries
    city: Utrecht
products:
  - webshop: Fietsenwinkel
    sku: BEL-01
    name: Fietsbel
    category: Accessoires
    purchase_price: 2.10
    selling_price: 6.95
    weight_grams: 150
shipping_rules:
  - { name: NL standaard, country: nl, shipping_cost: 6.95, free_shipping_threshold: 50 }
tax_rules:
  - { name: BTW hoog, country: NL, tax_rate: 21 }
fixed_costs:
  - { name: Hosting, category: Software, amount: 29.00, start_date: 2024-01-01 }
";

    async fn pool() -> SqlitePool {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_sections_default_to_empty() {
        let seed: SeedFile = serde_yaml::from_str("webshops: []").unwrap();
        assert!(seed.customers.is_empty());
        assert!(seed.fixed_costs.is_empty());
    }

    #[test]
    fn test_shipping_rule_defaults_to_open_ranges() {
        let seed: SeedFile = serde_yaml::from_str(DEMO).unwrap();
        let rule = &seed.shipping_rules[0];
        assert_eq!(rule.min_weight, 0);
        assert_eq!(rule.max_weight, OPEN_RANGE);
        assert_eq!(rule.max_order_value, Decimal::from(OPEN_RANGE));
        assert_eq!(seed.customers[0].country, "NL");
    }

    #[tokio::test]
    async fn test_import_inserts_then_skips() {
        let pool = pool().await;
        let seed: SeedFile = serde_yaml::from_str(DEMO).unwrap();

        let first = import(&pool, &seed).await.unwrap();
        assert_eq!(first.webshops, Tally { inserted: 1, skipped: 0 });
        assert_eq!(first.customers.inserted, 1);
        assert_eq!(first.products.inserted, 1);
        assert_eq!(first.shipping_rules.inserted, 1);
        assert_eq!(first.tax_rules.inserted, 1);
        assert_eq!(first.fixed_costs.inserted, 1);

        let second = import(&pool, &seed).await.unwrap();
        for tally in [
            second.webshops,
            second.customers,
            second.products,
            second.shipping_rules,
            second.tax_rules,
            second.fixed_costs,
        ] {
            assert_eq!(tally, Tally { inserted: 0, skipped: 1 });
        }
    }

    #[tokio::test]
    async fn test_unknown_webshop_rejected() {
        let pool = pool().await;
        let seed: SeedFile = serde_yaml::from_str(
            "customers:\n  - { webshop: Nergens, email: a@b.nl, first_name: A, last_name: B }",
        )
        .unwrap();
        assert!(matches!(
            import(&pool, &seed).await,
            Err(SeedError::UnknownWebshop(name)) if name == "Nergens"
        ));
    }
}
