//! Database operations for the CRM `SQLite` database.
//!
//! ## Tables
//!
//! - `users` - Staff accounts (admin / manager / user)
//! - `webshops` - Tenants
//! - `customers`, `customer_interactions` - CRM records and contact log
//! - `products` - Catalogue with purchase/selling prices and package dimensions
//! - `orders`, `order_items` - Orders and their lines
//! - `shipping_rules`, `tax_rules` - Per-country pricing rules
//! - `fixed_costs` - Recurring business costs
//! - `ad_campaigns`, `ad_metrics` - Advertising spend and results
//! - `profit_analysis` - Stored profit snapshots
//! - `email_logs` - Outbound email history
//! - `api_settings` - Integration credentials managed through the API
//! - `shipping_tracking` - Carrier labels per order
//! - `subscription_plans`, `subscriptions` - Plan catalogue and one subscription per webshop
//! - `user_webshop_access` - Staff members of a webshop
//! - `payment_providers`, `payments` - Payment records (schema only)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and embedded in the
//! binary. They run on startup unless `CRM_AUTO_MIGRATE=false`, or explicitly:
//! ```bash
//! cargo run -p webshop-crm-cli -- migrate
//! ```

pub mod advertising;
pub mod analytics;
pub mod api_settings;
pub mod costs;
pub mod customers;
pub mod email_logs;
pub mod orders;
pub mod products;
pub mod profit;
pub mod shipping;
pub mod tracking;
pub mod users;
pub mod webshops;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use advertising::AdvertisingRepository;
pub use analytics::AnalyticsRepository;
pub use api_settings::ApiSettingsRepository;
pub use costs::FixedCostRepository;
pub use customers::CustomerRepository;
pub use email_logs::EmailLogRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profit::ProfitRepository;
pub use shipping::ShippingRepository;
pub use tracking::TrackingRepository;
pub use users::UserRepository;
pub use webshops::WebshopRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict(message)`, anything else to
/// `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(e)
}

/// Append `, column = ?` to an `UPDATE ... SET` builder when a value is given.
pub(crate) fn push_set<'args, T>(
    qb: &mut QueryBuilder<'args, Sqlite>,
    column: &str,
    value: Option<T>,
) where
    T: 'args + sqlx::Encode<'args, Sqlite> + sqlx::Type<Sqlite>,
{
    if let Some(value) = value {
        qb.push(", ").push(column).push(" = ").push_bind(value);
    }
}

/// Parse a TEXT enum column, reporting bad values as data corruption.
pub(crate) fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T, RepositoryError> {
    value.parse().map_err(RepositoryError::DataCorruption)
}

/// `SQLite` modifier for "N days ago", e.g. `-30 days`.
pub(crate) fn days_ago(days: i64) -> String {
    format!("-{days} days")
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// The database file is created if missing and foreign keys are enforced on
/// every connection.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the database cannot be opened.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Create a single-connection in-memory database.
///
/// Every pooled connection to `:memory:` would be a separate database, so the
/// pool is pinned to one connection that is never recycled.
///
/// # Errors
///
/// Returns `sqlx::Error` if `SQLite` cannot be opened.
pub async fn create_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails or the applied
/// history diverges from the embedded set.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
