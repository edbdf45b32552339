//! Database migration command.
//!
//! ```bash
//! crm-cli migrate
//! ```
//!
//! The migrations are embedded in `webshop-crm-server` from
//! `crates/server/migrations/`, so the CLI always applies the same set the
//! server was built with.

use thiserror::Error;
use webshop_crm_server::db;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
