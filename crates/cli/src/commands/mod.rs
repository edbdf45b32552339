pub mod migrate;
pub mod seed;
pub mod user;

use sqlx::SqlitePool;
use webshop_crm_server::{config, db};

/// Open the database named by the environment.
async fn connect() -> Result<SqlitePool, sqlx::Error> {
    tracing::info!("Connecting to database...");
    db::create_pool(&config::database_url()).await
}
