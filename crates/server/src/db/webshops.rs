//! Webshop (tenant) repository.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{UserId, WebshopId, money};

use super::{RepositoryError, parse_column, push_set};
use crate::models::{
    NewWebshop, Webshop, WebshopListing, WebshopMember, WebshopSubscription, WebshopUpdate,
};

const WEBSHOP_COLUMNS: &str = "w.id, w.name, w.domain, w.description, w.owner_id, \
     w.subscription_plan, w.settings, w.is_active, w.created_at, w.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct WebshopRow {
    id: i64,
    name: String,
    domain: Option<String>,
    description: Option<String>,
    owner_id: Option<i64>,
    subscription_plan: String,
    settings: Json<serde_json::Value>,
    is_active: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<WebshopRow> for Webshop {
    type Error = RepositoryError;

    fn try_from(row: WebshopRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: WebshopId::new(row.id),
            name: row.name,
            domain: row.domain,
            description: row.description,
            owner_id: row.owner_id.map(UserId::new),
            subscription_plan: parse_column(&row.subscription_plan)?,
            settings: row.settings.0,
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebshopListingRow {
    #[sqlx(flatten)]
    webshop: WebshopRow,
    customers_count: i64,
    orders_count: i64,
    revenue: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    plan: String,
    price_monthly: f64,
    price_yearly: Option<f64>,
    max_customers: i64,
    max_orders: i64,
    max_products: i64,
    status: String,
    billing_cycle: String,
    current_period_start: NaiveDate,
    current_period_end: NaiveDate,
}

impl TryFrom<SubscriptionRow> for WebshopSubscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            plan: parse_column(&row.plan)?,
            price_monthly: money::from_db(row.price_monthly),
            price_yearly: row.price_yearly.map(money::from_db),
            max_customers: row.max_customers,
            max_orders: row.max_orders,
            max_products: row.max_products,
            status: row.status,
            billing_cycle: row.billing_cycle,
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    user_id: i64,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
}

/// Repository for webshops.
pub struct WebshopRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WebshopRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Active webshops with customer/order counts and revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<WebshopListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, WebshopListingRow>(&format!(
            "SELECT {WEBSHOP_COLUMNS},
                (SELECT COUNT(*) FROM customers c WHERE c.webshop_id = w.id) AS customers_count,
                (SELECT COUNT(*) FROM orders o WHERE o.webshop_id = w.id) AS orders_count,
                (SELECT COALESCE(SUM(o.total_amount), 0.0) FROM orders o
                 WHERE o.webshop_id = w.id AND o.status != 'cancelled') AS revenue
             FROM webshops w
             WHERE w.is_active = 1
             ORDER BY w.created_at DESC, w.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<WebshopListing, RepositoryError> {
                Ok(WebshopListing {
                    webshop: r.webshop.try_into()?,
                    customers_count: r.customers_count,
                    orders_count: r.orders_count,
                    revenue: money::from_db(r.revenue),
                })
            })
            .collect()
    }

    /// Get a webshop by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: WebshopId) -> Result<Option<Webshop>, RepositoryError> {
        let row = sqlx::query_as::<_, WebshopRow>(&format!(
            "SELECT {WEBSHOP_COLUMNS} FROM webshops w WHERE w.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find an active webshop by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Webshop>, RepositoryError> {
        let row = sqlx::query_as::<_, WebshopRow>(&format!(
            "SELECT {WEBSHOP_COLUMNS} FROM webshops w WHERE w.name = ? AND w.is_active = 1"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a webshop together with its plan subscription and, when it has
    /// an owner, the owner's access row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create(&self, webshop: &NewWebshop) -> Result<Webshop, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO webshops (name, domain, description, owner_id, subscription_plan, settings)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&webshop.name)
        .bind(&webshop.domain)
        .bind(&webshop.description)
        .bind(webshop.owner_id)
        .bind(webshop.subscription_plan)
        .bind(Json(&webshop.settings))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO subscriptions
                (webshop_id, plan_id, current_period_start, current_period_end)
             SELECT ?, id, date('now'), date('now', '+1 month')
             FROM subscription_plans WHERE name = ?",
        )
        .bind(id)
        .bind(webshop.subscription_plan)
        .execute(&mut *tx)
        .await?;

        if let Some(owner_id) = webshop.owner_id {
            sqlx::query(
                "INSERT INTO user_webshop_access (user_id, webshop_id, role, granted_by)
                 VALUES (?, ?, 'owner', ?)",
            )
            .bind(owner_id)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get(WebshopId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// The webshop's subscription joined with its plan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription(
        &self,
        id: WebshopId,
    ) -> Result<Option<WebshopSubscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT p.name AS plan, p.price_monthly, p.price_yearly, p.max_customers,
                    p.max_orders, p.max_products, s.status, s.billing_cycle,
                    s.current_period_start, s.current_period_end
             FROM subscriptions s
             JOIN subscription_plans p ON p.id = s.plan_id
             WHERE s.webshop_id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Staff users with access to the webshop, owners first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn members(&self, id: WebshopId) -> Result<Vec<WebshopMember>, RepositoryError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT u.id AS user_id, u.email, u.first_name, u.last_name, a.role
             FROM user_webshop_access a
             JOIN users u ON u.id = a.user_id
             WHERE a.webshop_id = ?
             ORDER BY a.role = 'owner' DESC, u.email",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WebshopMember {
                user_id: UserId::new(r.user_id),
                email: r.email,
                first_name: r.first_name,
                last_name: r.last_name,
                role: r.role,
            })
            .collect())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the webshop does not exist.
    pub async fn update(
        &self,
        id: WebshopId,
        update: WebshopUpdate,
    ) -> Result<Webshop, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE webshops SET updated_at = CURRENT_TIMESTAMP");
        push_set(&mut qb, "name", update.name);
        push_set(&mut qb, "domain", update.domain);
        push_set(&mut qb, "description", update.description);
        push_set(&mut qb, "subscription_plan", update.subscription_plan);
        push_set(&mut qb, "settings", update.settings.map(Json));
        qb.push(" WHERE id = ").push_bind(id);

        let plan = update.subscription_plan;
        let mut tx = self.pool.begin().await?;
        let result = qb.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(plan) = plan {
            sqlx::query(
                "INSERT INTO subscriptions
                    (webshop_id, plan_id, current_period_start, current_period_end)
                 SELECT ?, id, date('now'), date('now', '+1 month')
                 FROM subscription_plans WHERE name = ?
                 ON CONFLICT (webshop_id) DO UPDATE SET
                    plan_id = excluded.plan_id,
                    updated_at = CURRENT_TIMESTAMP",
            )
            .bind(id)
            .bind(plan)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the webshop does not exist.
    pub async fn deactivate(&self, id: WebshopId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE webshops SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
