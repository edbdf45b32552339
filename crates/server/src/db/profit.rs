//! Profit figures and stored snapshots.
//!
//! Every sales figure excludes cancelled orders. Order lines are costed by
//! joining them to the catalogue on SKU; lines without a matching product
//! cost nothing.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use webshop_crm_core::{SnapshotId, UserId, money};

use super::{RepositoryError, days_ago};
use crate::models::{
    CategoryRevenue, DailyProfit, NewProfitSnapshot, PeriodFigures, ProfitSnapshot,
};

const SNAPSHOT_COLUMNS: &str = "id, period_start, period_end, total_revenue, total_cogs, \
     total_fixed_costs, total_ad_spend, gross_profit, net_profit, gross_margin, net_margin, \
     orders_count, created_by, created_at";

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    total_revenue: f64,
    total_cogs: f64,
    total_fixed_costs: f64,
    total_ad_spend: f64,
    gross_profit: f64,
    net_profit: f64,
    gross_margin: f64,
    net_margin: f64,
    orders_count: i64,
    created_by: Option<i64>,
    created_at: NaiveDateTime,
}

impl From<SnapshotRow> for ProfitSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: SnapshotId::new(row.id),
            period_start: row.period_start,
            period_end: row.period_end,
            total_revenue: money::from_db(row.total_revenue),
            total_cogs: money::from_db(row.total_cogs),
            total_fixed_costs: money::from_db(row.total_fixed_costs),
            total_ad_spend: money::from_db(row.total_ad_spend),
            gross_profit: money::from_db(row.gross_profit),
            net_profit: money::from_db(row.net_profit),
            gross_margin: money::from_db(row.gross_margin),
            net_margin: money::from_db(row.net_margin),
            orders_count: row.orders_count,
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at.and_utc(),
        }
    }
}

pub struct ProfitRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfitRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Revenue, COGS, units and ad spend between two dates (inclusive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn period_figures(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PeriodFigures, RepositoryError> {
        let (revenue, orders_count, avg): (f64, i64, f64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_amount), 0.0), COUNT(*), COALESCE(AVG(total_amount), 0.0)
             FROM orders
             WHERE date(order_date) BETWEEN ? AND ? AND status != 'cancelled'",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool)
        .await?;

        let (cogs, units_sold): (f64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(oi.quantity * COALESCE(p.purchase_price, 0.0)), 0.0),
                    COALESCE(SUM(oi.quantity), 0)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             LEFT JOIN products p ON p.sku = oi.product_sku
             WHERE date(o.order_date) BETWEEN ? AND ? AND o.status != 'cancelled'",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool)
        .await?;

        let ad_spend: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(spent), 0.0) FROM ad_metrics WHERE date BETWEEN ? AND ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool)
        .await?;

        Ok(PeriodFigures {
            revenue: money::from_db(revenue),
            orders_count,
            avg_order_value: money::from_db(avg),
            cogs: money::from_db(cogs),
            units_sold,
            ad_spend: money::from_db(ad_spend),
        })
    }

    /// Order-line revenue and cost per product category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_by_category(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CategoryRevenue>, RepositoryError> {
        let rows: Vec<(String, f64, f64, i64)> = sqlx::query_as(
            "SELECT COALESCE(p.category, 'Unknown') AS category,
                    COALESCE(SUM(oi.total_price), 0.0) AS revenue,
                    COALESCE(SUM(oi.quantity * COALESCE(p.purchase_price, 0.0)), 0.0),
                    COALESCE(SUM(oi.quantity), 0)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             LEFT JOIN products p ON p.sku = oi.product_sku
             WHERE date(o.order_date) BETWEEN ? AND ? AND o.status != 'cancelled'
             GROUP BY COALESCE(p.category, 'Unknown')
             ORDER BY revenue DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, revenue, cogs, units_sold)| {
                let revenue = money::from_db(revenue);
                let cogs = money::from_db(cogs);
                CategoryRevenue {
                    category,
                    revenue,
                    cogs,
                    gross_profit: revenue - cogs,
                    units_sold,
                }
            })
            .collect())
    }

    /// Revenue, COGS and order count per day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn daily_trend(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyProfit>, RepositoryError> {
        let revenue_rows: Vec<(NaiveDate, f64, i64)> = sqlx::query_as(
            "SELECT date(order_date) AS day, COALESCE(SUM(total_amount), 0.0), COUNT(*)
             FROM orders
             WHERE date(order_date) BETWEEN ? AND ? AND status != 'cancelled'
             GROUP BY day ORDER BY day",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        let cogs_rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            "SELECT date(o.order_date) AS day,
                    COALESCE(SUM(oi.quantity * COALESCE(p.purchase_price, 0.0)), 0.0)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             LEFT JOIN products p ON p.sku = oi.product_sku
             WHERE date(o.order_date) BETWEEN ? AND ? AND o.status != 'cancelled'
             GROUP BY day",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        let cogs_by_day: BTreeMap<NaiveDate, Decimal> = cogs_rows
            .into_iter()
            .map(|(day, cogs)| (day, money::from_db(cogs)))
            .collect();

        Ok(revenue_rows
            .into_iter()
            .map(|(date, revenue, orders_count)| {
                let revenue = money::from_db(revenue);
                let cogs = cogs_by_day.get(&date).copied().unwrap_or_default();
                DailyProfit {
                    date,
                    revenue,
                    cogs,
                    gross_profit: revenue - cogs,
                    orders_count,
                }
            })
            .collect())
    }

    /// Average of per-month ad spend over the last 6 months.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn avg_monthly_ad_spend(&self) -> Result<Decimal, RepositoryError> {
        let avg: f64 = sqlx::query_scalar(
            "SELECT COALESCE(AVG(monthly_spend), 0.0) FROM (
                SELECT strftime('%Y-%m', date) AS month, SUM(spent) AS monthly_spend
                FROM ad_metrics
                WHERE date >= date('now', '-6 months')
                GROUP BY month
             )",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(money::from_db(avg))
    }

    /// Mean gross margin percentage of the order lines sold in the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn avg_line_margin(&self, days: i64) -> Result<Decimal, RepositoryError> {
        let avg: f64 = sqlx::query_scalar(
            "SELECT COALESCE(AVG(
                (oi.total_price - oi.quantity * COALESCE(p.purchase_price, 0.0))
                    / NULLIF(oi.total_price, 0) * 100
             ), 0.0)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             LEFT JOIN products p ON p.sku = oi.product_sku
             WHERE o.order_date >= datetime('now', ?) AND o.status != 'cancelled'",
        )
        .bind(days_ago(days))
        .fetch_one(self.pool)
        .await?;

        Ok(money::from_db(avg))
    }

    /// Non-cancelled revenue of the current calendar month so far.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn month_to_date_revenue(&self) -> Result<Decimal, RepositoryError> {
        let revenue: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0.0) FROM orders
             WHERE strftime('%Y-%m', order_date) = strftime('%Y-%m', 'now')
               AND status != 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(money::from_db(revenue))
    }

    /// Store a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_snapshot(
        &self,
        snapshot: &NewProfitSnapshot,
    ) -> Result<ProfitSnapshot, RepositoryError> {
        let row = sqlx::query_as::<_, SnapshotRow>(&format!(
            "INSERT INTO profit_analysis
                (period_start, period_end, total_revenue, total_cogs, total_fixed_costs,
                 total_ad_spend, gross_profit, net_profit, gross_margin, net_margin,
                 orders_count, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {SNAPSHOT_COLUMNS}"
        ))
        .bind(snapshot.period_start)
        .bind(snapshot.period_end)
        .bind(money::to_db(snapshot.total_revenue))
        .bind(money::to_db(snapshot.total_cogs))
        .bind(money::to_db(snapshot.total_fixed_costs))
        .bind(money::to_db(snapshot.total_ad_spend))
        .bind(money::to_db(snapshot.gross_profit))
        .bind(money::to_db(snapshot.net_profit))
        .bind(money::to_db(snapshot.gross_margin))
        .bind(money::to_db(snapshot.net_margin))
        .bind(snapshot.orders_count)
        .bind(snapshot.created_by)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Stored snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_snapshots(&self) -> Result<Vec<ProfitSnapshot>, RepositoryError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM profit_analysis ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
