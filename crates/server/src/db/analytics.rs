//! Read-only reporting queries: dashboard, sales, customer and retention
//! analytics, and the inputs of the rule-based insights.

use sqlx::SqlitePool;

use webshop_crm_core::{CustomerId, ProductId, money};

use super::{RepositoryError, days_ago};
use crate::models::{
    BusinessMetrics, CityStat, CustomerSegment, DashboardCounts, MonthlyAcquisition,
    ProductSales, ProductSalesWindow, RepeatBehaviour, RepeatRate, SalesInterval, SalesPoint,
    StatusBreakdown, StatusCount, TopCustomer,
};

#[derive(Debug, sqlx::FromRow)]
struct SegmentRow {
    segment: String,
    customers: i64,
    avg_spent: f64,
    total_revenue: f64,
}

impl From<SegmentRow> for CustomerSegment {
    fn from(row: SegmentRow) -> Self {
        Self {
            segment: row.segment,
            customers: row.customers,
            avg_spent: money::from_db(row.avg_spent),
            total_revenue: money::from_db(row.total_revenue),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SalesWindowRow {
    id: i64,
    name: String,
    sku: Option<String>,
    category: Option<String>,
    purchase_price: f64,
    selling_price: f64,
    stock_quantity: i64,
    quantity_sold: i64,
    revenue: f64,
    orders_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BusinessMetricsRow {
    monthly_revenue: f64,
    previous_month_revenue: f64,
    new_customers_month: i64,
    repeat_customers: i64,
    active_customers: i64,
    monthly_orders: i64,
    avg_order_value: f64,
    monthly_fixed_costs: f64,
}

pub struct AnalyticsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Headline counters. Revenue figures exclude cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dashboard_counts(&self) -> Result<DashboardCounts, RepositoryError> {
        let (
            total_customers,
            new_customers_this_month,
            total_orders,
            orders_this_month,
            total_revenue,
            revenue_this_month,
            avg_order_value,
        ): (i64, i64, i64, i64, f64, f64, f64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM customers),
                (SELECT COUNT(*) FROM customers WHERE date_created >= date('now', 'start of month')),
                (SELECT COUNT(*) FROM orders),
                (SELECT COUNT(*) FROM orders WHERE order_date >= date('now', 'start of month')),
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM orders WHERE status != 'cancelled'),
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM orders
                 WHERE order_date >= date('now', 'start of month') AND status != 'cancelled'),
                (SELECT COALESCE(AVG(total_amount), 0.0) FROM orders WHERE status != 'cancelled')",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardCounts {
            total_customers,
            new_customers_this_month,
            total_orders,
            orders_this_month,
            total_revenue: money::from_db(total_revenue),
            revenue_this_month: money::from_db(revenue_this_month),
            avg_order_value: money::from_db(avg_order_value),
        })
    }

    /// Customers with the highest lifetime spend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_customers(&self, limit: i64) -> Result<Vec<TopCustomer>, RepositoryError> {
        let rows: Vec<(i64, String, String, String, f64, i64)> = sqlx::query_as(
            "SELECT id, first_name, last_name, email, total_spent, total_orders
             FROM customers WHERE total_spent > 0
             ORDER BY total_spent DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, first_name, last_name, email, spent, total_orders)| TopCustomer {
                    id: CustomerId::new(id),
                    first_name,
                    last_name,
                    email,
                    total_spent: money::from_db(spent),
                    total_orders,
                },
            )
            .collect())
    }

    /// Order count and revenue per status over all time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_distribution(&self) -> Result<Vec<StatusBreakdown>, RepositoryError> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT status, COUNT(*) AS n, COALESCE(SUM(total_amount), 0.0)
             FROM orders GROUP BY status ORDER BY n DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count, revenue)| StatusBreakdown {
                status,
                count,
                revenue: money::from_db(revenue),
            })
            .collect())
    }

    /// Non-cancelled orders of the last `days` days bucketed by `interval`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_over_time(
        &self,
        days: i64,
        interval: SalesInterval,
    ) -> Result<Vec<SalesPoint>, RepositoryError> {
        let rows: Vec<(String, i64, f64, f64)> = sqlx::query_as(
            "SELECT strftime(?, order_date) AS period, COUNT(*),
                    COALESCE(SUM(total_amount), 0.0), COALESCE(AVG(total_amount), 0.0)
             FROM orders
             WHERE order_date >= datetime('now', ?) AND status != 'cancelled'
             GROUP BY period ORDER BY period",
        )
        .bind(interval.strftime())
        .bind(days_ago(days))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(period, orders, revenue, avg)| SalesPoint {
                period,
                orders,
                revenue: money::from_db(revenue),
                avg_order_value: money::from_db(avg),
            })
            .collect())
    }

    /// Customer count per status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customers_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT customer_status, COUNT(*) AS n FROM customers
             GROUP BY customer_status ORDER BY n DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }

    /// New customers per month over the last 12 months.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_acquisition(&self) -> Result<Vec<MonthlyAcquisition>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT strftime('%Y-%m', date_created) AS month, COUNT(*)
             FROM customers
             WHERE date_created >= date('now', '-12 months')
             GROUP BY month ORDER BY month",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, new_customers)| MonthlyAcquisition {
                month,
                new_customers,
            })
            .collect())
    }

    /// Customers bucketed by lifetime spend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lifetime_value_segments(&self) -> Result<Vec<CustomerSegment>, RepositoryError> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            "SELECT
                CASE
                    WHEN total_spent = 0 THEN 'No purchases'
                    WHEN total_spent < 100 THEN '€0 - €100'
                    WHEN total_spent < 250 THEN '€100 - €250'
                    WHEN total_spent < 500 THEN '€250 - €500'
                    WHEN total_spent < 1000 THEN '€500 - €1000'
                    ELSE '€1000+'
                END AS segment,
                MIN(CASE
                    WHEN total_spent = 0 THEN 0
                    WHEN total_spent < 100 THEN 1
                    WHEN total_spent < 250 THEN 2
                    WHEN total_spent < 500 THEN 3
                    WHEN total_spent < 1000 THEN 4
                    ELSE 5
                END) AS rank,
                COUNT(*) AS customers,
                COALESCE(AVG(total_spent), 0.0) AS avg_spent,
                COALESCE(SUM(total_spent), 0.0) AS total_revenue
             FROM customers
             GROUP BY segment
             ORDER BY rank",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cities with the most customers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_cities(&self, limit: i64) -> Result<Vec<CityStat>, RepositoryError> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT city, COUNT(*) AS customers, COALESCE(SUM(total_spent), 0.0)
             FROM customers
             WHERE city IS NOT NULL AND city != ''
             GROUP BY city ORDER BY customers DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(city, customers, revenue)| CityStat {
                city,
                customers,
                revenue: money::from_db(revenue),
            })
            .collect())
    }

    /// Best-selling order lines of the last `days` days, by revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        days: i64,
        limit: i64,
    ) -> Result<Vec<ProductSales>, RepositoryError> {
        let rows: Vec<(String, Option<String>, i64, i64, f64, f64)> = sqlx::query_as(
            "SELECT oi.product_name, oi.product_sku, COUNT(*), SUM(oi.quantity),
                    COALESCE(SUM(oi.total_price), 0.0) AS revenue, COALESCE(AVG(oi.unit_price), 0.0)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE o.order_date >= datetime('now', ?) AND o.status != 'cancelled'
             GROUP BY oi.product_name, oi.product_sku
             ORDER BY revenue DESC
             LIMIT ?",
        )
        .bind(days_ago(days))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(product_name, product_sku, times_ordered, total_quantity, revenue, avg)| {
                    ProductSales {
                        product_name,
                        product_sku,
                        times_ordered,
                        total_quantity,
                        total_revenue: money::from_db(revenue),
                        avg_price: money::from_db(avg),
                    }
                },
            )
            .collect())
    }

    /// Customers who ordered, bucketed by order count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn retention_segments(&self) -> Result<Vec<CustomerSegment>, RepositoryError> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            "SELECT
                CASE
                    WHEN total_orders = 1 THEN 'One-time customer'
                    WHEN total_orders = 2 THEN '2 orders'
                    WHEN total_orders <= 5 THEN '3-5 orders'
                    WHEN total_orders <= 10 THEN '6-10 orders'
                    ELSE '10+ orders'
                END AS segment,
                MIN(CASE
                    WHEN total_orders = 1 THEN 1
                    WHEN total_orders = 2 THEN 2
                    WHEN total_orders <= 5 THEN 3
                    WHEN total_orders <= 10 THEN 4
                    ELSE 5
                END) AS rank,
                COUNT(*) AS customers,
                COALESCE(AVG(total_spent), 0.0) AS avg_spent,
                COALESCE(SUM(total_spent), 0.0) AS total_revenue
             FROM customers
             WHERE total_orders > 0
             GROUP BY segment
             ORDER BY rank",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// One-time versus repeat buyers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn repeat_behaviour(&self) -> Result<RepeatBehaviour, RepositoryError> {
        let (one_time_customers, repeat_customers): (i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(CASE WHEN total_orders = 1 THEN 1 END),
                COUNT(CASE WHEN total_orders > 1 THEN 1 END)
             FROM customers WHERE total_orders > 0",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(RepeatBehaviour {
            one_time_customers,
            repeat_customers,
        })
    }

    /// Share of ordering customers who ordered more than once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn repeat_rate(&self) -> Result<RepeatRate, RepositoryError> {
        let behaviour = self.repeat_behaviour().await?;
        let total_customers = behaviour.one_time_customers + behaviour.repeat_customers;

        Ok(RepeatRate {
            repeat_customers: behaviour.repeat_customers,
            total_customers,
            repeat_rate: money::percentage(
                money::from_count(behaviour.repeat_customers),
                money::from_count(total_customers),
            ),
        })
    }

    // =========================================================================
    // Insight inputs
    // =========================================================================

    /// Active products with their non-cancelled sales over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_sales_window(
        &self,
        days: i64,
    ) -> Result<Vec<ProductSalesWindow>, RepositoryError> {
        let rows = sqlx::query_as::<_, SalesWindowRow>(
            "SELECT p.id, p.name, p.sku, p.category, p.purchase_price, p.selling_price,
                    p.stock_quantity,
                    COALESCE(s.quantity_sold, 0) AS quantity_sold,
                    COALESCE(s.revenue, 0.0) AS revenue,
                    COALESCE(s.orders_count, 0) AS orders_count
             FROM products p
             LEFT JOIN (
                SELECT oi.product_sku,
                       SUM(oi.quantity) AS quantity_sold,
                       SUM(oi.total_price) AS revenue,
                       COUNT(DISTINCT oi.order_id) AS orders_count
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                WHERE o.order_date >= datetime('now', ?) AND o.status != 'cancelled'
                GROUP BY oi.product_sku
             ) s ON s.product_sku = p.sku
             WHERE p.is_active = 1
             ORDER BY p.id",
        )
        .bind(days_ago(days))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProductSalesWindow {
                id: ProductId::new(r.id),
                name: r.name,
                sku: r.sku,
                category: r.category,
                purchase_price: money::from_db(r.purchase_price),
                selling_price: money::from_db(r.selling_price),
                stock_quantity: r.stock_quantity,
                quantity_sold: r.quantity_sold,
                revenue: money::from_db(r.revenue),
                orders_count: r.orders_count,
            })
            .collect())
    }

    /// Customers bucketed by spend for the insight rules: `none`, `low`,
    /// `medium`, `high`, `vip`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn value_segments(&self) -> Result<Vec<CustomerSegment>, RepositoryError> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            "SELECT
                CASE
                    WHEN total_spent = 0 THEN 'none'
                    WHEN total_spent < 100 THEN 'low'
                    WHEN total_spent < 500 THEN 'medium'
                    WHEN total_spent < 1000 THEN 'high'
                    ELSE 'vip'
                END AS segment,
                COUNT(*) AS customers,
                COALESCE(AVG(total_spent), 0.0) AS avg_spent,
                COALESCE(SUM(total_spent), 0.0) AS total_revenue
             FROM customers
             GROUP BY segment",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cities ranked by customer revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cities_by_revenue(&self, limit: i64) -> Result<Vec<CityStat>, RepositoryError> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT city, COUNT(*), COALESCE(SUM(total_spent), 0.0) AS revenue
             FROM customers
             WHERE city IS NOT NULL AND city != '' AND total_spent > 0
             GROUP BY city ORDER BY revenue DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(city, customers, revenue)| CityStat {
                city,
                customers,
                revenue: money::from_db(revenue),
            })
            .collect())
    }

    /// 30-day business metrics behind the health score.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn business_metrics(&self) -> Result<BusinessMetrics, RepositoryError> {
        let row = sqlx::query_as::<_, BusinessMetricsRow>(
            "SELECT
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM orders
                 WHERE order_date >= datetime('now', '-30 days') AND status != 'cancelled')
                    AS monthly_revenue,
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM orders
                 WHERE order_date >= datetime('now', '-60 days')
                   AND order_date < datetime('now', '-30 days')
                   AND status != 'cancelled')
                    AS previous_month_revenue,
                (SELECT COUNT(*) FROM customers WHERE date_created >= datetime('now', '-30 days'))
                    AS new_customers_month,
                (SELECT COUNT(*) FROM customers WHERE total_orders > 1) AS repeat_customers,
                (SELECT COUNT(*) FROM customers WHERE total_orders > 0) AS active_customers,
                (SELECT COUNT(*) FROM orders
                 WHERE order_date >= datetime('now', '-30 days') AND status != 'cancelled')
                    AS monthly_orders,
                (SELECT COALESCE(AVG(total_amount), 0.0) FROM orders
                 WHERE order_date >= datetime('now', '-30 days') AND status != 'cancelled')
                    AS avg_order_value,
                (SELECT COALESCE(SUM(amount), 0.0) FROM fixed_costs
                 WHERE is_active = 1 AND billing_cycle = 'monthly')
                    AS monthly_fixed_costs",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(BusinessMetrics {
            monthly_revenue: money::from_db(row.monthly_revenue),
            previous_month_revenue: money::from_db(row.previous_month_revenue),
            new_customers_month: row.new_customers_month,
            repeat_customers: row.repeat_customers,
            active_customers: row.active_customers,
            monthly_orders: row.monthly_orders,
            avg_order_value: money::from_db(row.avg_order_value),
            monthly_fixed_costs: money::from_db(row.monthly_fixed_costs),
        })
    }
}
