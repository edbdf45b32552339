//! Order repository.
//!
//! Order creation runs in a single transaction that also rolls the order into
//! the customer's lifetime totals.

use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{CustomerId, OrderId, OrderItemId, OrderStatus, WebshopId, money};

use super::{RepositoryError, conflict_on_unique, days_ago, parse_column};
use crate::models::{
    CustomerOrderStats, FavouriteProduct, MonthlySpend, NewOrder, Order, OrderFilter, OrderItem,
    OrderSummary, OrderTotals, PageRequest, PortalOrder, StatusBreakdown,
};

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "o.id, o.customer_id, o.webshop_id, o.order_number, o.order_date, \
     o.total_amount, o.currency, o.status, o.payment_method, o.shipping_address, \
     o.tracking_number, o.notes, o.created_at";

const ITEM_COUNT: &str =
    "(SELECT COUNT(*) FROM order_items oi WHERE oi.order_id = o.id) AS item_count";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    webshop_id: Option<i64>,
    order_number: String,
    order_date: NaiveDateTime,
    total_amount: f64,
    currency: String,
    status: String,
    payment_method: Option<String>,
    shipping_address: Option<String>,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            webshop_id: row.webshop_id.map(WebshopId::new),
            order_number: row.order_number,
            order_date: row.order_date.and_utc(),
            total_amount: money::from_db(row.total_amount),
            currency: row.currency,
            status: parse_column(&row.status)?,
            payment_method: row.payment_method,
            shipping_address: row.shipping_address,
            tracking_number: row.tracking_number,
            notes: row.notes,
            created_at: row.created_at.and_utc(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    #[sqlx(flatten)]
    order: OrderRow,
    first_name: String,
    last_name: String,
    email: String,
    item_count: i64,
}

impl TryFrom<OrderSummaryRow> for OrderSummary {
    type Error = RepositoryError;

    fn try_from(row: OrderSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            order: row.order.try_into()?,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            item_count: row.item_count,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PortalOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    item_count: i64,
    items_summary: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_name: String,
    product_sku: Option<String>,
    quantity: i64,
    unit_price: f64,
    total_price: f64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_name: row.product_name,
            product_sku: row.product_sku,
            quantity: row.quantity,
            unit_price: money::from_db(row.unit_price),
            total_price: money::from_db(row.total_price),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    status: String,
    count: i64,
    revenue: f64,
}

fn summary_select() -> String {
    format!(
        "SELECT {ORDER_COLUMNS}, c.first_name, c.last_name, c.email, {ITEM_COUNT}
         FROM orders o
         JOIN customers c ON c.id = o.customer_id"
    )
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a OrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND o.customer_id = ").push_bind(customer_id);
    }
}

fn collect_summaries(rows: Vec<OrderSummaryRow>) -> Result<Vec<OrderSummary>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List orders with customer details, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(summary_select());
        qb.push(" WHERE 1 = 1");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY o.order_date DESC, o.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build_query_as::<OrderSummaryRow>()
            .fetch_all(self.pool)
            .await?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders o WHERE 1 = 1");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        Ok((collect_summaries(rows)?, total))
    }

    /// Every order of one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{} WHERE o.customer_id = ? ORDER BY o.order_date DESC, o.id DESC",
            summary_select()
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        collect_summaries(rows)
    }

    /// The most recent orders across all customers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{} ORDER BY o.order_date DESC, o.id DESC LIMIT ?",
            summary_select()
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        collect_summaries(rows)
    }

    /// Get an order with its customer details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderSummary>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{} WHERE o.id = ?",
            summary_select()
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Line items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_name, product_sku, quantity, unit_price, total_price
             FROM order_items WHERE order_id = ? ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create an order with its items and update the customer's totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist, or
    /// `RepositoryError::Conflict` if the order number is taken.
    pub async fn create(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let customer_exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM customers WHERE id = ?")
                .bind(order.customer_id)
                .fetch_optional(&mut *tx)
                .await?;
        if customer_exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders
                (customer_id, webshop_id, order_number, order_date, total_amount, currency,
                 payment_method, shipping_address, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(order.customer_id)
        .bind(order.webshop_id)
        .bind(&order.order_number)
        .bind(order.order_date)
        .bind(money::to_db(order.total_amount))
        .bind(&order.currency)
        .bind(&order.payment_method)
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Order number already exists"))?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items
                    (order_id, product_name, product_sku, quantity, unit_price, total_price)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(item.quantity)
            .bind(money::to_db(item.unit_price))
            .bind(money::to_db(item.total_price))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE customers
             SET total_orders = total_orders + 1,
                 total_spent = total_spent + ?,
                 last_order_date = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(money::to_db(order.total_amount))
        .bind(order.order_date)
        .bind(order.customer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(OrderId::new(order_id))
    }

    /// Set the status, and the tracking number when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = ?,
                 tracking_number = COALESCE(?, tracking_number),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(status)
        .bind(tracking_number)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Totals and per-status breakdown of orders placed in the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(
        &self,
        days: i64,
    ) -> Result<(OrderTotals, Vec<StatusBreakdown>), RepositoryError> {
        let (total_orders, total_revenue, avg): (i64, f64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_amount), 0.0), COALESCE(AVG(total_amount), 0.0)
             FROM orders WHERE order_date >= datetime('now', ?)",
        )
        .bind(days_ago(days))
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, StatusRow>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(total_amount), 0.0) AS revenue
             FROM orders WHERE order_date >= datetime('now', ?)
             GROUP BY status ORDER BY count DESC",
        )
        .bind(days_ago(days))
        .fetch_all(self.pool)
        .await?;

        let totals = OrderTotals {
            total_orders,
            total_revenue: money::from_db(total_revenue),
            avg_order_value: money::from_db(avg),
        };
        let by_status = rows
            .into_iter()
            .map(|r| StatusBreakdown {
                status: r.status,
                count: r.count,
                revenue: money::from_db(r.revenue),
            })
            .collect();
        Ok((totals, by_status))
    }

    // =========================================================================
    // Customer portal
    // =========================================================================

    /// A customer's own orders with item summaries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_portal(
        &self,
        customer_id: CustomerId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<PortalOrder>, i64), RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ORDER_COLUMNS}, {ITEM_COUNT},
                (SELECT GROUP_CONCAT(oi.product_name || ' (x' || oi.quantity || ')', ', ')
                 FROM order_items oi WHERE oi.order_id = o.id) AS items_summary
             FROM orders o WHERE o.customer_id = "
        ));
        qb.push_bind(customer_id);
        if let Some(status) = status {
            qb.push(" AND o.status = ").push_bind(status);
        }
        qb.push(" ORDER BY o.order_date DESC, o.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build_query_as::<PortalOrderRow>()
            .fetch_all(self.pool)
            .await?;

        let mut count_qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders o WHERE o.customer_id = ");
        count_qb.push_bind(customer_id);
        if let Some(status) = status {
            count_qb.push(" AND o.status = ").push_bind(status);
        }
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let orders = rows
            .into_iter()
            .map(|r| -> Result<PortalOrder, RepositoryError> {
                Ok(PortalOrder {
                    order: r.order.try_into()?,
                    item_count: r.item_count,
                    items_summary: r.items_summary,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total))
    }

    /// Get an order only if it belongs to `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_customer(
        &self,
        id: OrderId,
        customer_id: CustomerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ? AND o.customer_id = ?"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Lifetime figures of a customer's non-cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_stats(
        &self,
        customer_id: CustomerId,
    ) -> Result<CustomerOrderStats, RepositoryError> {
        let (total_orders, total_spent, avg, first, last): (
            i64,
            f64,
            f64,
            Option<NaiveDateTime>,
            Option<NaiveDateTime>,
        ) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_amount), 0.0), COALESCE(AVG(total_amount), 0.0),
                    MIN(order_date), MAX(order_date)
             FROM orders WHERE customer_id = ? AND status != 'cancelled'",
        )
        .bind(customer_id)
        .fetch_one(self.pool)
        .await?;

        Ok(CustomerOrderStats {
            total_orders,
            total_spent: money::from_db(total_spent),
            avg_order_value: money::from_db(avg),
            first_order_date: first.map(|t| t.and_utc()),
            last_order_date: last.map(|t| t.and_utc()),
        })
    }

    /// Orders and spend per month over the last 12 months.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_monthly_history(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<MonthlySpend>, RepositoryError> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT strftime('%Y-%m', order_date) AS month, COUNT(*), COALESCE(SUM(total_amount), 0.0)
             FROM orders
             WHERE customer_id = ? AND status != 'cancelled'
               AND order_date >= datetime('now', '-12 months')
             GROUP BY month ORDER BY month",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, orders, spent)| MonthlySpend {
                month,
                orders,
                spent: money::from_db(spent),
            })
            .collect())
    }

    /// The products a customer bought most, by quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_favourite_products(
        &self,
        customer_id: CustomerId,
        limit: i64,
    ) -> Result<Vec<FavouriteProduct>, RepositoryError> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT oi.product_name, SUM(oi.quantity) AS qty, SUM(oi.total_price)
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE o.customer_id = ? AND o.status != 'cancelled'
             GROUP BY oi.product_name
             ORDER BY qty DESC
             LIMIT ?",
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_name, total_quantity, spent)| FavouriteProduct {
                product_name,
                total_quantity,
                total_spent: money::from_db(spent),
            })
            .collect())
    }
}
