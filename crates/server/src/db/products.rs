//! Product catalogue repository.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{ProductId, WebshopId, money};

use super::{RepositoryError, conflict_on_unique, days_ago, push_set};
use crate::models::{
    CategoryCount, NewProduct, PackageSpec, PageRequest, Product, ProductFilter,
    ProductPerformance, ProductUpdate, SalesHistoryEntry, SalesStats,
};

const DUPLICATE_SKU: &str = "Product with this SKU already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

const PRODUCT_COLUMNS: &str = "id, webshop_id, sku, name, description, category, purchase_price, \
     selling_price, stock_quantity, weight_grams, length_cm, width_cm, height_cm, shipping_cost, \
     supplier, supplier_sku, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    webshop_id: Option<i64>,
    sku: Option<String>,
    name: String,
    description: Option<String>,
    category: Option<String>,
    purchase_price: f64,
    selling_price: f64,
    stock_quantity: i64,
    weight_grams: i64,
    length_cm: f64,
    width_cm: f64,
    height_cm: f64,
    shipping_cost: Option<f64>,
    supplier: Option<String>,
    supplier_sku: Option<String>,
    is_active: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            webshop_id: row.webshop_id.map(WebshopId::new),
            sku: row.sku,
            name: row.name,
            description: row.description,
            category: row.category,
            purchase_price: money::from_db(row.purchase_price),
            selling_price: money::from_db(row.selling_price),
            stock_quantity: row.stock_quantity,
            weight_grams: row.weight_grams,
            length_cm: row.length_cm,
            width_cm: row.width_cm,
            height_cm: row.height_cm,
            shipping_cost: row.shipping_cost.map(money::from_db),
            supplier: row.supplier,
            supplier_sku: row.supplier_sku,
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SalesHistoryRow {
    order_number: String,
    order_date: NaiveDateTime,
    status: String,
    quantity: i64,
    unit_price: f64,
    total_price: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct PerformanceRow {
    id: i64,
    name: String,
    sku: Option<String>,
    category: Option<String>,
    quantity_sold: i64,
    revenue: f64,
    cogs: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    sku: String,
    category: Option<String>,
    weight_grams: i64,
    length_cm: f64,
    width_cm: f64,
    height_cm: f64,
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ProductFilter) {
    qb.push(" WHERE is_active = ").push_bind(filter.is_active);
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(webshop_id) = filter.webshop_id {
        qb.push(" AND webshop_id = ").push_bind(webshop_id);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List products by name, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY name, id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken in the webshop.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products
                (webshop_id, sku, name, description, category, purchase_price, selling_price,
                 stock_quantity, weight_grams, length_cm, width_cm, height_cm, shipping_cost,
                 supplier, supplier_sku)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.webshop_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(money::to_db(product.purchase_price))
        .bind(money::to_db(product.selling_price))
        .bind(product.stock_quantity)
        .bind(product.weight_grams)
        .bind(product.length_cm)
        .bind(product.width_cm)
        .bind(product.height_cm)
        .bind(product.shipping_cost.map(money::to_db))
        .bind(&product.supplier)
        .bind(&product.supplier_sku)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_SKU))?;

        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = CURRENT_TIMESTAMP");
        push_set(&mut qb, "sku", update.sku);
        push_set(&mut qb, "name", update.name);
        push_set(&mut qb, "description", update.description);
        push_set(&mut qb, "category", update.category);
        push_set(&mut qb, "purchase_price", update.purchase_price.map(money::to_db));
        push_set(&mut qb, "selling_price", update.selling_price.map(money::to_db));
        push_set(&mut qb, "stock_quantity", update.stock_quantity);
        push_set(&mut qb, "weight_grams", update.weight_grams);
        push_set(&mut qb, "length_cm", update.length_cm);
        push_set(&mut qb, "width_cm", update.width_cm);
        push_set(&mut qb, "height_cm", update.height_cm);
        push_set(&mut qb, "shipping_cost", update.shipping_cost.map(money::to_db));
        push_set(&mut qb, "supplier", update.supplier);
        push_set(&mut qb, "supplier_sku", update.supplier_sku);
        push_set(&mut qb, "is_active", update.is_active);
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row = qb
            .build_query_as::<ProductRow>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_SKU))?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Soft delete: the product stays for order history but leaves the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Most recent order lines for a SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_history(
        &self,
        sku: &str,
        limit: i64,
    ) -> Result<Vec<SalesHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, SalesHistoryRow>(
            "SELECT o.order_number, o.order_date, o.status, oi.quantity, oi.unit_price, oi.total_price
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE oi.product_sku = ?
             ORDER BY o.order_date DESC, oi.id DESC
             LIMIT ?",
        )
        .bind(sku)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SalesHistoryEntry {
                order_number: r.order_number,
                order_date: r.order_date.and_utc(),
                status: r.status,
                quantity: r.quantity,
                unit_price: money::from_db(r.unit_price),
                total_price: money::from_db(r.total_price),
            })
            .collect())
    }

    /// Aggregate sales of a SKU, cancelled orders excluded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_stats(&self, sku: &str) -> Result<SalesStats, RepositoryError> {
        let (total_sold, total_revenue, order_count, avg_price): (i64, f64, i64, f64) =
            sqlx::query_as(
                "SELECT COALESCE(SUM(oi.quantity), 0),
                        COALESCE(SUM(oi.total_price), 0.0),
                        COUNT(DISTINCT oi.order_id),
                        COALESCE(AVG(oi.unit_price), 0.0)
                 FROM order_items oi
                 JOIN orders o ON o.id = oi.order_id
                 WHERE oi.product_sku = ? AND o.status != 'cancelled'",
            )
            .bind(sku)
            .fetch_one(self.pool)
            .await?;

        Ok(SalesStats {
            total_sold,
            total_revenue: money::from_db(total_revenue),
            order_count,
            avg_selling_price: money::from_db(avg_price),
        })
    }

    /// Distinct categories of active products with their product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM products
             WHERE is_active = 1 AND category IS NOT NULL AND category != ''
             GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, product_count)| CategoryCount {
                category,
                product_count,
            })
            .collect())
    }

    /// Per-product sales and profit over the last `days` days, most profitable first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn performance(&self, days: i64) -> Result<Vec<ProductPerformance>, RepositoryError> {
        let rows = sqlx::query_as::<_, PerformanceRow>(
            "SELECT p.id, p.name, p.sku, p.category,
                    COALESCE(SUM(oi.quantity), 0) AS quantity_sold,
                    COALESCE(SUM(oi.total_price), 0.0) AS revenue,
                    COALESCE(SUM(oi.quantity * p.purchase_price), 0.0) AS cogs
             FROM products p
             JOIN order_items oi ON oi.product_sku = p.sku
             JOIN orders o ON o.id = oi.order_id
             WHERE p.is_active = 1
               AND o.status != 'cancelled'
               AND o.order_date >= datetime('now', ?)
             GROUP BY p.id, p.name, p.sku, p.category
             ORDER BY (revenue - cogs) DESC",
        )
        .bind(days_ago(days))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let revenue = money::from_db(r.revenue);
                let cogs = money::from_db(r.cogs);
                let gross_profit = revenue - cogs;
                ProductPerformance {
                    id: ProductId::new(r.id),
                    name: r.name,
                    sku: r.sku,
                    category: r.category,
                    quantity_sold: r.quantity_sold,
                    revenue,
                    cogs,
                    gross_profit,
                    margin_percentage: money::percentage(gross_profit, revenue),
                }
            })
            .collect())
    }

    /// Set several purchase prices in one transaction. Returns how many rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any update fails; nothing is applied then.
    pub async fn bulk_update_purchase_prices(
        &self,
        updates: &[(ProductId, Decimal)],
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for (id, price) in updates {
            let result = sqlx::query(
                "UPDATE products SET purchase_price = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(money::to_db(*price))
            .bind(*id)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Package dimensions and category of the active products with the given SKUs.
    /// Unknown SKUs are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn package_specs(&self, skus: &[String]) -> Result<Vec<PackageSpec>, RepositoryError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT sku, category, weight_grams, length_cm, width_cm, height_cm
             FROM products WHERE is_active = 1 AND sku IN (",
        );
        let mut separated = qb.separated(", ");
        for sku in skus {
            separated.push_bind(sku);
        }
        separated.push_unseparated(")");

        let rows = qb
            .build_query_as::<PackageRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| PackageSpec {
                sku: r.sku,
                category: r.category,
                weight_grams: r.weight_grams,
                length_cm: r.length_cm,
                width_cm: r.width_cm,
                height_cm: r.height_cm,
            })
            .collect())
    }
}
