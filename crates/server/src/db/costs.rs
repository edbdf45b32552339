//! Fixed cost repository.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{FixedCostId, money};

use super::{RepositoryError, parse_column, push_set};
use crate::models::{FixedCost, FixedCostUpdate, NewFixedCost};

const COST_COLUMNS: &str = "id, name, description, category, amount, billing_cycle, start_date, \
     end_date, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct FixedCostRow {
    id: i64,
    name: String,
    description: Option<String>,
    category: String,
    amount: f64,
    billing_cycle: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<FixedCostRow> for FixedCost {
    type Error = RepositoryError;

    fn try_from(row: FixedCostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FixedCostId::new(row.id),
            name: row.name,
            description: row.description,
            category: row.category,
            amount: money::from_db(row.amount),
            billing_cycle: parse_column(&row.billing_cycle)?,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            created_at: row.created_at.and_utc(),
        })
    }
}

fn collect(rows: Vec<FixedCostRow>) -> Result<Vec<FixedCost>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Repository for fixed (recurring) business costs.
pub struct FixedCostRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FixedCostRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List costs, optionally filtered by category and active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Vec<FixedCost>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COST_COLUMNS} FROM fixed_costs WHERE 1 = 1"
        ));
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(is_active) = is_active {
            qb.push(" AND is_active = ").push_bind(is_active);
        }
        qb.push(" ORDER BY category, name");

        collect(qb.build_query_as().fetch_all(self.pool).await?)
    }

    /// Active costs, used by summaries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<FixedCost>, RepositoryError> {
        self.list(None, Some(true)).await
    }

    /// Active costs running at some point within `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FixedCost>, RepositoryError> {
        let rows = sqlx::query_as::<_, FixedCostRow>(&format!(
            "SELECT {COST_COLUMNS} FROM fixed_costs
             WHERE is_active = 1
               AND start_date <= ?
               AND (end_date IS NULL OR end_date >= ?)
             ORDER BY category, name"
        ))
        .bind(end)
        .bind(start)
        .fetch_all(self.pool)
        .await?;

        collect(rows)
    }

    /// Get a cost by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: FixedCostId) -> Result<Option<FixedCost>, RepositoryError> {
        let row = sqlx::query_as::<_, FixedCostRow>(&format!(
            "SELECT {COST_COLUMNS} FROM fixed_costs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a cost.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, cost: &NewFixedCost) -> Result<FixedCost, RepositoryError> {
        let row = sqlx::query_as::<_, FixedCostRow>(&format!(
            "INSERT INTO fixed_costs
                (name, description, category, amount, billing_cycle, start_date, end_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {COST_COLUMNS}"
        ))
        .bind(&cost.name)
        .bind(&cost.description)
        .bind(&cost.category)
        .bind(money::to_db(cost.amount))
        .bind(cost.billing_cycle)
        .bind(cost.start_date)
        .bind(cost.end_date)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cost does not exist.
    pub async fn update(
        &self,
        id: FixedCostId,
        update: FixedCostUpdate,
    ) -> Result<FixedCost, RepositoryError> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("UPDATE fixed_costs SET updated_at = CURRENT_TIMESTAMP");
        push_set(&mut qb, "name", update.name);
        push_set(&mut qb, "description", update.description);
        push_set(&mut qb, "category", update.category);
        push_set(&mut qb, "amount", update.amount.map(money::to_db));
        push_set(&mut qb, "billing_cycle", update.billing_cycle);
        push_set(&mut qb, "start_date", update.start_date);
        push_set(&mut qb, "end_date", update.end_date);
        push_set(&mut qb, "is_active", update.is_active);
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {COST_COLUMNS}"));

        let row = qb
            .build_query_as::<FixedCostRow>()
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cost does not exist.
    pub async fn deactivate(&self, id: FixedCostId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE fixed_costs SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Categories of active costs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories_in_use(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT DISTINCT category FROM fixed_costs WHERE is_active = 1 ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// Whether a cost with this name and category exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, name: &str, category: &str) -> Result<bool, RepositoryError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM fixed_costs WHERE name = ? AND category = ?")
                .bind(name)
                .bind(category)
                .fetch_optional(self.pool)
                .await?;
        Ok(found.is_some())
    }
}
