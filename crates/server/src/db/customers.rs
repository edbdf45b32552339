//! Customer and interaction repository.

use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use webshop_crm_core::{CustomerId, Email, InteractionId, WebshopId, money};

use super::{RepositoryError, conflict_on_unique, parse_column, push_set};
use crate::models::{
    Customer, CustomerCredentials, CustomerFilter, CustomerUpdate, Interaction, NewCustomer,
    NewInteraction, PageRequest,
};

const DUPLICATE_EMAIL: &str = "Customer with this email already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

const CUSTOMER_COLUMNS: &str = "id, webshop_id, email, first_name, last_name, phone, address, \
     city, postal_code, country, date_created, last_order_date, total_orders, total_spent, \
     customer_status, tags, notes, is_verified, last_login";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    webshop_id: Option<i64>,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: String,
    date_created: NaiveDateTime,
    last_order_date: Option<NaiveDateTime>,
    total_orders: i64,
    total_spent: f64,
    customer_status: String,
    tags: Option<String>,
    notes: Option<String>,
    is_verified: bool,
    last_login: Option<NaiveDateTime>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid customer email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            webshop_id: row.webshop_id.map(WebshopId::new),
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            address: row.address,
            city: row.city,
            postal_code: row.postal_code,
            country: row.country,
            date_created: row.date_created.and_utc(),
            last_order_date: row.last_order_date.map(|t| t.and_utc()),
            total_orders: row.total_orders,
            total_spent: money::from_db(row.total_spent),
            customer_status: parse_column(&row.customer_status)?,
            tags: row.tags,
            notes: row.notes,
            is_verified: row.is_verified,
            last_login: row.last_login.map(|t| t.and_utc()),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    password_hash: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct InteractionRow {
    id: i64,
    customer_id: i64,
    interaction_type: String,
    subject: String,
    description: Option<String>,
    created_by: String,
    created_at: NaiveDateTime,
}

impl TryFrom<InteractionRow> for Interaction {
    type Error = RepositoryError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: InteractionId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            interaction_type: parse_column(&row.interaction_type)?,
            subject: row.subject,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at.and_utc(),
        })
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a CustomerFilter) {
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND customer_status = ").push_bind(status);
    }
    if let Some(webshop_id) = filter.webshop_id {
        qb.push(" AND webshop_id = ").push_bind(webshop_id);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List customers matching `filter`, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE 1 = 1"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY date_created DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build_query_as::<CustomerRow>()
            .fetch_all(self.pool)
            .await?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers WHERE 1 = 1");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let customers = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total))
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find portal credentials by email (oldest account first when the same
    /// address exists in several webshops).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<CustomerCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS}, password_hash FROM customers
             WHERE email = ? ORDER BY id LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| -> Result<CustomerCredentials, RepositoryError> {
            Ok(CustomerCredentials {
                customer: r.customer.try_into()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    /// Create a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists in the webshop.
    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer, RepositoryError> {
        self.insert(customer, None).await
    }

    /// Create a customer with a portal password (unverified).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists in the webshop.
    pub async fn create_with_password(
        &self,
        customer: &NewCustomer,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        self.insert(customer, Some(password_hash)).await
    }

    async fn insert(
        &self,
        customer: &NewCustomer,
        password_hash: Option<&str>,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "INSERT INTO customers
                (webshop_id, email, first_name, last_name, phone, address, city,
                 postal_code, country, tags, notes, password_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(customer.webshop_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.postal_code)
        .bind(&customer.country)
        .bind(&customer.tags)
        .bind(&customer.notes)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist, or
    /// `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE customers SET updated_at = CURRENT_TIMESTAMP");
        push_set(&mut qb, "email", update.email);
        push_set(&mut qb, "first_name", update.first_name);
        push_set(&mut qb, "last_name", update.last_name);
        push_set(&mut qb, "phone", update.phone);
        push_set(&mut qb, "address", update.address);
        push_set(&mut qb, "city", update.city);
        push_set(&mut qb, "postal_code", update.postal_code);
        push_set(&mut qb, "country", update.country);
        push_set(&mut qb, "customer_status", update.customer_status);
        push_set(&mut qb, "notes", update.notes);
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {CUSTOMER_COLUMNS}"));

        let row = qb
            .build_query_as::<CustomerRow>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a customer and (by cascade) their interactions and orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn delete(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the portal password of an existing customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn set_password(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE customers SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a customer's email as verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn mark_verified(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE customers SET is_verified = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a portal login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch_last_login(&self, id: CustomerId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE customers SET last_login = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// List a customer's interactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_interactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Interaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            "SELECT id, customer_id, interaction_type, subject, description, created_by, created_at
             FROM customer_interactions
             WHERE customer_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Log an interaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn add_interaction(
        &self,
        interaction: &NewInteraction,
    ) -> Result<Interaction, RepositoryError> {
        let row = sqlx::query_as::<_, InteractionRow>(
            "INSERT INTO customer_interactions
                (customer_id, interaction_type, subject, description, created_by)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, customer_id, interaction_type, subject, description, created_by, created_at",
        )
        .bind(interaction.customer_id)
        .bind(interaction.interaction_type)
        .bind(&interaction.subject)
        .bind(&interaction.description)
        .bind(&interaction.created_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }
}
