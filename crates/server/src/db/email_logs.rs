//! Outbound email log.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use webshop_crm_core::{CustomerId, EmailLogId};

use super::{RepositoryError, parse_column};
use crate::models::{EmailLog, NewEmailLog};

const EMAIL_LOG_COLUMNS: &str =
    "id, customer_id, recipient_email, subject, template, status, error_message, sent_at";

#[derive(Debug, sqlx::FromRow)]
struct EmailLogRow {
    id: i64,
    customer_id: Option<i64>,
    recipient_email: String,
    subject: String,
    template: String,
    status: String,
    error_message: Option<String>,
    sent_at: NaiveDateTime,
}

impl TryFrom<EmailLogRow> for EmailLog {
    type Error = RepositoryError;

    fn try_from(row: EmailLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EmailLogId::new(row.id),
            customer_id: row.customer_id.map(CustomerId::new),
            recipient_email: row.recipient_email,
            subject: row.subject,
            template: row.template,
            status: parse_column(&row.status)?,
            error_message: row.error_message,
            sent_at: row.sent_at.and_utc(),
        })
    }
}

/// Counts used by the email statistics endpoint.
#[derive(Debug, Clone)]
pub struct EmailCounts {
    pub by_status: Vec<(String, i64)>,
    pub by_template: Vec<(String, i64)>,
    pub last_30_days: i64,
}

pub struct EmailLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EmailLogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an email attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, log: &NewEmailLog) -> Result<EmailLog, RepositoryError> {
        let row = sqlx::query_as::<_, EmailLogRow>(&format!(
            "INSERT INTO email_logs
                (customer_id, recipient_email, subject, template, status, error_message)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {EMAIL_LOG_COLUMNS}"
        ))
        .bind(log.customer_id)
        .bind(&log.recipient_email)
        .bind(&log.subject)
        .bind(&log.template)
        .bind(log.status)
        .bind(&log.error_message)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Emails sent to one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<EmailLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmailLogRow>(&format!(
            "SELECT {EMAIL_LOG_COLUMNS} FROM email_logs
             WHERE customer_id = ? ORDER BY sent_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Totals by status and template, and the 30-day volume.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn counts(&self) -> Result<EmailCounts, RepositoryError> {
        let by_status = sqlx::query_as(
            "SELECT status, COUNT(*) FROM email_logs GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let by_template = sqlx::query_as(
            "SELECT template, COUNT(*) AS n FROM email_logs GROUP BY template ORDER BY n DESC",
        )
        .fetch_all(self.pool)
        .await?;

        let last_30_days = sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_logs WHERE sent_at >= datetime('now', '-30 days')",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(EmailCounts {
            by_status,
            by_template,
            last_30_days,
        })
    }
}
