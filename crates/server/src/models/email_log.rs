use chrono::{DateTime, Utc};
use serde::Serialize;

use webshop_crm_core::{CustomerId, EmailLogId, EmailStatus};

/// One outbound email attempt.
#[derive(Debug, Clone, Serialize)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub customer_id: Option<CustomerId>,
    pub recipient_email: String,
    pub subject: String,
    pub template: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub customer_id: Option<CustomerId>,
    pub recipient_email: String,
    pub subject: String,
    pub template: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
}
