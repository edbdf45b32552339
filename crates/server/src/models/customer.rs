//! Customer and interaction domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{
    CustomerId, CustomerStatus, Email, InteractionId, InteractionType, WebshopId,
};

/// A CRM customer.
///
/// `total_orders`, `total_spent` and `last_order_date` are maintained by
/// order creation, never written directly by the customer API.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub webshop_id: Option<WebshopId>,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub date_created: DateTime<Utc>,
    pub last_order_date: Option<DateTime<Utc>>,
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub customer_status: CustomerStatus,
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl Customer {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Portal login credentials for a customer.
#[derive(Debug, Clone)]
pub struct CustomerCredentials {
    pub customer: Customer,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub webshop_id: Option<WebshopId>,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub customer_status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

impl CustomerUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
            && self.customer_status.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub webshop_id: Option<WebshopId>,
}

/// A logged contact with a customer.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub customer_id: CustomerId,
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub customer_id: CustomerId,
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: Option<String>,
    pub created_by: String,
}
