use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{OrderId, TrackingId};

/// A carrier label created for an order.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRecord {
    pub id: TrackingId,
    pub order_id: OrderId,
    pub carrier: String,
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub shipment_id: Option<String>,
    pub status: String,
    pub estimated_delivery: Option<NaiveDate>,
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShipmentRecord {
    pub order_id: OrderId,
    pub carrier: String,
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub shipment_id: Option<String>,
    pub estimated_delivery: Option<NaiveDate>,
    pub cost: Decimal,
}
