//! Carrier shipment records.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;

use webshop_crm_core::{OrderId, TrackingId, money};

use super::RepositoryError;
use crate::models::{NewShipmentRecord, ShipmentRecord};

const TRACKING_COLUMNS: &str = "id, order_id, carrier, tracking_number, label_url, shipment_id, \
     status, estimated_delivery, cost, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: i64,
    order_id: i64,
    carrier: String,
    tracking_number: String,
    label_url: Option<String>,
    shipment_id: Option<String>,
    status: String,
    estimated_delivery: Option<NaiveDate>,
    cost: f64,
    created_at: NaiveDateTime,
}

impl From<ShipmentRow> for ShipmentRecord {
    fn from(row: ShipmentRow) -> Self {
        Self {
            id: TrackingId::new(row.id),
            order_id: OrderId::new(row.order_id),
            carrier: row.carrier,
            tracking_number: row.tracking_number,
            label_url: row.label_url,
            shipment_id: row.shipment_id,
            status: row.status,
            estimated_delivery: row.estimated_delivery,
            cost: money::from_db(row.cost),
            created_at: row.created_at.and_utc(),
        }
    }
}

pub struct TrackingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TrackingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a created label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        record: &NewShipmentRecord,
    ) -> Result<ShipmentRecord, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "INSERT INTO shipping_tracking
                (order_id, carrier, tracking_number, label_url, shipment_id, estimated_delivery, cost)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {TRACKING_COLUMNS}"
        ))
        .bind(record.order_id)
        .bind(&record.carrier)
        .bind(&record.tracking_number)
        .bind(&record.label_url)
        .bind(&record.shipment_id)
        .bind(record.estimated_delivery)
        .bind(money::to_db(record.cost))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Shipments of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<ShipmentRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {TRACKING_COLUMNS} FROM shipping_tracking
             WHERE order_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
