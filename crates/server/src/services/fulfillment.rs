//! Shipping labels and packing slips.
//!
//! Creating a label books a shipment with the carrier, stores the tracking
//! row, marks the order shipped and emails the customer. The email is best
//! effort: a failed send never fails the label.

use askama::Template;
use askama_web::WebTemplate;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sqlx::SqlitePool;

use webshop_crm_core::{OrderId, OrderStatus, money};

use crate::config::CompanyAddress;
use crate::db::{CustomerRepository, OrderRepository, TrackingRepository};
use crate::error::AppError;
use crate::models::{NewShipmentRecord, OrderItem, OrderSummary, ShipmentRecord};
use crate::services::carrier::{
    Carrier, Package, ShipmentRequest, TrackingInfo, parse_address,
};
use crate::services::email::{CustomerMailer, EmailService, EmailTemplate};

/// Flat shipping charge printed on packing slips.
pub const PACKING_SLIP_SHIPPING: Decimal = dec!(5.95);

/// VAT rate printed on packing slips.
pub const PACKING_SLIP_TAX_RATE: Decimal = dec!(0.21);

const TRACK_AND_TRACE_URL: &str =
    "https://www.dhl.nl/nl/particulier/pakketten-ontvangen/pakket-volgen.html?submit=1&tracking-id=";

#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub order_id: OrderId,
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub estimated_delivery: NaiveDate,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelCreated {
    pub order_id: OrderId,
    pub tracking_number: String,
    pub label_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelFailed {
    pub order_id: OrderId,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkLabels {
    pub successful: Vec<LabelCreated>,
    pub failed: Vec<LabelFailed>,
    pub total_processed: usize,
}

// =============================================================================
// Packing slips
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SlipCustomer {
    pub name: String,
    pub email: String,
    pub shipping_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlipItem {
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlipTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl SlipTotals {
    /// Subtotal plus flat shipping plus VAT over the subtotal.
    #[must_use]
    pub fn for_subtotal(subtotal: Decimal) -> Self {
        let tax_amount = money::round2(subtotal * PACKING_SLIP_TAX_RATE);
        Self {
            subtotal,
            shipping_cost: PACKING_SLIP_SHIPPING,
            tax_amount,
            total: subtotal + PACKING_SLIP_SHIPPING + tax_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackingSlip {
    pub order_id: OrderId,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub customer: SlipCustomer,
    pub items: Vec<SlipItem>,
    pub totals: SlipTotals,
    pub notes: String,
    pub generated_at: DateTime<Utc>,
}

impl PackingSlip {
    #[must_use]
    pub fn new(order: &OrderSummary, items: Vec<OrderItem>) -> Self {
        Self {
            order_id: order.order.id,
            order_number: order.order.order_number.clone(),
            order_date: order.order.order_date,
            customer: SlipCustomer {
                name: format!("{} {}", order.first_name, order.last_name),
                email: order.email.clone(),
                shipping_address: order.order.shipping_address.clone().unwrap_or_default(),
            },
            items: items
                .into_iter()
                .map(|item| SlipItem {
                    name: item.product_name,
                    sku: item.product_sku,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                })
                .collect(),
            totals: SlipTotals::for_subtotal(order.order.total_amount),
            notes: order.order.notes.clone().unwrap_or_default(),
            generated_at: Utc::now(),
        }
    }
}

/// Printable packing slip for one order.
#[derive(Template, WebTemplate)]
#[template(path = "fulfillment/packing_slip.html")]
pub struct PackingSlipPage {
    pub company: CompanyAddress,
    pub slip: PackingSlip,
}

/// Printable packing slips, one page per order.
#[derive(Template, WebTemplate)]
#[template(path = "fulfillment/packing_slips.html")]
pub struct PackingSlipsPage {
    pub company: CompanyAddress,
    pub slips: Vec<PackingSlip>,
    pub skipped: Vec<OrderId>,
}

// =============================================================================
// Service
// =============================================================================

pub struct FulfillmentService<'a, C> {
    pool: &'a SqlitePool,
    carrier: &'a C,
    email: &'a EmailService,
    company: &'a CompanyAddress,
}

impl<'a, C: Carrier + Sync> FulfillmentService<'a, C> {
    #[must_use]
    pub const fn new(
        pool: &'a SqlitePool,
        carrier: &'a C,
        email: &'a EmailService,
        company: &'a CompanyAddress,
    ) -> Self {
        Self {
            pool,
            carrier,
            email,
            company,
        }
    }

    async fn order(&self, order_id: OrderId) -> Result<OrderSummary, AppError> {
        OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Book a shipment for an order and mark it shipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order or customer,
    /// `AppError::Integration` if the carrier rejects the shipment and
    /// `AppError::Database` if a write fails.
    pub async fn create_label(
        &self,
        order_id: OrderId,
        package: Package,
        created_by: &str,
    ) -> Result<Label, AppError> {
        let order = self.order(order_id).await?;
        let customer = CustomerRepository::new(self.pool)
            .get(order.order.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

        let address = order
            .order
            .shipping_address
            .clone()
            .or_else(|| customer.address.clone())
            .unwrap_or_default();

        let request = ShipmentRequest {
            reference: &order.order.order_number,
            sender: self.company,
            receiver_name: customer.full_name(),
            receiver_email: customer.email.as_str().to_string(),
            receiver: parse_address(&address),
            country: customer.country.clone(),
            package,
            declared_value: order.order.total_amount,
        };
        let shipment = self.carrier.create_shipment(&request).await?;

        TrackingRepository::new(self.pool)
            .create(&NewShipmentRecord {
                order_id,
                carrier: self.carrier.name().to_string(),
                tracking_number: shipment.tracking_number.clone(),
                label_url: shipment.label_url.clone(),
                shipment_id: shipment.shipment_id.clone(),
                estimated_delivery: Some(shipment.estimated_delivery),
                cost: shipment.cost,
            })
            .await?;

        OrderRepository::new(self.pool)
            .update_status(order_id, OrderStatus::Shipped, Some(&shipment.tracking_number))
            .await?;

        tracing::info!(
            order_id = %order_id,
            tracking_number = %shipment.tracking_number,
            "Shipping label created"
        );

        let subject = format!("Je bestelling {} is verzonden!", order.order.order_number);
        let message = shipping_message(
            &order.order.order_number,
            &shipment.tracking_number,
            shipment.estimated_delivery,
            &address,
        );
        if let Err(e) = CustomerMailer::new(self.pool, self.email)
            .send(
                &customer,
                EmailTemplate::ShippingNotification,
                &subject,
                &message,
                created_by,
            )
            .await
        {
            tracing::warn!(order_id = %order_id, error = %e, "Failed to record shipping notification");
        }

        Ok(Label {
            order_id,
            tracking_number: shipment.tracking_number,
            label_url: shipment.label_url,
            estimated_delivery: shipment.estimated_delivery,
            cost: shipment.cost,
        })
    }

    /// Create labels for several orders. Failures are collected per order.
    pub async fn create_labels(
        &self,
        order_ids: &[OrderId],
        package: Package,
        created_by: &str,
    ) -> BulkLabels {
        let mut result = BulkLabels {
            total_processed: order_ids.len(),
            ..BulkLabels::default()
        };

        for &order_id in order_ids {
            match self.create_label(order_id, package, created_by).await {
                Ok(label) => result.successful.push(LabelCreated {
                    order_id,
                    tracking_number: label.tracking_number,
                    label_url: label.label_url,
                }),
                Err(e) => result.failed.push(LabelFailed {
                    order_id,
                    error: e.to_string(),
                }),
            }
        }

        result
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order.
    pub async fn packing_slip(&self, order_id: OrderId) -> Result<PackingSlip, AppError> {
        let order = self.order(order_id).await?;
        let items = OrderRepository::new(self.pool).items(order_id).await?;
        Ok(PackingSlip::new(&order, items))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order.
    pub async fn packing_slip_page(&self, order_id: OrderId) -> Result<PackingSlipPage, AppError> {
        Ok(PackingSlipPage {
            company: self.company.clone(),
            slip: self.packing_slip(order_id).await?,
        })
    }

    /// One document for several orders. Unknown orders are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn packing_slips_page(
        &self,
        order_ids: &[OrderId],
    ) -> Result<PackingSlipsPage, AppError> {
        let mut slips = Vec::with_capacity(order_ids.len());
        let mut skipped = Vec::new();

        for &order_id in order_ids {
            match self.packing_slip(order_id).await {
                Ok(slip) => slips.push(slip),
                Err(AppError::NotFound(_)) => skipped.push(order_id),
                Err(e) => return Err(e),
            }
        }

        Ok(PackingSlipsPage {
            company: self.company.clone(),
            slips,
            skipped,
        })
    }

    /// # Errors
    ///
    /// Returns `AppError::Integration` if the carrier lookup fails.
    pub async fn track(&self, tracking_number: &str) -> Result<TrackingInfo, AppError> {
        Ok(self.carrier.track(tracking_number).await?)
    }

    /// Shipments of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn shipping_info(&self, order_id: OrderId) -> Result<Vec<ShipmentRecord>, AppError> {
        Ok(TrackingRepository::new(self.pool)
            .list_for_order(order_id)
            .await?)
    }
}

/// Body of the shipping notification email.
fn shipping_message(
    order_number: &str,
    tracking_number: &str,
    estimated_delivery: NaiveDate,
    address: &str,
) -> String {
    format!(
        "Goed nieuws! Je bestelling {order_number} is zojuist verzonden via DHL.\n\n\
         Track & Trace: {tracking_number}\n\
         Verwachte levering: {}\n\
         Verzendadres: {address}\n\n\
         Volg je pakket: {TRACK_AND_TRACE_URL}{tracking_number}\n\n\
         Zorg dat er iemand thuis is of kies een DHL ServicePoint om je pakket op te halen.",
        estimated_delivery.format("%d-%m-%Y"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use webshop_crm_core::{CustomerId, OrderItemId};

    use crate::models::Order;

    fn order() -> OrderSummary {
        OrderSummary {
            order: Order {
                id: OrderId::new(7),
                customer_id: CustomerId::new(1),
                webshop_id: None,
                order_number: "ORD-1007".to_string(),
                order_date: Utc::now(),
                total_amount: dec!(100),
                currency: "EUR".to_string(),
                status: OrderStatus::Processing,
                payment_method: None,
                shipping_address: Some("Kalverstraat 12, 1012 AB Amsterdam".to_string()),
                tracking_number: None,
                notes: None,
                created_at: Utc::now(),
            },
            first_name: "Jan".to_string(),
            last_name: "de Vries".to_string(),
            email: "jan@shop.nl".to_string(),
            item_count: 1,
        }
    }

    fn item() -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(7),
            product_name: "Linnen blouse <wit>".to_string(),
            product_sku: Some("BL-01".to_string()),
            quantity: 2,
            unit_price: dec!(50),
            total_price: dec!(100),
        }
    }

    #[test]
    fn test_slip_totals() {
        let totals = SlipTotals::for_subtotal(dec!(100));
        assert_eq!(totals.tax_amount, dec!(21.00));
        assert_eq!(totals.shipping_cost, dec!(5.95));
        assert_eq!(totals.total, dec!(126.95));
    }

    #[test]
    fn test_packing_slip_from_order() {
        let slip = PackingSlip::new(&order(), vec![item()]);
        assert_eq!(slip.customer.name, "Jan de Vries");
        assert_eq!(slip.items.len(), 1);
        assert_eq!(slip.items[0].sku.as_deref(), Some("BL-01"));
        assert_eq!(slip.notes, "");
    }

    #[test]
    fn test_packing_slip_page_escapes_html() {
        let page = PackingSlipPage {
            company: CompanyAddress::default(),
            slip: PackingSlip::new(&order(), vec![item()]),
        };
        let html = page.render().unwrap();
        assert!(html.contains("ORD-1007"));
        assert!(html.contains("Linnen blouse &#60;wit&#62;") || html.contains("Linnen blouse &lt;wit&gt;"));
        assert!(html.contains("126.95"));
    }

    #[test]
    fn test_bulk_page_reports_skipped_orders() {
        let page = PackingSlipsPage {
            company: CompanyAddress::default(),
            slips: vec![PackingSlip::new(&order(), vec![item()])],
            skipped: vec![OrderId::new(404), OrderId::new(405)],
        };
        let html = page.render().unwrap();
        assert!(html.contains("404, 405"));
        assert_eq!(html.matches("class=\"slip\"").count(), 1);
    }

    #[test]
    fn test_shipping_message_links_tracking() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let message = shipping_message("ORD-1", "DHL123", date, "Dorpsstraat 1, 1000 AA Amsterdam");
        assert!(message.contains("02-05-2024"));
        assert!(message.contains("tracking-id=DHL123"));
    }
}
