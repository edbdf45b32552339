//! Product catalogue domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{ProductId, WebshopId, money};

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub webshop_id: Option<WebshopId>,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i64,
    pub weight_grams: i64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    pub shipping_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_sku: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Selling price minus purchase price.
    #[must_use]
    pub fn gross_margin(&self) -> Decimal {
        self.selling_price - self.purchase_price
    }

    /// Gross margin as a percentage of the selling price (0 for free items).
    #[must_use]
    pub fn margin_percentage(&self) -> Decimal {
        money::percentage(self.gross_margin(), self.selling_price)
    }
}

/// A product with its margin figures, as listed by the catalogue API.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub gross_margin: Decimal,
    pub margin_percentage: Decimal,
}

impl From<Product> for ProductListing {
    fn from(product: Product) -> Self {
        Self {
            gross_margin: product.gross_margin(),
            margin_percentage: product.margin_percentage(),
            product,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub webshop_id: Option<WebshopId>,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i64,
    pub weight_grams: i64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    pub shipping_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_sku: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub stock_quantity: Option<i64>,
    pub weight_grams: Option<i64>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub shipping_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_sku: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.purchase_price.is_none()
            && self.selling_price.is_none()
            && self.stock_quantity.is_none()
            && self.weight_grams.is_none()
            && self.length_cm.is_none()
            && self.width_cm.is_none()
            && self.height_cm.is_none()
            && self.shipping_cost.is_none()
            && self.supplier.is_none()
            && self.supplier_sku.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_active: bool,
    pub webshop_id: Option<WebshopId>,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            is_active: true,
            webshop_id: None,
        }
    }
}

/// One order line that sold this product.
#[derive(Debug, Clone, Serialize)]
pub struct SalesHistoryEntry {
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesStats {
    pub total_sold: i64,
    pub total_revenue: Decimal,
    pub order_count: i64,
    pub avg_selling_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub product_count: i64,
}

/// Sales and profit of one product over a window.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPerformance {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub quantity_sold: i64,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub margin_percentage: Decimal,
}

/// Package dimensions of a catalogue item, used for shipping quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSpec {
    pub sku: String,
    pub category: Option<String>,
    pub weight_grams: i64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(purchase: Decimal, selling: Decimal) -> Product {
        Product {
            id: ProductId::new(1),
            webshop_id: None,
            sku: Some("TSHIRT-01".to_string()),
            name: "T-shirt".to_string(),
            description: None,
            category: Some("Kleding".to_string()),
            purchase_price: purchase,
            selling_price: selling,
            stock_quantity: 10,
            weight_grams: 200,
            length_cm: 30.0,
            width_cm: 20.0,
            height_cm: 2.0,
            shipping_cost: None,
            supplier: None,
            supplier_sku: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_margins() {
        let p = product(dec!(8), dec!(20));
        assert_eq!(p.gross_margin(), dec!(12));
        assert_eq!(p.margin_percentage(), dec!(60));
    }

    #[test]
    fn test_margin_of_free_product_is_zero() {
        let p = product(dec!(8), Decimal::ZERO);
        assert_eq!(p.margin_percentage(), Decimal::ZERO);
    }
}
