//! Product catalogue routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{ProductId, WebshopId, money};

use crate::{
    db::ProductRepository,
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::{RequireManager, RequireStaff},
    models::{
        CategoryCount, NewProduct, PageRequest, ProductFilter, ProductListing,
        ProductPerformance, ProductUpdate, SalesHistoryEntry, SalesStats,
    },
    state::AppState,
};

use super::{JsonBody, MessageResponse, Paginated, PeriodQuery};

const SALES_HISTORY_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/meta/categories", get(categories))
        .route("/performance/summary", get(performance))
        .route("/bulk/purchase-prices", put(bulk_purchase_prices))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub webshop_id: Option<WebshopId>,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductListing>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductListing,
    pub sales_history: Vec<SalesHistoryEntry>,
    pub sales_stats: SalesStats,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i64,
    pub weight_grams: Option<i64>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub shipping_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub supplier_sku: Option<String>,
    pub webshop_id: Option<WebshopId>,
}

impl CreateProductRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .required(&self.name, "name")
            .check(
                money::is_amount(self.purchase_price),
                "purchase_price",
                "purchase_price must be between 0 and 1000000000",
            )
            .check(
                money::is_amount(self.selling_price),
                "selling_price",
                "selling_price must be between 0 and 1000000000",
            )
            .check(
                self.stock_quantity >= 0,
                "stock_quantity",
                "stock_quantity must be at least 0",
            )
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
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

impl UpdateProductRequest {
    fn into_update(self) -> Result<ProductUpdate, AppError> {
        let valid_amount = |value: Option<Decimal>| value.is_none_or(money::is_amount);
        Validator::new()
            .check(
                self.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
                "name",
                "name cannot be empty",
            )
            .check(
                valid_amount(self.purchase_price),
                "purchase_price",
                "purchase_price must be between 0 and 1000000000",
            )
            .check(
                valid_amount(self.selling_price),
                "selling_price",
                "selling_price must be between 0 and 1000000000",
            )
            .check(
                self.stock_quantity.is_none_or(|s| s >= 0),
                "stock_quantity",
                "stock_quantity must be at least 0",
            )
            .finish()?;

        Ok(ProductUpdate {
            sku: self.sku,
            name: self.name,
            description: self.description,
            category: self.category,
            purchase_price: self.purchase_price,
            selling_price: self.selling_price,
            stock_quantity: self.stock_quantity,
            weight_grams: self.weight_grams,
            length_cm: self.length_cm,
            width_cm: self.width_cm,
            height_cm: self.height_cm,
            shipping_cost: self.shipping_cost,
            supplier: self.supplier,
            supplier_sku: self.supplier_sku,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: &'static str,
    pub product: ProductListing,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub period_days: i64,
    pub products: Vec<ProductPerformance>,
}

#[derive(Debug, Deserialize)]
pub struct PriceUpdate {
    pub id: ProductId,
    pub purchase_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BulkPriceRequest {
    pub updates: Vec<PriceUpdate>,
}

#[derive(Debug, Serialize)]
pub struct BulkPriceResponse {
    pub message: &'static str,
    pub updated: u64,
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<ProductList>>, AppError> {
    let page = PageRequest::new(query.page, query.limit, 20);
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
        is_active: query.is_active.unwrap_or(true),
        webshop_id: query.webshop_id,
    };

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(Json(Paginated {
        items: ProductList {
            products: products.into_iter().map(ProductListing::from).collect(),
        },
        pagination: page.paginate(total),
    }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>, AppError> {
    let products = ProductRepository::new(state.pool());
    let product = products.get(id).await.or_not_found("Product")?;

    // Order lines reference products by SKU only
    let (sales_history, sales_stats) = match product.sku.as_deref() {
        Some(sku) => (
            products.sales_history(sku, SALES_HISTORY_LIMIT).await?,
            products.sales_stats(sku).await?,
        ),
        None => (
            Vec::new(),
            SalesStats {
                total_sold: 0,
                total_revenue: Decimal::ZERO,
                order_count: 0,
                avg_selling_price: Decimal::ZERO,
            },
        ),
    };

    Ok(Json(ProductDetail {
        product: product.into(),
        sales_history,
        sales_stats,
    }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, name = %body.name))]
async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    body.validate()?;

    let product = ProductRepository::new(state.pool())
        .create(&NewProduct {
            webshop_id: body.webshop_id,
            sku: body.sku.filter(|s| !s.trim().is_empty()),
            name: body.name.trim().to_string(),
            description: body.description,
            category: body.category,
            purchase_price: body.purchase_price,
            selling_price: body.selling_price,
            stock_quantity: body.stock_quantity,
            weight_grams: body.weight_grams.unwrap_or(0),
            length_cm: body.length_cm.unwrap_or(0.0),
            width_cm: body.width_cm.unwrap_or(0.0),
            height_cm: body.height_cm.unwrap_or(0.0),
            shipping_cost: body.shipping_cost,
            supplier: body.supplier,
            supplier_sku: body.supplier_sku,
        })
        .await?;

    info!(product_id = %product.id, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created successfully",
            product: product.into(),
        }),
    ))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    JsonBody(body): JsonBody<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let update = body.into_update()?;
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let product = ProductRepository::new(state.pool())
        .update(id, update)
        .await
        .missing_as("Product")?;

    info!(product_id = %id, "Product updated");
    Ok(Json(ProductResponse {
        message: "Product updated successfully",
        product: product.into(),
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn destroy(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<MessageResponse>, AppError> {
    ProductRepository::new(state.pool())
        .deactivate(id)
        .await
        .missing_as("Product")?;

    info!(product_id = %id, "Product deactivated");
    Ok(Json(MessageResponse::new("Product deactivated successfully")))
}

#[instrument(skip(_staff, state))]
async fn categories(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let categories = ProductRepository::new(state.pool()).categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

#[instrument(skip(_staff, state))]
async fn performance(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<PerformanceResponse>, AppError> {
    let period_days = period.days();
    let products = ProductRepository::new(state.pool())
        .performance(period_days)
        .await?;

    Ok(Json(PerformanceResponse {
        period_days,
        products,
    }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, count = body.updates.len()))]
async fn bulk_purchase_prices(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BulkPriceRequest>,
) -> Result<Json<BulkPriceResponse>, AppError> {
    let mut v = Validator::new();
    v.check(!body.updates.is_empty(), "updates", "at least one update is required");
    for update in &body.updates {
        v.check(
            money::is_amount(update.purchase_price),
            "updates.purchase_price",
            "purchase_price must be between 0 and 1000000000",
        );
    }
    v.finish()?;

    let updates: Vec<_> = body
        .updates
        .iter()
        .map(|u| (u.id, u.purchase_price))
        .collect();
    let updated = ProductRepository::new(state.pool())
        .bulk_update_purchase_prices(&updates)
        .await?;

    info!(updated, "Purchase prices updated");
    Ok(Json(BulkPriceResponse {
        message: "Purchase prices updated successfully",
        updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_rejects_blank_name_and_negative_price() {
        let body = UpdateProductRequest {
            name: Some("  ".to_string()),
            selling_price: Some(dec!(-1)),
            ..Default::default()
        };
        let Err(AppError::Validation(errors)) = body.into_update() else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["name", "selling_price"]);
    }

    #[test]
    fn test_empty_update_detected() {
        let update = UpdateProductRequest::default()
            .into_update()
            .expect("nothing to reject");
        assert!(update.is_empty());
    }
}
