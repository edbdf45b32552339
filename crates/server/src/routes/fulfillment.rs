//! Shipping label, packing slip and tracking routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, instrument};

use webshop_crm_core::OrderId;

use crate::{
    error::{AppError, Validator},
    middleware::{CurrentUser, RequireStaff},
    models::ShipmentRecord,
    services::{
        Dhl, FulfillmentService, Platform,
        carrier::{PackageOptions, TrackingInfo},
        fulfillment::{BulkLabels, Label, PackingSlip, PackingSlipPage, PackingSlipsPage},
    },
    state::AppState,
};

use super::JsonBody;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}/create-label", post(create_label))
        .route("/create-dhl-label", post(create_dhl_label))
        .route("/orders/bulk/create-labels", post(create_labels))
        .route("/orders/{order_id}/packing-slip", get(packing_slip))
        .route("/orders/{order_id}/packing-slip.html", get(packing_slip_html))
        .route("/orders/bulk/packing-slips", post(packing_slips))
        .route("/tracking/{tracking_number}", get(tracking))
        .route("/orders/{order_id}/shipping-info", get(shipping_info))
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub order_id: Option<OrderId>,
    #[serde(flatten)]
    pub package: PackageOptions,
}

#[derive(Debug, Deserialize)]
pub struct BulkLabelRequest {
    pub order_ids: Vec<OrderId>,
    #[serde(flatten)]
    pub package: PackageOptions,
}

#[derive(Debug, Deserialize)]
pub struct BulkSlipRequest {
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Serialize)]
pub struct LabelResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub label: Label,
}

#[derive(Debug, Serialize)]
pub struct ShippingInfoResponse {
    pub order_id: OrderId,
    pub shipments: Vec<ShipmentRecord>,
}

/// Parse an optional JSON body; an empty body yields the default.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn check_order_ids(ids: &[OrderId]) -> Result<(), AppError> {
    Validator::new()
        .check(!ids.is_empty(), "order_ids", "at least one order is required")
        .finish()
}

fn operator(user: &CurrentUser) -> String {
    format!("{} {}", user.first_name, user.last_name)
}

/// DHL client from the stored credentials, or the simulator.
async fn carrier(state: &AppState) -> Result<Dhl, AppError> {
    let credentials = state
        .integrations()
        .configured(state.pool(), Platform::Dhl)
        .await?;
    Ok(Dhl::from_credentials(credentials.as_deref()))
}

fn service<'a>(state: &'a AppState, carrier: &'a Dhl) -> FulfillmentService<'a, Dhl> {
    FulfillmentService::new(
        state.pool(),
        carrier,
        state.email(),
        &state.config().company,
    )
}

async fn label_for(
    state: &AppState,
    user: &CurrentUser,
    order_id: OrderId,
    package: PackageOptions,
) -> Result<Json<LabelResponse>, AppError> {
    let carrier = carrier(state).await?;
    let label = service(state, &carrier)
        .create_label(order_id, package.into(), &operator(user))
        .await?;

    info!(order_id = %order_id, simulated = carrier.is_simulated(), "Label created");
    Ok(Json(LabelResponse {
        message: "Shipping label created successfully",
        label,
    }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn create_label(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    body: Bytes,
) -> Result<Json<LabelResponse>, AppError> {
    let package: PackageOptions = optional_body(&body)?;
    label_for(&state, &user, order_id, package).await
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn create_dhl_label(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LabelRequest>,
) -> Result<Json<LabelResponse>, AppError> {
    let order_id = body
        .order_id
        .ok_or_else(|| AppError::BadRequest("order_id is required".to_string()))?;
    label_for(&state, &user, order_id, body.package).await
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, orders = body.order_ids.len()))]
async fn create_labels(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BulkLabelRequest>,
) -> Result<Json<BulkLabels>, AppError> {
    check_order_ids(&body.order_ids)?;

    let carrier = carrier(&state).await?;
    let result = service(&state, &carrier)
        .create_labels(&body.order_ids, body.package.into(), &operator(&user))
        .await;

    info!(
        successful = result.successful.len(),
        failed = result.failed.len(),
        "Bulk labels processed"
    );
    Ok(Json(result))
}

#[instrument(skip(_staff, state))]
async fn packing_slip(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<PackingSlip>, AppError> {
    let carrier = carrier(&state).await?;
    Ok(Json(service(&state, &carrier).packing_slip(order_id).await?))
}

#[instrument(skip(_staff, state))]
async fn packing_slip_html(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<PackingSlipPage, AppError> {
    let carrier = carrier(&state).await?;
    service(&state, &carrier).packing_slip_page(order_id).await
}

#[instrument(skip(_staff, state, body), fields(orders = body.order_ids.len()))]
async fn packing_slips(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BulkSlipRequest>,
) -> Result<PackingSlipsPage, AppError> {
    check_order_ids(&body.order_ids)?;

    let carrier = carrier(&state).await?;
    service(&state, &carrier)
        .packing_slips_page(&body.order_ids)
        .await
}

#[instrument(skip(_staff, state))]
async fn tracking(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<Json<TrackingInfo>, AppError> {
    let carrier = carrier(&state).await?;
    Ok(Json(service(&state, &carrier).track(&tracking_number).await?))
}

#[instrument(skip(_staff, state))]
async fn shipping_info(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ShippingInfoResponse>, AppError> {
    let carrier = carrier(&state).await?;
    let shipments = service(&state, &carrier).shipping_info(order_id).await?;
    Ok(Json(ShippingInfoResponse {
        order_id,
        shipments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_uses_defaults() {
        let options: PackageOptions = optional_body(&Bytes::new()).expect("empty body");
        assert_eq!(options.weight, None);

        let options: PackageOptions =
            optional_body(&Bytes::from_static(br#"{"weight": 2500}"#)).expect("valid body");
        assert_eq!(options.weight, Some(2500));
    }

    #[test]
    fn test_malformed_body_rejected() {
        let result: Result<PackageOptions, _> = optional_body(&Bytes::from_static(b"{weight"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_label_request_flattens_package() {
        let body: LabelRequest =
            serde_json::from_str(r#"{"order_id": 4, "length": 40}"#).expect("valid body");
        assert_eq!(body.order_id, Some(OrderId::new(4)));
        assert_eq!(body.package.length, Some(40));
    }
}
