//! Webshop (tenant) routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use webshop_crm_core::{SubscriptionPlan, WebshopId};

use crate::{
    db::WebshopRepository,
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::{RequireAdmin, RequireManager, RequireStaff},
    models::{
        NewWebshop, Webshop, WebshopDetail, WebshopListing, WebshopUpdate,
        default_webshop_settings,
    },
    state::AppState,
};

use super::{JsonBody, MessageResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct CreateWebshopRequest {
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub subscription_plan: SubscriptionPlan,
    pub settings: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebshopRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub settings: Option<Value>,
}

impl From<UpdateWebshopRequest> for WebshopUpdate {
    fn from(body: UpdateWebshopRequest) -> Self {
        Self {
            name: body.name.map(|n| n.trim().to_string()),
            domain: body.domain,
            description: body.description,
            subscription_plan: body.subscription_plan,
            settings: body.settings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebshopsResponse {
    pub webshops: Vec<WebshopListing>,
}

#[derive(Debug, Serialize)]
pub struct WebshopResponse {
    pub message: &'static str,
    pub webshop: Webshop,
}

fn check_settings(v: &mut Validator, settings: Option<&Value>) {
    v.check(
        settings.is_none_or(Value::is_object),
        "settings",
        "settings must be an object",
    );
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<WebshopsResponse>, AppError> {
    let webshops = WebshopRepository::new(state.pool()).list().await?;
    Ok(Json(WebshopsResponse { webshops }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<WebshopId>,
) -> Result<Json<WebshopDetail>, AppError> {
    let webshops = WebshopRepository::new(state.pool());
    let webshop = webshops.get(id).await.or_not_found("Webshop")?;

    Ok(Json(WebshopDetail {
        webshop,
        subscription: webshops.subscription(id).await?,
        members: webshops.members(id).await?,
    }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, name = %body.name))]
async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateWebshopRequest>,
) -> Result<(StatusCode, Json<WebshopResponse>), AppError> {
    let mut v = Validator::new();
    v.required(&body.name, "name");
    check_settings(&mut v, body.settings.as_ref());
    v.finish()?;

    let webshop = WebshopRepository::new(state.pool())
        .create(&NewWebshop {
            name: body.name.trim().to_string(),
            domain: body.domain.filter(|d| !d.trim().is_empty()),
            description: body.description,
            owner_id: Some(user.id),
            subscription_plan: body.subscription_plan,
            settings: body.settings.unwrap_or_else(default_webshop_settings),
        })
        .await?;

    info!(webshop_id = %webshop.id, "Webshop created");
    Ok((
        StatusCode::CREATED,
        Json(WebshopResponse {
            message: "Webshop created successfully",
            webshop,
        }),
    ))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WebshopId>,
    JsonBody(body): JsonBody<UpdateWebshopRequest>,
) -> Result<Json<WebshopResponse>, AppError> {
    let mut v = Validator::new();
    v.check(
        body.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
        "name",
        "name cannot be empty",
    );
    check_settings(&mut v, body.settings.as_ref());
    v.finish()?;

    let update = WebshopUpdate::from(body);
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let webshop = WebshopRepository::new(state.pool())
        .update(id, update)
        .await
        .missing_as("Webshop")?;

    info!(webshop_id = %id, "Webshop updated");
    Ok(Json(WebshopResponse {
        message: "Webshop updated successfully",
        webshop,
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn destroy(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<WebshopId>,
) -> Result<Json<MessageResponse>, AppError> {
    WebshopRepository::new(state.pool())
        .deactivate(id)
        .await
        .missing_as("Webshop")?;

    info!(webshop_id = %id, "Webshop deactivated");
    Ok(Json(MessageResponse::new("Webshop deleted successfully")))
}
