//! Integration credential routes.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    db::ApiSettingsRepository,
    error::{AppError, MissingExt, Validator},
    middleware::{RequireAdmin, RequireStaff},
    services::integrations::{Credentials, Platform, missing_keys},
    state::AppState,
};

use super::{JsonBody, MessageResponse};

/// Shown instead of stored secret values.
pub const MASKED_VALUE: &str = "***CONFIGURED***";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/status", get(status))
        .route("/{platform}/{key}", put(upsert).delete(destroy))
        .route("/test/{platform}", post(test))
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub required_keys: &'static [&'static str],
}

impl From<Platform> for PlatformInfo {
    fn from(platform: Platform) -> Self {
        Self {
            id: platform.as_str(),
            name: platform.display_name(),
            required_keys: platform.required_keys(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: BTreeMap<String, BTreeMap<String, &'static str>>,
    pub platforms: Vec<PlatformInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Active,
    NotConfigured,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub status: ConnectionState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub success: bool,
    pub platform: &'static str,
    pub details: String,
}

fn parse_platform(raw: &str) -> Result<Platform, AppError> {
    raw.parse().map_err(AppError::BadRequest)
}

fn connection_status(platform: Platform, connected: bool) -> ConnectionStatus {
    if connected {
        ConnectionStatus {
            connected,
            status: ConnectionState::Active,
            message: format!("{} is configured", platform.display_name()),
        }
    } else {
        ConnectionStatus {
            connected,
            status: ConnectionState::NotConfigured,
            message: format!("{} credentials are missing", platform.display_name()),
        }
    }
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let rows = ApiSettingsRepository::new(state.pool()).list_active().await?;

    let mut settings: BTreeMap<String, BTreeMap<String, &'static str>> = BTreeMap::new();
    for row in rows {
        settings
            .entry(row.platform)
            .or_default()
            .insert(row.setting_key, MASKED_VALUE);
    }

    Ok(Json(SettingsResponse {
        settings,
        platforms: Platform::ALL.iter().copied().map(PlatformInfo::from).collect(),
    }))
}

#[instrument(skip(_staff, state))]
async fn status(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<&'static str, ConnectionStatus>>, AppError> {
    let mut statuses = BTreeMap::new();
    for &platform in Platform::MONITORED {
        let connected = state
            .integrations()
            .configured(state.pool(), platform)
            .await?
            .is_some();
        statuses.insert(platform.as_str(), connection_status(platform, connected));
    }
    Ok(Json(statuses))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn upsert(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path((platform, key)): Path<(String, String)>,
    JsonBody(body): JsonBody<UpsertRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let platform = parse_platform(&platform)?;
    Validator::new()
        .required(&key, "key")
        .required(&body.value, "value")
        .finish()?;

    ApiSettingsRepository::new(state.pool())
        .upsert(platform.as_str(), key.trim(), body.value.trim())
        .await?;
    state.integrations().invalidate(platform).await;

    info!(platform = platform.as_str(), key = %key, "Integration setting updated");
    Ok(Json(MessageResponse::new("Setting updated successfully")))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn destroy(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Path((platform, key)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let platform = parse_platform(&platform)?;

    ApiSettingsRepository::new(state.pool())
        .deactivate(platform.as_str(), &key)
        .await
        .missing_as("Setting")?;
    state.integrations().invalidate(platform).await;

    info!(platform = platform.as_str(), key = %key, "Integration setting deleted");
    Ok(Json(MessageResponse::new("Setting deleted successfully")))
}

#[instrument(skip(_staff, body))]
async fn test(
    RequireStaff(_staff): RequireStaff,
    Path(platform): Path<String>,
    JsonBody(body): JsonBody<TestRequest>,
) -> Result<Json<TestResponse>, AppError> {
    let platform = parse_platform(&platform)?;

    let missing = missing_keys(platform, &body.credentials);
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Missing required keys: {}",
            missing.join(", ")
        )));
    }

    Ok(Json(TestResponse {
        success: true,
        platform: platform.as_str(),
        details: format!("{} credentials are complete", platform.display_name()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_platform_is_bad_request() {
        assert!(matches!(parse_platform("tiktok"), Err(AppError::BadRequest(_))));
        assert_eq!(parse_platform("meta_ads").ok(), Some(Platform::MetaAds));
    }

    #[test]
    fn test_connection_status_shape() {
        let body = serde_json::to_value(connection_status(Platform::Dhl, false))
            .expect("serializable");
        assert_eq!(body["connected"], false);
        assert_eq!(body["status"], "not_configured");
    }
}
