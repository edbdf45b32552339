//! OAuth routes for connecting Google Ads and Meta accounts.
//!
//! `start` redirects the browser to the platform's consent page with a signed
//! `state`; the platform redirects back to `callback`, which stores the
//! obtained tokens as integration settings.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::OAuthApp,
    error::AppError,
    middleware::RequireStaff,
    services::oauth::{self, OAuthClient, OAuthProvider},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/google/start", get(google_start))
        .route("/google/callback", get(google_callback))
        .route("/meta/start", get(meta_start))
        .route("/meta/callback", get(meta_callback))
}

#[derive(Debug, Serialize)]
pub struct OAuthStatus {
    pub google_oauth_enabled: bool,
    pub meta_oauth_enabled: bool,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Shown in the popup window after a successful connection.
#[derive(Template, WebTemplate)]
#[template(path = "oauth/connected.html")]
pub struct ConnectedPage {
    pub platform_name: &'static str,
}

fn app(state: &AppState, provider: OAuthProvider) -> Result<OAuthApp, AppError> {
    let oauth = &state.config().oauth;
    let app = match provider {
        OAuthProvider::Google => oauth.google.as_ref(),
        OAuthProvider::Meta => oauth.meta.as_ref(),
    };
    app.cloned().ok_or_else(|| {
        AppError::BadRequest(format!(
            "{} OAuth is not configured, set {}",
            provider.platform().display_name(),
            provider.client_id_var()
        ))
    })
}

#[instrument(skip_all)]
async fn status(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Json<OAuthStatus> {
    let oauth = &state.config().oauth;
    Json(OAuthStatus {
        google_oauth_enabled: oauth.google.is_some(),
        meta_oauth_enabled: oauth.meta.is_some(),
        message: "OAuth endpoints available for connecting ad accounts",
    })
}

fn start(state: &AppState, provider: OAuthProvider) -> Result<Redirect, AppError> {
    let app = app(state, provider)?;
    let oauth_state = state
        .keys()
        .oauth_state(provider.as_str())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let redirect_uri = provider.callback_url(&state.config().base_url);
    let url = provider
        .authorize_url(&app.client_id, &redirect_uri, &oauth_state)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(provider = provider.as_str(), "Starting OAuth authorization");
    Ok(Redirect::to(url.as_str()))
}

async fn callback(
    state: &AppState,
    provider: OAuthProvider,
    query: CallbackQuery,
) -> Result<ConnectedPage, AppError> {
    if let Some(error) = query.error {
        warn!(provider = provider.as_str(), error = %error, "OAuth authorization denied");
        return Err(AppError::BadRequest(format!("Authorization denied: {error}")));
    }
    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("Authorization failed, no code received".to_string())
        })?;
    let oauth_state = query.state.unwrap_or_default();
    state
        .keys()
        .verify_oauth_state(&oauth_state, provider.as_str())
        .map_err(|_| AppError::BadRequest("Invalid or expired OAuth state".to_string()))?;

    let app = app(state, provider)?;
    let redirect_uri = provider.callback_url(&state.config().base_url);
    let settings = OAuthClient::new()
        .exchange(provider, &app, &code, &redirect_uri)
        .await?;
    oauth::store_settings(state.pool(), state.integrations(), provider, &settings).await?;

    info!(provider = provider.as_str(), "Ad account connected through OAuth");
    Ok(ConnectedPage {
        platform_name: provider.platform().display_name(),
    })
}

#[instrument(skip_all)]
async fn google_start(State(state): State<AppState>) -> Result<Redirect, AppError> {
    start(&state, OAuthProvider::Google)
}

#[instrument(skip_all)]
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<ConnectedPage, AppError> {
    callback(&state, OAuthProvider::Google, query).await
}

#[instrument(skip_all)]
async fn meta_start(State(state): State<AppState>) -> Result<Redirect, AppError> {
    start(&state, OAuthProvider::Meta)
}

#[instrument(skip_all)]
async fn meta_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<ConnectedPage, AppError> {
    callback(&state, OAuthProvider::Meta, query).await
}
