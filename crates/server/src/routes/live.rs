//! Live viewing routes: the WebSocket endpoint plus REST access to the
//! active customer sessions.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    error::{AppError, Validator},
    live::{SessionView, ws_handler},
    middleware::RequireStaff,
    state::AppState,
};

use super::{JsonBody, MessageResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/sessions", get(sessions))
        .route("/sessions/{id}", get(session))
        .route("/sessions/{id}/message", post(message))
        .route("/sessions/{id}/help", post(help))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
    pub total: usize,
}

fn session_not_found() -> AppError {
    AppError::NotFound("Session".to_string())
}

#[instrument(skip_all)]
async fn sessions(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Json<SessionsResponse> {
    let sessions = state.live().sessions().await;
    Json(SessionsResponse {
        total: sessions.len(),
        sessions,
    })
}

#[instrument(skip(_staff, state))]
async fn session(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    state
        .live()
        .session(&id)
        .await
        .map(Json)
        .ok_or_else(session_not_found)
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn message(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    Validator::new().required(&body.message, "message").finish()?;

    if !state.live().message_customer(&id, body.message).await {
        return Err(session_not_found());
    }
    info!(session_id = %id, "Message sent to customer session");
    Ok(Json(MessageResponse::new("Message sent")))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn help(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.live().send_help(&id, body).await {
        return Err(session_not_found());
    }
    info!(session_id = %id, "Live help sent to customer session");
    Ok(Json(MessageResponse::new("Help sent")))
}
