//! Staff authentication routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::UserRole;

use crate::{
    db::UserRepository,
    error::{AppError, Validator},
    middleware::RequireStaff,
    models::User,
    services::{StaffAuthService, auth::StaffRegistration},
    state::AppState,
};

use super::{JsonBody, MessageResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/change-password", put(change_password))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Self-service staff registration. New accounts always get role `user`.
#[instrument(skip(state, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    Validator::new()
        .required(&body.first_name, "first_name")
        .required(&body.last_name, "last_name")
        .finish()?;

    let (user, token) = StaffAuthService::new(state.pool(), state.keys())
        .register(&StaffRegistration {
            email: &body.email,
            password: &body.password,
            first_name: &body.first_name,
            last_name: &body.last_name,
            role: UserRole::User,
        })
        .await?;

    info!(user_id = %user.id, "Staff user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            token,
            user,
        }),
    ))
}

#[instrument(skip(state, body), fields(email = %body.email))]
async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (user, token) = StaffAuthService::new(state.pool(), state.keys())
        .login(&body.email, &body.password)
        .await?;

    info!(user_id = %user.id, "Staff user logged in");
    Ok(Json(LoginResponse { token, user }))
}

#[instrument(skip_all, fields(user_id = %current.id))]
async fn profile(
    RequireStaff(current): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(Json(ProfileResponse { user }))
}

#[instrument(skip_all, fields(user_id = %current.id))]
async fn change_password(
    RequireStaff(current): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    StaffAuthService::new(state.pool(), state.keys())
        .change_password(current.id, &body.current_password, &body.new_password)
        .await?;

    info!(user_id = %current.id, "Staff password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
