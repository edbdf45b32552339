//! Customer portal account routes. All public.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use webshop_crm_core::{CustomerId, WebshopId};

use crate::{
    error::{AppError, Validator},
    models::Customer,
    services::{AuthError, CustomerAuthService, auth::CustomerRegistration},
    state::AppState,
};

use super::{JsonBody, MessageResponse};

const RESEND_MESSAGE: &str =
    "If an unverified account exists for this email, a new verification link has been sent";
const FORGOT_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify/{token}", get(verify))
        .route("/resend-verification", post(resend_verification))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub webshop_id: Option<WebshopId>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub customer_id: CustomerId,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct VerificationRequired {
    pub error: String,
    pub requires_verification: bool,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub password: String,
}

fn verification_link(state: &AppState, token: &str) -> String {
    format!(
        "{}/api/customer-auth/verify/{token}",
        state.config().base_url.trim_end_matches('/')
    )
}

fn reset_link(state: &AppState, token: &str) -> String {
    format!(
        "{}/reset-password/{token}",
        state.config().base_url.trim_end_matches('/')
    )
}

async fn send_verification(state: &AppState, customer: &Customer, token: &str) {
    let link = verification_link(state, token);
    if let Err(e) = state.email().send_verification(customer, &link).await {
        warn!(customer_id = %customer.id, error = %e, "Failed to send verification email");
    }
}

#[instrument(skip(state, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    Validator::new()
        .required(&body.email, "email")
        .required(&body.first_name, "first_name")
        .required(&body.last_name, "last_name")
        .finish()?;

    let (customer, token) = CustomerAuthService::new(state.pool(), state.keys())
        .register(CustomerRegistration {
            email: &body.email,
            password: &body.password,
            first_name: &body.first_name,
            last_name: &body.last_name,
            phone: body.phone.filter(|p| !p.trim().is_empty()),
            webshop_id: body.webshop_id,
        })
        .await?;

    send_verification(&state, &customer, &token).await;

    info!(customer_id = %customer.id, "Customer portal account registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account.",
            customer_id: customer.id,
        }),
    ))
}

#[instrument(skip(state, body), fields(email = %body.email))]
async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let result = CustomerAuthService::new(state.pool(), state.keys())
        .login(&body.email, &body.password)
        .await;

    match result {
        Ok((customer, token)) => {
            info!(customer_id = %customer.id, "Customer logged in");
            Ok(Json(LoginResponse {
                message: "Login successful",
                token,
                customer,
            })
            .into_response())
        }
        Err(err @ AuthError::NotVerified) => Ok((
            StatusCode::FORBIDDEN,
            Json(VerificationRequired {
                error: err.to_string(),
                requires_verification: true,
            }),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip_all)]
async fn verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let customer_id = CustomerAuthService::new(state.pool(), state.keys())
        .verify_email(&token)
        .await?;

    info!(customer_id = %customer_id, "Customer email verified");
    Ok(Json(MessageResponse::new(
        "Email verified successfully. You can now log in.",
    )))
}

#[instrument(skip_all)]
async fn resend_verification(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some((customer, token)) = CustomerAuthService::new(state.pool(), state.keys())
        .resend_verification(&body.email)
        .await?
    {
        send_verification(&state, &customer, &token).await;
    }
    Ok(Json(MessageResponse::new(RESEND_MESSAGE)))
}

#[instrument(skip_all)]
async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some((customer, token)) = CustomerAuthService::new(state.pool(), state.keys())
        .forgot_password(&body.email)
        .await?
    {
        let link = reset_link(&state, &token);
        if let Err(e) = state.email().send_password_reset(&customer, &link).await {
            warn!(customer_id = %customer.id, error = %e, "Failed to send password reset email");
        }
    }
    Ok(Json(MessageResponse::new(FORGOT_MESSAGE)))
}

#[instrument(skip_all)]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(body): JsonBody<ResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    CustomerAuthService::new(state.pool(), state.keys())
        .reset_password(&token, &body.password)
        .await?;

    info!("Customer password reset");
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}
