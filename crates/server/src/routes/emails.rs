//! Customer email routes.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use webshop_crm_core::{CustomerId, EmailStatus};

use crate::{
    db::{CustomerRepository, EmailLogRepository},
    error::{AppError, NotFoundExt, Validator},
    middleware::{CurrentUser, RequireManager, RequireStaff},
    models::EmailLog,
    services::{CustomerMailer, EmailTemplate},
    state::AppState,
};

use super::JsonBody;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(templates))
        .route("/send-customer-email/{customer_id}", post(send_customer_email))
        .route("/send-bulk-email", post(send_bulk_email))
        .route("/customer/{customer_id}/history", get(history))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub template: EmailTemplate,
}

#[derive(Debug, Deserialize)]
pub struct BulkEmailRequest {
    pub customer_ids: Vec<CustomerId>,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub template: EmailTemplate,
}

#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<TemplateInfo>,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub message: &'static str,
    pub status: EmailStatus,
    pub email_log: EmailLog,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub customer_id: CustomerId,
    pub status: EmailStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkEmailResponse {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<BulkResult>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub emails: Vec<EmailLog>,
}

#[derive(Debug, Serialize)]
pub struct EmailStats {
    pub by_status: BTreeMap<String, i64>,
    pub by_template: BTreeMap<String, i64>,
    pub last_30_days: i64,
}

fn check_message(v: &mut Validator, subject: &str, message: &str) {
    v.required(subject, "subject").required(message, "message");
}

fn sender_name(user: &CurrentUser) -> String {
    format!("{} {}", user.first_name, user.last_name)
}

#[instrument(skip(_staff))]
async fn templates(RequireStaff(_staff): RequireStaff) -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        templates: EmailTemplate::ALL
            .iter()
            .map(|t| TemplateInfo {
                name: t.as_str(),
                description: t.description(),
            })
            .collect(),
    })
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, template = body.template.as_str()))]
async fn send_customer_email(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    JsonBody(body): JsonBody<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, AppError> {
    let mut v = Validator::new();
    check_message(&mut v, &body.subject, &body.message);
    v.finish()?;

    let customer = CustomerRepository::new(state.pool())
        .get(customer_id)
        .await
        .or_not_found("Customer")?;

    let log = CustomerMailer::new(state.pool(), state.email())
        .send(
            &customer,
            body.template,
            &body.subject,
            &body.message,
            &sender_name(&user),
        )
        .await?;

    let message = match log.status {
        EmailStatus::Sent => "Email sent successfully",
        EmailStatus::Logged => "Email logged (SMTP not configured)",
        EmailStatus::Failed => "Email could not be delivered",
    };
    info!(customer_id = %customer_id, status = %log.status, "Customer email processed");

    Ok(Json(SendEmailResponse {
        message,
        status: log.status,
        email_log: log,
    }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, recipients = body.customer_ids.len()))]
async fn send_bulk_email(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<BulkEmailRequest>,
) -> Result<Json<BulkEmailResponse>, AppError> {
    let mut v = Validator::new();
    v.check(
        !body.customer_ids.is_empty(),
        "customer_ids",
        "at least one customer is required",
    );
    check_message(&mut v, &body.subject, &body.message);
    v.finish()?;

    let customers = CustomerRepository::new(state.pool());
    let mailer = CustomerMailer::new(state.pool(), state.email());
    let sent_by = sender_name(&user);
    let mut results = Vec::with_capacity(body.customer_ids.len());

    for &customer_id in &body.customer_ids {
        let Some(customer) = customers.get(customer_id).await? else {
            results.push(BulkResult {
                customer_id,
                status: EmailStatus::Failed,
                error: Some("Customer not found".to_string()),
            });
            continue;
        };

        match mailer
            .send(&customer, body.template, &body.subject, &body.message, &sent_by)
            .await
        {
            Ok(log) => results.push(BulkResult {
                customer_id,
                status: log.status,
                error: log.error_message,
            }),
            Err(e) => {
                warn!(customer_id = %customer_id, error = %e, "Failed to record bulk email");
                results.push(BulkResult {
                    customer_id,
                    status: EmailStatus::Failed,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let failed = results
        .iter()
        .filter(|r| r.status == EmailStatus::Failed)
        .count();
    let sent = results.len() - failed;
    info!(sent, failed, "Bulk email finished");

    Ok(Json(BulkEmailResponse {
        sent,
        failed,
        results,
    }))
}

#[instrument(skip(_staff, state))]
async fn history(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<HistoryResponse>, AppError> {
    let emails = EmailLogRepository::new(state.pool())
        .list_for_customer(customer_id)
        .await?;
    Ok(Json(HistoryResponse { emails }))
}

#[instrument(skip(_staff, state))]
async fn stats(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<EmailStats>, AppError> {
    let counts = EmailLogRepository::new(state.pool()).counts().await?;
    Ok(Json(EmailStats {
        by_status: counts.by_status.into_iter().collect(),
        by_template: counts.by_template.into_iter().collect(),
        last_30_days: counts.last_30_days,
    }))
}
