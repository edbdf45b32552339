//! Unified error handling for the API.
//!
//! Every handler returns `Result<_, AppError>`. Errors render as JSON bodies
//! (`{"error": "..."}`) so the dashboard can show them directly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// An external integration (ad platform, carrier, SMTP) failed.
    #[error("Integration error: {0}")]
    Integration(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// One or more request fields failed validation.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            // Duplicate email / SKU / order number is a client error
            Self::Database(RepositoryError::Conflict(_))
            | Self::BadRequest(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Integration(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let body = match &self {
            Self::Validation(errors) => json!({ "error": "validation failed", "errors": errors }),
            Self::Database(RepositoryError::Conflict(message)) => json!({ "error": message }),
            Self::Database(RepositoryError::NotFound) => json!({ "error": "Not found" }),
            // Don't expose internal error details to clients
            Self::Database(_) | Self::Internal(_) => json!({ "error": "Internal server error" }),
            Self::Integration(_) => json!({ "error": "External service error" }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Name the missing entity in repository lookups that return `Option`.
pub trait NotFoundExt<T> {
    /// Turn `Ok(None)` into `AppError::NotFound(entity)`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when nothing was found, or the
    /// repository error otherwise.
    fn or_not_found(self, entity: &str) -> Result<T, AppError>;
}

impl<T> NotFoundExt<T> for Result<Option<T>, RepositoryError> {
    fn or_not_found(self, entity: &str) -> Result<T, AppError> {
        self?.ok_or_else(|| AppError::NotFound(entity.to_string()))
    }
}

/// Name the missing entity in repository writes that report
/// `RepositoryError::NotFound`.
pub trait MissingExt<T> {
    /// # Errors
    ///
    /// Returns `AppError::NotFound(entity)` for a missing row, or the
    /// repository error otherwise.
    fn missing_as(self, entity: &str) -> Result<T, AppError>;
}

impl<T> MissingExt<T> for Result<T, RepositoryError> {
    fn missing_as(self, entity: &str) -> Result<T, AppError> {
        self.map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound(entity.to_string()),
            other => AppError::Database(other),
        })
    }
}

/// Collects field errors while validating a request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &'static str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    /// Require a non-blank string.
    pub fn required(&mut self, value: &str, field: &'static str) -> &mut Self {
        self.check(
            !value.trim().is_empty(),
            field,
            &format!("{field} is required"),
        )
    }

    /// Finish validation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` with every recorded failure.
    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Set the Sentry user context from an authenticated user.
pub fn set_sentry_user(user_id: i64, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_helpers() {
        let found: Result<Option<u8>, RepositoryError> = Ok(None);
        assert_eq!(
            found.or_not_found("Order").unwrap_err().to_string(),
            "Order not found"
        );

        let missing: Result<(), RepositoryError> = Err(RepositoryError::NotFound);
        assert!(matches!(missing.missing_as("Webshop"), Err(AppError::NotFound(e)) if e == "Webshop"));
    }

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Customer".to_string());
        assert_eq!(err.to_string(), "Customer not found");

        let err = AppError::BadRequest("No fields to update".to_string());
        assert_eq!(err.to_string(), "No fields to update");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("Order".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("Access token required".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Validation(vec![FieldError::new("email", "bad")])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Integration("dhl down".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "Order number already exists".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption(
                "bad row".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validator_collects_all_failures() {
        let result = Validator::new()
            .required("", "email")
            .required("Jan", "first_name")
            .check(false, "password", "Password must be at least 6 characters")
            .finish();

        match result {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors.first().map(|e| e.field), Some("email"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
