//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::AppError;

/// Errors that can occur during staff or customer authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] webshop_crm_core::EmailError),

    /// Unknown email, wrong password or disabled account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password does not meet the minimum length.
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    /// Customer has not confirmed their email address yet.
    #[error("Please verify your email address before logging in")]
    NotVerified,

    /// A portal account already exists for this email.
    #[error("An account with this email already exists")]
    AlreadyRegistered,

    /// Token is malformed, expired, or of the wrong kind.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Password hashing failed.
    #[error("password hashing failed")]
    PasswordHash,

    /// Token signing failed.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(e) => Self::BadRequest(e.to_string()),
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::NotVerified => Self::Forbidden(err.to_string()),
            AuthError::WeakPassword(_) | AuthError::AlreadyRegistered | AuthError::InvalidToken => {
                Self::BadRequest(err.to_string())
            }
            AuthError::PasswordHash | AuthError::Token(_) => Self::Internal(err.to_string()),
            AuthError::Repository(e) => Self::Database(e),
        }
    }
}
