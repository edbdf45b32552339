//! Staff user management.
//!
//! ```bash
//! crm-cli user create -e jan@example.nl -f Jan -l Jansen -p geheim123 -r manager
//! ```

use thiserror::Error;

use webshop_crm_core::{UserId, UserRole};
use webshop_crm_server::db::RepositoryError;
use webshop_crm_server::services::{
    AuthError,
    auth::{StaffRegistration, create_staff_account},
};

/// Errors that can occur while creating a user.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: admin, manager, user")]
    InvalidRole(String),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Create a staff user with an argon2-hashed password.
///
/// Returns the ID of the new user.
pub async fn create(
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let pool = super::connect().await?;

    tracing::info!("Creating user: {} ({})", email, role);

    let registration = StaffRegistration {
        email,
        password,
        first_name,
        last_name,
        role,
    };
    let user = match create_staff_account(&pool, &registration).await {
        Ok(user) => user,
        Err(AuthError::Repository(RepositoryError::Conflict(_))) => {
            return Err(UserError::UserExists(email.to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}
