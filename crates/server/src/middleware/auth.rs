//! Bearer token extractors.
//!
//! Staff routes take one of `RequireStaff`, `RequireManager` or
//! `RequireAdmin`; portal routes take `RequireCustomer`. Tokens are
//! stateless, so extraction never touches the database.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn delete_customer(
//!     RequireManager(user): RequireManager,
//!     Path(id): Path<CustomerId>,
//! ) -> Result<StatusCode, AppError> {
//!     // only admins and managers get here
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;

use webshop_crm_core::{CustomerId, UserId, UserRole};

use crate::error::{AppError, set_sentry_user};
use crate::services::{Claims, TokenKind};
use crate::state::AppState;

const TOKEN_REQUIRED: &str = "Access token required";
const TOKEN_INVALID: &str = "Invalid or expired token";

/// Authenticated staff member, taken from the token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
}

impl CurrentUser {
    fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let id = claims
            .subject_id()
            .map_err(|_| AppError::Unauthorized(TOKEN_INVALID.to_string()))?;
        Ok(Self {
            id: UserId::new(id),
            email: claims.email,
            role: claims.role.unwrap_or_default(),
            first_name: claims.first_name,
            last_name: claims.last_name,
        })
    }
}

/// Authenticated portal customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: String,
}

/// Pull the raw token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(TOKEN_REQUIRED.to_string()))
}

fn staff_user(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let token = bearer_token(parts)?;
    let claims = state
        .keys()
        .decode(token, TokenKind::Staff)
        .map_err(|_| AppError::Unauthorized(TOKEN_INVALID.to_string()))?;
    let user = CurrentUser::from_claims(claims)?;
    set_sentry_user(user.id.as_i64(), Some(&user.email));
    Ok(user)
}

/// Any authenticated staff member.
#[derive(Debug, Clone)]
pub struct RequireStaff(pub CurrentUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        staff_user(parts, state).map(Self)
    }
}

/// Staff with role `admin` or `manager`.
#[derive(Debug, Clone)]
pub struct RequireManager(pub CurrentUser);

impl FromRequestParts<AppState> for RequireManager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = staff_user(parts, state)?;
        if !user.role.is_manager() {
            return Err(AppError::Forbidden("Insufficient permissions".to_string()));
        }
        Ok(Self(user))
    }
}

/// Staff with role `admin`.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = staff_user(parts, state)?;
        if user.role != UserRole::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Customer portal session. Staff tokens are refused with 403.
#[derive(Debug, Clone)]
pub struct RequireCustomer(pub CurrentCustomer);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = state.keys();

        let claims = match keys.decode(token, TokenKind::Customer) {
            Ok(claims) => claims,
            Err(_) if keys.decode(token, TokenKind::Staff).is_ok() => {
                return Err(AppError::Forbidden(
                    "Customer access required".to_string(),
                ));
            }
            Err(_) => return Err(AppError::Unauthorized(TOKEN_INVALID.to_string())),
        };

        let id = claims
            .subject_id()
            .map_err(|_| AppError::Unauthorized(TOKEN_INVALID.to_string()))?;
        Ok(Self(CurrentCustomer {
            id: CustomerId::new(id),
            email: claims.email,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/customers");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).ok(), Some("abc.def.ghi"));

        assert!(matches!(
            bearer_token(&parts_with(None)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts_with(Some("Basic dXNlcg=="))),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts_with(Some("Bearer "))),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_current_user_from_claims() {
        let claims = Claims {
            sub: "7".to_string(),
            email: "jan@webshop.nl".to_string(),
            role: Some(UserRole::Manager),
            first_name: "Jan".to_string(),
            last_name: "Jansen".to_string(),
            kind: TokenKind::Staff,
            iat: 0,
            exp: 0,
        };

        let user = CurrentUser::from_claims(claims).expect("valid claims");
        assert_eq!(user.id, UserId::new(7));
        assert_eq!(user.role, UserRole::Manager);
    }
}
