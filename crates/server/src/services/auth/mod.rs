//! Staff and customer authentication.
//!
//! Passwords are hashed with Argon2id. Sessions are stateless HS256 tokens;
//! the `kind` claim separates staff sessions, customer portal sessions and
//! the single-purpose email verification and password reset links.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use webshop_crm_core::{CustomerId, Email, UserId, UserRole, WebshopId};

use crate::db::{CustomerRepository, UserRepository};
use crate::models::{Customer, NewCustomer, NewUser, User};

/// Minimum password length for staff and customers.
pub const MIN_PASSWORD_LENGTH: usize = 6;

const STAFF_TOKEN_HOURS: i64 = 24;
const CUSTOMER_TOKEN_DAYS: i64 = 7;
const VERIFY_TOKEN_HOURS: i64 = 24;
const RESET_TOKEN_HOURS: i64 = 1;
const OAUTH_STATE_MINUTES: i64 = 10;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Staff,
    Customer,
    Verify,
    Reset,
    /// `state` parameter of an OAuth authorization round trip.
    OAuth,
}

/// Token claims. `role` is only present on staff tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn new(sub: i64, email: &str, kind: TokenKind, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.to_string(),
            email: email.to_string(),
            role: None,
            first_name: String::new(),
            last_name: String::new(),
            kind,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }

    /// Numeric subject (user or customer id).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the subject is not a number.
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Signing and verification keys derived from `CRM_JWT_SECRET`.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys([REDACTED])")
    }
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Issue a 24 hour staff session token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn staff_token(&self, user: &User) -> Result<String, AuthError> {
        let mut claims = Claims::new(
            user.id.as_i64(),
            user.email.as_str(),
            TokenKind::Staff,
            Duration::hours(STAFF_TOKEN_HOURS),
        );
        claims.role = Some(user.role);
        claims.first_name.clone_from(&user.first_name);
        claims.last_name.clone_from(&user.last_name);
        self.sign(&claims)
    }

    /// Issue a 7 day customer portal token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn customer_token(&self, customer: &Customer) -> Result<String, AuthError> {
        let mut claims = Claims::new(
            customer.id.as_i64(),
            customer.email.as_str(),
            TokenKind::Customer,
            Duration::days(CUSTOMER_TOKEN_DAYS),
        );
        claims.first_name.clone_from(&customer.first_name);
        claims.last_name.clone_from(&customer.last_name);
        self.sign(&claims)
    }

    /// Issue an email verification token (24 hours).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn verification_token(&self, customer: &Customer) -> Result<String, AuthError> {
        self.sign(&Claims::new(
            customer.id.as_i64(),
            customer.email.as_str(),
            TokenKind::Verify,
            Duration::hours(VERIFY_TOKEN_HOURS),
        ))
    }

    /// Issue a password reset token (1 hour).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn reset_token(&self, customer: &Customer) -> Result<String, AuthError> {
        self.sign(&Claims::new(
            customer.id.as_i64(),
            customer.email.as_str(),
            TokenKind::Reset,
            Duration::hours(RESET_TOKEN_HOURS),
        ))
    }

    /// Issue the `state` parameter for an OAuth authorization request
    /// (10 minutes). The provider name travels in the `email` claim.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn oauth_state(&self, provider: &str) -> Result<String, AuthError> {
        self.sign(&Claims::new(
            0,
            provider,
            TokenKind::OAuth,
            Duration::minutes(OAUTH_STATE_MINUTES),
        ))
    }

    /// Check an OAuth `state` parameter issued for `provider`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the state is forged, expired or
    /// was issued for another provider.
    pub fn verify_oauth_state(&self, state: &str, provider: &str) -> Result<(), AuthError> {
        let claims = self.decode(state, TokenKind::OAuth)?;
        if claims.email != provider {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    /// Decode a token and check its kind.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the signature, expiry or kind
    /// does not check out.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| AuthError::InvalidToken)?
            .claims;

        if claims.kind != expected {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

// =============================================================================
// Staff
// =============================================================================

/// Staff registration input.
#[derive(Debug, Clone)]
pub struct StaffRegistration<'r> {
    pub email: &'r str,
    pub password: &'r str,
    pub first_name: &'r str,
    pub last_name: &'r str,
    pub role: UserRole,
}

/// Login created on an empty database.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@webshop.nl";
/// Password of [`DEFAULT_ADMIN_EMAIL`]. Change it after the first login.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

async fn create_staff_user(
    users: &UserRepository<'_>,
    registration: &StaffRegistration<'_>,
) -> Result<User, AuthError> {
    let email = Email::normalized(registration.email)?;
    validate_password(registration.password)?;
    let password_hash = hash_password(registration.password)?;

    Ok(users
        .create(&NewUser {
            email,
            password_hash,
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            role: registration.role,
        })
        .await?)
}

/// Create a staff account without signing it in.
///
/// # Errors
///
/// Same as [`StaffAuthService::register`].
pub async fn create_staff_account(
    pool: &SqlitePool,
    registration: &StaffRegistration<'_>,
) -> Result<User, AuthError> {
    create_staff_user(&UserRepository::new(pool), registration).await
}

/// Create the default admin account when no staff user exists yet.
///
/// Returns the new account, or `None` if users were already present.
///
/// # Errors
///
/// Returns `AuthError::Repository` if the users table cannot be read or written.
pub async fn ensure_default_admin(pool: &SqlitePool) -> Result<Option<User>, AuthError> {
    let users = UserRepository::new(pool);
    if users.count().await? > 0 {
        return Ok(None);
    }

    let admin = create_staff_user(
        &users,
        &StaffRegistration {
            email: DEFAULT_ADMIN_EMAIL,
            password: DEFAULT_ADMIN_PASSWORD,
            first_name: "Admin",
            last_name: "User",
            role: UserRole::Admin,
        },
    )
    .await?;
    Ok(Some(admin))
}

/// Staff account authentication.
pub struct StaffAuthService<'a> {
    users: UserRepository<'a>,
    keys: &'a TokenKeys,
}

impl<'a> StaffAuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, keys: &'a TokenKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            keys,
        }
    }

    /// Create a staff account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword`, or
    /// `AuthError::Repository` with a conflict if the email is taken.
    pub async fn register(
        &self,
        registration: &StaffRegistration<'_>,
    ) -> Result<(User, String), AuthError> {
        let user = create_staff_user(&self.users, registration).await?;
        let token = self.keys.staff_token(&user)?;
        Ok((user, token))
    }

    /// Check credentials and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email, a wrong
    /// password or an inactive account.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        let email = Email::normalized(email).map_err(|_| AuthError::InvalidCredentials)?;
        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        self.users.touch_last_login(user.id).await?;
        let token = self.keys.staff_token(&user)?;
        Ok((user, token))
    }

    /// Replace a password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong, or
    /// `AuthError::WeakPassword` if `new` is too short.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        validate_password(new)?;
        let password_hash = self.users.get_password_hash(user_id).await?;
        verify_password(current, &password_hash)?;

        let new_hash = hash_password(new)?;
        self.users.update_password_hash(user_id, &new_hash).await?;
        Ok(())
    }
}

// =============================================================================
// Customers
// =============================================================================

/// Customer portal registration input.
#[derive(Debug, Clone)]
pub struct CustomerRegistration<'r> {
    pub email: &'r str,
    pub password: &'r str,
    pub first_name: &'r str,
    pub last_name: &'r str,
    pub phone: Option<String>,
    pub webshop_id: Option<WebshopId>,
}

/// Customer portal account authentication.
pub struct CustomerAuthService<'a> {
    customers: CustomerRepository<'a>,
    keys: &'a TokenKeys,
}

impl<'a> CustomerAuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, keys: &'a TokenKeys) -> Self {
        Self {
            customers: CustomerRepository::new(pool),
            keys,
        }
    }

    /// Register a portal account. A CRM customer without a password is
    /// claimed; one that already has a password is rejected.
    ///
    /// Returns the customer and a verification token to email to them.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AlreadyRegistered` if the account exists.
    pub async fn register(
        &self,
        registration: CustomerRegistration<'_>,
    ) -> Result<(Customer, String), AuthError> {
        let email = Email::normalized(registration.email)?;
        validate_password(registration.password)?;
        let password_hash = hash_password(registration.password)?;

        let customer = match self.customers.find_credentials(&email).await? {
            Some(existing) if existing.password_hash.is_some() => {
                return Err(AuthError::AlreadyRegistered);
            }
            Some(existing) => {
                self.customers
                    .set_password(existing.customer.id, &password_hash)
                    .await?;
                existing.customer
            }
            None => {
                self.customers
                    .create_with_password(
                        &NewCustomer {
                            webshop_id: registration.webshop_id,
                            email,
                            first_name: registration.first_name.trim().to_string(),
                            last_name: registration.last_name.trim().to_string(),
                            phone: registration.phone,
                            address: None,
                            city: None,
                            postal_code: None,
                            country: "Nederland".to_string(),
                            tags: None,
                            notes: None,
                        },
                        &password_hash,
                    )
                    .await?
            }
        };

        let token = self.keys.verification_token(&customer)?;
        Ok((customer, token))
    }

    /// Check credentials and issue a portal token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` or `AuthError::NotVerified`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Customer, String), AuthError> {
        let email = Email::normalized(email).map_err(|_| AuthError::InvalidCredentials)?;
        let credentials = self
            .customers
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = credentials
            .password_hash
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        if !credentials.customer.is_verified {
            return Err(AuthError::NotVerified);
        }

        self.customers
            .touch_last_login(credentials.customer.id)
            .await?;
        let token = self.keys.customer_token(&credentials.customer)?;
        Ok((credentials.customer, token))
    }

    /// Confirm an email address from a verification link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for a bad or expired link.
    pub async fn verify_email(&self, token: &str) -> Result<CustomerId, AuthError> {
        let claims = self.keys.decode(token, TokenKind::Verify)?;
        let id = CustomerId::new(claims.subject_id()?);
        self.customers.mark_verified(id).await.map_err(|e| match e {
            crate::db::RepositoryError::NotFound => AuthError::InvalidToken,
            other => AuthError::Repository(other),
        })?;
        Ok(id)
    }

    /// A fresh verification token, if the customer exists and still needs one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn resend_verification(
        &self,
        email: &str,
    ) -> Result<Option<(Customer, String)>, AuthError> {
        let Ok(email) = Email::normalized(email) else {
            return Ok(None);
        };
        match self.customers.find_credentials(&email).await? {
            Some(c) if !c.customer.is_verified && c.password_hash.is_some() => {
                let token = self.keys.verification_token(&c.customer)?;
                Ok(Some((c.customer, token)))
            }
            _ => Ok(None),
        }
    }

    /// A password reset token, if the email belongs to a portal account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn forgot_password(
        &self,
        email: &str,
    ) -> Result<Option<(Customer, String)>, AuthError> {
        let Ok(email) = Email::normalized(email) else {
            return Ok(None);
        };
        match self.customers.find_credentials(&email).await? {
            Some(c) if c.password_hash.is_some() => {
                let token = self.keys.reset_token(&c.customer)?;
                Ok(Some((c.customer, token)))
            }
            _ => Ok(None),
        }
    }

    /// Set a new password from a reset link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::WeakPassword`.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        let claims = self.keys.decode(token, TokenKind::Reset)?;
        validate_password(password)?;
        let id = CustomerId::new(claims.subject_id()?);
        let password_hash = hash_password(password)?;
        self.customers
            .set_password(id, &password_hash)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => AuthError::InvalidToken,
                other => AuthError::Repository(other),
            })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(&SecretString::from("k9#Qv2$Lm7@Zp4!Xr8&Tn1^Wb6*Hd3%F"))
    }

    fn claims(kind: TokenKind, lifetime: Duration) -> Claims {
        Claims::new(7, "jan@shop.nl", kind, lifetime)
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("geheim123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("geheim123", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_oauth_state_bound_to_provider() {
        let keys = keys();
        let state = keys.oauth_state("google").unwrap();
        assert!(keys.verify_oauth_state(&state, "google").is_ok());
        assert!(keys.verify_oauth_state(&state, "meta").is_err());
        assert!(keys.verify_oauth_state("forged", "google").is_err());

        let staff = keys.sign(&claims(TokenKind::Staff, Duration::hours(1))).unwrap();
        assert!(keys.verify_oauth_state(&staff, "google").is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(validate_password("12345"), Err(AuthError::WeakPassword(6))));
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_token_round_trip() {
        let keys = keys();
        let token = keys.sign(&claims(TokenKind::Customer, Duration::days(7))).unwrap();
        let decoded = keys.decode(&token, TokenKind::Customer).unwrap();
        assert_eq!(decoded.subject_id().unwrap(), 7);
        assert_eq!(decoded.email, "jan@shop.nl");
    }

    #[test]
    fn test_token_kind_is_enforced() {
        let keys = keys();
        let token = keys.sign(&claims(TokenKind::Reset, Duration::hours(1))).unwrap();
        assert!(matches!(
            keys.decode(&token, TokenKind::Staff),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let token = keys.sign(&claims(TokenKind::Verify, Duration::hours(-2))).unwrap();
        assert!(matches!(
            keys.decode(&token, TokenKind::Verify),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = TokenKeys::new(&SecretString::from("Zx8!pQ3@vL6#mN1$rT4%wY7^bC2&dF5*"));
        let token = other.sign(&claims(TokenKind::Staff, Duration::hours(1))).unwrap();
        assert!(keys().decode(&token, TokenKind::Staff).is_err());
    }

    #[test]
    fn test_staff_role_omitted_from_customer_claims() {
        let json = serde_json::to_value(claims(TokenKind::Customer, Duration::days(1))).unwrap();
        assert!(json.get("role").is_none());
        assert_eq!(json["kind"], "customer");
    }

    #[tokio::test]
    async fn test_default_admin_created_once() {
        let pool = crate::db::create_memory_pool().await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let admin = ensure_default_admin(&pool).await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(ensure_default_admin(&pool).await.unwrap().is_none());

        let (user, _) = StaffAuthService::new(&pool, &keys())
            .login(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.id, admin.id);
    }
}
