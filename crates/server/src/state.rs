//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::live::LiveHub;
use crate::services::{EmailService, IntegrationSettings, TokenKeys};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: SqlitePool,
    keys: TokenKeys,
    integrations: IntegrationSettings,
    email: EmailService,
    live: LiveHub,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: AppConfig, pool: SqlitePool) -> Result<Self, SmtpError> {
        let keys = TokenKeys::new(&config.jwt_secret);
        let email = EmailService::new(config.email.as_ref(), &config.company.name)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                keys,
                integrations: IntegrationSettings::new(),
                email,
                live: LiveHub::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// JWT signing and verification keys.
    #[must_use]
    pub fn keys(&self) -> &TokenKeys {
        &self.inner.keys
    }

    /// Cached integration credentials.
    #[must_use]
    pub fn integrations(&self) -> &IntegrationSettings {
        &self.inner.integrations
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Live session relay.
    #[must_use]
    pub fn live(&self) -> &LiveHub {
        &self.inner.live
    }
}
