//! Parcel carrier integration.
//!
//! [`Carrier`] is the seam between fulfillment and a parcel network. DHL is
//! the only network wired up: [`Dhl::from_credentials`] picks the HTTP client
//! when `dhl` credentials are configured and the local simulator otherwise.

pub mod address;
pub mod dhl;

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::config::CompanyAddress;
use crate::error::AppError;
use crate::services::integrations::Credentials;

pub use address::{Package, PackageOptions, ParsedAddress, parse_address};
pub use dhl::{DhlClient, DhlSimulator};

/// Errors from carrier APIs.
#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("carrier API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("carrier returned no shipment")]
    EmptyResponse,

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<CarrierError> for AppError {
    fn from(err: CarrierError) -> Self {
        Self::Integration(err.to_string())
    }
}

/// Everything a carrier needs to create a label.
#[derive(Debug, Clone)]
pub struct ShipmentRequest<'a> {
    pub reference: &'a str,
    pub sender: &'a CompanyAddress,
    pub receiver_name: String,
    pub receiver_email: String,
    pub receiver: ParsedAddress,
    pub country: String,
    pub package: Package,
    pub declared_value: Decimal,
}

/// A created label.
#[derive(Debug, Clone, Serialize)]
pub struct Shipment {
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub shipment_id: Option<String>,
    pub estimated_delivery: NaiveDate,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub description: String,
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub status: String,
    pub status_description: String,
    pub estimated_delivery: Option<NaiveDate>,
    pub events: Vec<TrackingEvent>,
}

/// A parcel network.
pub trait Carrier {
    /// Name stored with each shipment.
    fn name(&self) -> &'static str;

    fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> impl Future<Output = Result<Shipment, CarrierError>> + Send;

    fn track(
        &self,
        tracking_number: &str,
    ) -> impl Future<Output = Result<TrackingInfo, CarrierError>> + Send;
}

/// DHL, live or simulated.
#[derive(Debug, Clone)]
pub enum Dhl {
    Api(DhlClient),
    Simulated(DhlSimulator),
}

impl Dhl {
    /// Use the HTTP client when complete credentials are available.
    #[must_use]
    pub fn from_credentials(credentials: Option<&Credentials>) -> Self {
        match credentials.map(DhlClient::from_credentials) {
            Some(Ok(client)) => Self::Api(client),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Incomplete DHL credentials, using simulator");
                Self::Simulated(DhlSimulator)
            }
            None => Self::Simulated(DhlSimulator),
        }
    }

    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }
}

impl Carrier for Dhl {
    fn name(&self) -> &'static str {
        "DHL"
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> Result<Shipment, CarrierError> {
        match self {
            Self::Api(client) => client.create_shipment(request).await,
            Self::Simulated(sim) => sim.create_shipment(request).await,
        }
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo, CarrierError> {
        match self {
            Self::Api(client) => client.track(tracking_number).await,
            Self::Simulated(sim) => sim.track(tracking_number).await,
        }
    }
}
