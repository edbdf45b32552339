//! DHL parcel API client and offline simulator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::instrument;

use super::address::estimated_delivery;
use super::{Carrier, CarrierError, Shipment, ShipmentRequest, TrackingEvent, TrackingInfo};
use crate::services::integrations::Credentials;

const PRODUCTION_URL: &str = "https://api-eu.dhl.com";
const SANDBOX_URL: &str = "https://api-sandbox.dhl.com";

/// Refresh the access token this long before DHL expires it.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// HTTP client for the DHL parcel API.
#[derive(Clone)]
pub struct DhlClient {
    inner: Arc<DhlClientInner>,
}

struct DhlClientInner {
    http: reqwest::Client,
    base_url: &'static str,
    api_key: String,
    api_secret: String,
    account_number: String,
    token: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl std::fmt::Debug for DhlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhlClient")
            .field("base_url", &self.inner.base_url)
            .field("account_number", &self.inner.account_number)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

const fn default_expiry() -> u64 {
    3600
}

#[derive(Deserialize)]
struct ShipmentsResponse {
    #[serde(default)]
    shipments: Vec<CreatedShipment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedShipment {
    shipment_tracking_number: String,
    #[serde(default)]
    documents: Vec<ShipmentDocument>,
    #[serde(default)]
    estimated_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    shipment_charges: Vec<ShipmentCharge>,
    #[serde(default)]
    dispatch_confirmation_number: Option<String>,
}

#[derive(Deserialize)]
struct ShipmentDocument {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ShipmentCharge {
    amount: f64,
}

#[derive(Deserialize)]
struct TrackResponse {
    #[serde(default)]
    shipments: Vec<TrackedShipment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackedShipment {
    status: TrackedStatus,
    #[serde(default)]
    estimated_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    events: Vec<TrackedEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackedStatus {
    status_code: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackedEvent {
    timestamp: chrono::DateTime<Utc>,
    #[serde(default)]
    location: Option<TrackedLocation>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status_code: String,
}

#[derive(Deserialize)]
struct TrackedLocation {
    address: Option<TrackedAddress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackedAddress {
    address_locality: Option<String>,
}

impl DhlClient {
    /// Build a client from resolved `dhl` credentials. `environment =
    /// production` selects the live API, anything else the sandbox.
    ///
    /// # Errors
    ///
    /// Returns `CarrierError::MissingCredential` if a required key is absent.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, CarrierError> {
        let get = |key: &'static str| {
            credentials
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or(CarrierError::MissingCredential(key))
        };

        let base_url = match credentials.get("environment").map(String::as_str) {
            Some("production") => PRODUCTION_URL,
            _ => SANDBOX_URL,
        };

        Ok(Self {
            inner: Arc::new(DhlClientInner {
                http: reqwest::Client::new(),
                base_url,
                api_key: get("api_key")?,
                api_secret: get("api_secret")?,
                account_number: get("account_number")?,
                token: RwLock::new(None),
            }),
        })
    }

    async fn access_token(&self) -> Result<String, CarrierError> {
        {
            let token = self.inner.token.read().await;
            if let Some(token) = token.as_ref()
                && token.expires_at > Instant::now()
            {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .inner
            .http
            .post(format!("{}/auth/v1/validate", self.inner.base_url))
            .json(&serde_json::json!({
                "apiKey": self.inner.api_key,
                "apiSecret": self.inner.api_secret,
            }))
            .send()
            .await?;
        let auth: AuthResponse = check(response).await?.json().await?;

        let lifetime = Duration::from_secs(auth.expires_in).saturating_sub(TOKEN_MARGIN);
        *self.inner.token.write().await = Some(CachedToken {
            access_token: auth.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        tracing::debug!("DHL access token refreshed");
        Ok(auth.access_token)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, CarrierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(CarrierError::Api {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

impl Carrier for DhlClient {
    fn name(&self) -> &'static str {
        "DHL"
    }

    #[instrument(skip(self, request), fields(reference = %request.reference))]
    async fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> Result<Shipment, CarrierError> {
        let token = self.access_token().await?;
        let sender = request.sender;
        let body = serde_json::json!({
            "plannedShippingDateAndTime": Utc::now().to_rfc3339(),
            "pickup": { "isRequested": false },
            "productCode": "N",
            "accounts": [{ "typeCode": "shipper", "number": self.inner.account_number }],
            "customerDetails": {
                "shipperDetails": {
                    "postalAddress": {
                        "postalCode": sender.postal_code,
                        "cityName": sender.city,
                        "countryCode": sender.country,
                        "addressLine1": format!("{} {}", sender.street, sender.house_number),
                    },
                    "contactInformation": { "companyName": sender.name, "fullName": sender.name },
                },
                "receiverDetails": {
                    "postalAddress": {
                        "postalCode": request.receiver.postal_code,
                        "cityName": request.receiver.city,
                        "countryCode": request.country,
                        "addressLine1": format!(
                            "{} {}", request.receiver.street, request.receiver.house_number
                        ),
                    },
                    "contactInformation": {
                        "email": request.receiver_email,
                        "fullName": request.receiver_name,
                    },
                },
            },
            "content": {
                "packages": [{
                    "weight": request.package.weight_grams,
                    "dimensions": {
                        "length": request.package.length_cm,
                        "width": request.package.width_cm,
                        "height": request.package.height_cm,
                    },
                }],
                "isCustomsDeclarable": request.country != "NL",
                "declaredValue": request.declared_value,
                "declaredValueCurrency": "EUR",
                "description": format!("Webshop order {}", request.reference),
                "incoterms": "DAP",
            },
            "outputImageProperties": {
                "imageOptions": [{ "typeCode": "label", "isRequested": true }],
            },
        });

        let response = self
            .inner
            .http
            .post(format!("{}/shipments/v1/shipments", self.inner.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: ShipmentsResponse = check(response).await?.json().await?;
        let shipment = created
            .shipments
            .into_iter()
            .next()
            .ok_or(CarrierError::EmptyResponse)?;

        Ok(Shipment {
            label_url: shipment.documents.into_iter().find_map(|d| d.url),
            shipment_id: shipment.dispatch_confirmation_number,
            estimated_delivery: shipment.estimated_delivery_date.unwrap_or_else(|| {
                estimated_delivery(&request.country, Utc::now().date_naive())
            }),
            cost: shipment
                .shipment_charges
                .first()
                .and_then(|c| Decimal::from_f64(c.amount))
                .map_or_else(|| request.package.shipping_cost(), webshop_crm_core::money::round2),
            tracking_number: shipment.shipment_tracking_number,
        })
    }

    #[instrument(skip(self))]
    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo, CarrierError> {
        let token = self.access_token().await?;
        let response = self
            .inner
            .http
            .get(format!("{}/track/shipments", self.inner.base_url))
            .query(&[("trackingNumber", tracking_number)])
            .bearer_auth(token)
            .send()
            .await?;
        let tracked: TrackResponse = check(response).await?.json().await?;
        let shipment = tracked
            .shipments
            .into_iter()
            .next()
            .ok_or(CarrierError::EmptyResponse)?;

        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status: shipment.status.status_code,
            status_description: shipment.status.status,
            estimated_delivery: shipment.estimated_delivery_date,
            events: shipment
                .events
                .into_iter()
                .map(|e| TrackingEvent {
                    timestamp: e.timestamp,
                    location: e
                        .location
                        .and_then(|l| l.address)
                        .and_then(|a| a.address_locality),
                    description: e.description,
                    status_code: e.status_code,
                })
                .collect(),
        })
    }
}

/// Offline stand-in used when no DHL account is configured. Produces
/// plausible labels and a fixed two-step tracking history.
#[derive(Debug, Clone, Copy, Default)]
pub struct DhlSimulator;

impl DhlSimulator {
    fn tracking_number(now_millis: i64) -> String {
        let suffix: u16 = rand::rng().random_range(0..1000);
        format!("DHL{now_millis}{suffix:03}")
    }
}

impl Carrier for DhlSimulator {
    fn name(&self) -> &'static str {
        "DHL"
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest<'_>,
    ) -> Result<Shipment, CarrierError> {
        let now = Utc::now();
        let shipment = Shipment {
            tracking_number: Self::tracking_number(now.timestamp_millis()),
            label_url: Some(format!(
                "https://labels.dhl-simulator.local/{}.pdf",
                request.reference
            )),
            shipment_id: Some(format!("SHIP_{}", now.timestamp_millis())),
            estimated_delivery: estimated_delivery(&request.country, now.date_naive()),
            cost: request.package.shipping_cost(),
        };

        tracing::info!(
            reference = %request.reference,
            tracking_number = %shipment.tracking_number,
            "Simulated DHL shipment created"
        );
        Ok(shipment)
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo, CarrierError> {
        let now = Utc::now();
        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status: "in_transit".to_string(),
            status_description: "Pakket is onderweg naar de ontvanger".to_string(),
            estimated_delivery: Some(estimated_delivery("NL", now.date_naive())),
            events: vec![
                TrackingEvent {
                    timestamp: now,
                    location: Some("Amsterdam Sorteercentrum".to_string()),
                    description: "Pakket is aangekomen in sorteercentrum".to_string(),
                    status_code: "arrived_at_facility".to_string(),
                },
                TrackingEvent {
                    timestamp: now - chrono::Duration::hours(2),
                    location: Some("Webshop".to_string()),
                    description: "Pakket is opgehaald door DHL".to_string(),
                    status_code: "picked_up".to_string(),
                },
            ],
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CompanyAddress;
    use crate::services::carrier::{Package, PackageOptions, parse_address};

    fn request<'a>(sender: &'a CompanyAddress) -> ShipmentRequest<'a> {
        ShipmentRequest {
            reference: "ORD-1001",
            sender,
            receiver_name: "Jan de Vries".to_string(),
            receiver_email: "jan@shop.nl".to_string(),
            receiver: parse_address("Kalverstraat 1, 1012 AB Amsterdam"),
            country: "NL".to_string(),
            package: Package::from(PackageOptions::default()),
            declared_value: Decimal::ONE_HUNDRED,
        }
    }

    #[tokio::test]
    async fn test_simulated_shipment() {
        let sender = CompanyAddress::default();
        let shipment = DhlSimulator.create_shipment(&request(&sender)).await.unwrap();

        assert!(shipment.tracking_number.starts_with("DHL"));
        assert!(shipment.tracking_number.len() > 16);
        assert!(shipment.shipment_id.unwrap().starts_with("SHIP_"));
        assert!(shipment.label_url.unwrap().ends_with("ORD-1001.pdf"));
        assert_eq!(
            shipment.estimated_delivery,
            Utc::now().date_naive() + chrono::Days::new(1)
        );
    }

    #[tokio::test]
    async fn test_simulated_tracking() {
        let info = DhlSimulator.track("DHL123").await.unwrap();
        assert_eq!(info.status, "in_transit");
        assert_eq!(info.events.len(), 2);
    }

    #[test]
    fn test_client_requires_credentials() {
        let creds: Credentials = [("api_key".to_string(), "k".to_string())]
            .into_iter()
            .collect();
        assert!(matches!(
            DhlClient::from_credentials(&creds),
            Err(CarrierError::MissingCredential("api_secret"))
        ));
    }

    #[test]
    fn test_environment_selects_base_url() {
        let creds: Credentials = [
            ("api_key", "k"),
            ("api_secret", "s"),
            ("account_number", "123"),
            ("environment", "production"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let client = DhlClient::from_credentials(&creds).unwrap();
        assert_eq!(client.inner.base_url, PRODUCTION_URL);
    }
}
