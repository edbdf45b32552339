//! Ad platform clients and campaign sync.
//!
//! Each platform implements [`AdPlatformClient`], which reports the account's
//! campaigns together with today's figures. [`sync_campaigns`] writes them
//! into `ad_campaigns`/`ad_metrics`, keyed on the platform's campaign id.

pub mod google;
pub mod meta;

use std::future::Future;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Deserializer};
use sqlx::SqlitePool;
use thiserror::Error;

use webshop_crm_core::{AdPlatform, UserId, money};

use crate::db::{AdvertisingRepository, RepositoryError};
use crate::error::AppError;
use crate::models::RemoteCampaign;

pub use google::GoogleAdsClient;
pub use meta::MetaAdsClient;

/// Errors from ad platform APIs.
#[derive(Debug, Error)]
pub enum AdsError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with an error status.
    #[error("{platform} API error ({status}): {message}")]
    Api {
        platform: AdPlatform,
        status: u16,
        message: String,
    },

    /// A required credential is missing.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<AdsError> for AppError {
    fn from(err: AdsError) -> Self {
        Self::Integration(err.to_string())
    }
}

/// A remote advertising account.
pub trait AdPlatformClient {
    fn platform(&self) -> AdPlatform;

    /// All campaigns of the account with today's metrics.
    fn fetch_campaigns(&self) -> impl Future<Output = Result<Vec<RemoteCampaign>, AdsError>> + Send;
}

/// Errors from [`sync_campaigns`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Ads(#[from] AdsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Ads(e) => e.into(),
            SyncError::Repository(e) => Self::Database(e),
        }
    }
}

/// Fetch the platform's campaigns and upsert them. Returns the number of
/// campaigns written.
///
/// # Errors
///
/// Returns `SyncError` if the platform call or a database write fails.
pub async fn sync_campaigns<C: AdPlatformClient + Sync>(
    pool: &SqlitePool,
    client: &C,
    synced_by: Option<UserId>,
) -> Result<usize, SyncError> {
    let campaigns = client.fetch_campaigns().await?;
    let repo = AdvertisingRepository::new(pool);

    for campaign in &campaigns {
        repo.upsert_remote(client.platform(), campaign, synced_by)
            .await?;
    }

    tracing::info!(
        platform = %client.platform(),
        campaigns = campaigns.len(),
        "Synced ad campaigns"
    );
    Ok(campaigns.len())
}

/// Accepts a JSON number or a numeric string. Both ad APIs send 64-bit
/// counters as strings.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(v)) => v,
        Some(Raw::Float(v)) => round_to_i64(v),
        Some(Raw::Text(s)) => s
            .parse::<i64>()
            .unwrap_or_else(|_| s.parse::<f64>().map_or(0, round_to_i64)),
        None => 0,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i64(value: f64) -> i64 {
    value.round() as i64
}

/// Accepts a JSON number or numeric string as a decimal amount.
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(v)) => Decimal::from_f64(v).unwrap_or_default(),
        Some(Raw::Text(s)) => s.parse().unwrap_or_default(),
        None => Decimal::ZERO,
    })
}

/// Convert a micro-unit amount (1/1,000,000) to currency.
fn from_micros(micros: i64) -> Decimal {
    money::round2(Decimal::new(micros, 6))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "lenient_i64")]
        count: i64,
        #[serde(default, deserialize_with = "lenient_decimal")]
        amount: Decimal,
    }

    #[test]
    fn test_lenient_numbers() {
        let s: Sample = serde_json::from_str(r#"{"count": "1234", "amount": "12.50"}"#).unwrap();
        assert_eq!(s.count, 1234);
        assert_eq!(s.amount, dec!(12.50));

        let s: Sample = serde_json::from_str(r#"{"count": 7, "amount": 3.25}"#).unwrap();
        assert_eq!(s.count, 7);
        assert_eq!(s.amount, dec!(3.25));

        let s: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(s.count, 0);
        assert_eq!(s.amount, Decimal::ZERO);
    }

    #[test]
    fn test_from_micros() {
        assert_eq!(from_micros(12_345_678), dec!(12.35));
        assert_eq!(from_micros(0), Decimal::ZERO);
    }
}
