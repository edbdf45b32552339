//! Advertising campaign routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{AdPlatform, CampaignId, CampaignStatus, money};

use crate::{
    db::AdvertisingRepository,
    error::{AppError, MissingExt, NotFoundExt, Validator},
    middleware::{CurrentUser, RequireManager, RequireStaff},
    models::{
        AdMetric, AdTotals, CampaignComparison, CampaignListing, CampaignUpdate, NewCampaign,
        PlatformPerformance,
    },
    services::{
        ads::{AdPlatformClient, AdsError, GoogleAdsClient, MetaAdsClient, sync_campaigns},
        integrations::{Credentials, Platform},
    },
    state::AppState,
};

use super::{JsonBody, MessageResponse, PeriodQuery};

const CAMPAIGN_METRIC_DAYS: i64 = 30;
const OVERVIEW_DAILY_DAYS: i64 = 7;
const OVERVIEW_TOP_CAMPAIGNS: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list).post(create))
        .route("/campaigns/{id}", get(show).put(update))
        .route("/campaigns/{id}/metrics", post(add_metrics))
        .route("/overview", get(overview))
        .route("/sync/google", post(sync_google))
        .route("/sync/meta", post(sync_meta))
        .route("/compare", get(compare))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub platform: Option<AdPlatform>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub platform: AdPlatform,
    pub campaign_id: Option<String>,
    pub budget: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub budget: Option<Decimal>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub spent: Decimal,
    #[serde(default)]
    pub conversions: i64,
    #[serde(default)]
    pub revenue: Decimal,
}

impl MetricsRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .check(self.impressions >= 0, "impressions", "impressions must be at least 0")
            .check(self.clicks >= 0, "clicks", "clicks must be at least 0")
            .check(
                money::is_amount(self.spent),
                "spent",
                "spent must be between 0 and 1000000000",
            )
            .check(self.conversions >= 0, "conversions", "conversions must be at least 0")
            .check(
                money::is_amount(self.revenue),
                "revenue",
                "revenue must be between 0 and 1000000000",
            )
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub campaign_ids: Option<String>,
    pub period: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CampaignsResponse {
    pub campaigns: Vec<CampaignListing>,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: CampaignListing,
    pub metrics: Vec<AdMetric>,
}

#[derive(Debug, Serialize)]
pub struct CreateCampaignResponse {
    pub message: &'static str,
    pub campaign_id: CampaignId,
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub period_days: i64,
    pub totals: AdTotals,
    pub platform_performance: Vec<PlatformPerformance>,
    pub daily_performance: Vec<AdMetric>,
    pub top_campaigns: Vec<CampaignListing>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResponse {
    Synced {
        platform: &'static str,
        campaigns: usize,
    },
    NotConfigured {
        platform: &'static str,
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub period_days: i64,
    pub campaigns: Vec<CampaignComparison>,
}

/// Parse a comma-separated list of campaign ids.
fn parse_ids(raw: Option<&str>) -> Result<Vec<CampaignId>, AppError> {
    let invalid =
        || AppError::BadRequest("campaign_ids must be a comma-separated list of ids".to_string());
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .ok()
                .filter(|id| *id >= 1)
                .map(CampaignId::new)
                .ok_or_else(invalid)
        })
        .collect()
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CampaignsResponse>, AppError> {
    let campaigns = AdvertisingRepository::new(state.pool())
        .list(query.platform, query.status)
        .await?;
    Ok(Json(CampaignsResponse { campaigns }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
) -> Result<Json<CampaignDetail>, AppError> {
    let repo = AdvertisingRepository::new(state.pool());
    let campaign = repo.get(id).await.or_not_found("Campaign")?;
    let metrics = repo.metrics(id, CAMPAIGN_METRIC_DAYS).await?;

    Ok(Json(CampaignDetail { campaign, metrics }))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, platform = %body.platform))]
async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CreateCampaignResponse>), AppError> {
    Validator::new()
        .required(&body.name, "name")
        .check(
            money::is_amount(body.budget),
            "budget",
            "budget must be between 0 and 1000000000",
        )
        .finish()?;

    let campaign_id = AdvertisingRepository::new(state.pool())
        .create(&NewCampaign {
            name: body.name.trim().to_string(),
            platform: body.platform,
            campaign_id: body.campaign_id.filter(|id| !id.trim().is_empty()),
            budget: body.budget,
            created_by: Some(user.id),
        })
        .await?;

    info!(campaign_id = %campaign_id, "Campaign created");
    Ok((
        StatusCode::CREATED,
        Json(CreateCampaignResponse {
            message: "Campaign created successfully",
            campaign_id,
        }),
    ))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
    JsonBody(body): JsonBody<UpdateCampaignRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    Validator::new()
        .check(
            body.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
            "name",
            "name cannot be empty",
        )
        .check(
            body.budget.is_none_or(money::is_amount),
            "budget",
            "budget must be between 0 and 1000000000",
        )
        .finish()?;

    let update = CampaignUpdate {
        name: body.name.map(|n| n.trim().to_string()),
        budget: body.budget,
        status: body.status,
    };
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    AdvertisingRepository::new(state.pool())
        .update(id, update)
        .await
        .missing_as("Campaign")?;

    info!(campaign_id = %id, "Campaign updated");
    Ok(Json(MessageResponse::new("Campaign updated successfully")))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id, date = %body.date))]
async fn add_metrics(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
    JsonBody(body): JsonBody<MetricsRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    body.validate()?;

    let metric = AdMetric {
        date: body.date,
        impressions: body.impressions,
        clicks: body.clicks,
        spent: body.spent,
        conversions: body.conversions,
        revenue: body.revenue,
    };
    AdvertisingRepository::new(state.pool())
        .upsert_metric(id, &metric)
        .await
        .missing_as("Campaign")?;

    info!(campaign_id = %id, "Campaign metrics recorded");
    Ok(Json(MessageResponse::new("Metrics added successfully")))
}

#[instrument(skip(_staff, state))]
async fn overview(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<Overview>, AppError> {
    let days = period.days();
    let repo = AdvertisingRepository::new(state.pool());

    Ok(Json(Overview {
        period_days: days,
        totals: repo.totals(days).await?,
        platform_performance: repo.platform_performance().await?,
        daily_performance: repo.daily_performance(OVERVIEW_DAILY_DAYS).await?,
        top_campaigns: repo.top_by_conversions(OVERVIEW_TOP_CAMPAIGNS).await?,
    }))
}

async fn sync_platform<C, F>(
    state: &AppState,
    user: &CurrentUser,
    platform: Platform,
    build: F,
) -> Result<Json<SyncResponse>, AppError>
where
    C: AdPlatformClient + Sync,
    F: FnOnce(&Credentials) -> Result<C, AdsError>,
{
    let Some(credentials) = state
        .integrations()
        .configured(state.pool(), platform)
        .await?
    else {
        info!(platform = platform.as_str(), "Ad platform not configured, skipping sync");
        return Ok(Json(SyncResponse::NotConfigured {
            platform: platform.as_str(),
            message: format!("{} credentials are not configured", platform.display_name()),
        }));
    };

    let client = build(credentials.as_ref())?;
    let campaigns = sync_campaigns(state.pool(), &client, Some(user.id)).await?;

    Ok(Json(SyncResponse::Synced {
        platform: platform.as_str(),
        campaigns,
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn sync_google(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    sync_platform(&state, &user, Platform::GoogleAds, GoogleAdsClient::from_credentials).await
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn sync_meta(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    sync_platform(&state, &user, Platform::MetaAds, MetaAdsClient::from_credentials).await
}

#[instrument(skip(_staff, state))]
async fn compare(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, AppError> {
    let ids = parse_ids(query.campaign_ids.as_deref())?;
    let days = PeriodQuery {
        period: query.period,
    }
    .days();

    let campaigns = AdvertisingRepository::new(state.pool())
        .compare(&ids, days)
        .await?;
    Ok(Json(CompareResponse {
        period_days: days,
        campaigns,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        let ids = parse_ids(Some("1, 2,3")).expect("valid ids");
        assert_eq!(ids, vec![CampaignId::new(1), CampaignId::new(2), CampaignId::new(3)]);
    }

    #[test]
    fn test_parse_ids_rejects_garbage() {
        assert!(parse_ids(None).is_err());
        assert!(parse_ids(Some("")).is_err());
        assert!(parse_ids(Some("1,abc")).is_err());
        assert!(parse_ids(Some("0")).is_err());
    }

    #[test]
    fn test_negative_metrics_rejected() {
        let body = MetricsRequest {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
            impressions: 100,
            clicks: -1,
            spent: Decimal::ONE,
            conversions: 0,
            revenue: Decimal::ZERO,
        };
        let Err(AppError::Validation(errors)) = body.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].field, "clicks");
    }

    #[test]
    fn test_sync_response_shape() {
        let body = serde_json::to_value(SyncResponse::Synced {
            platform: "google_ads",
            campaigns: 3,
        })
        .expect("serializable");
        assert_eq!(body["status"], "synced");
        assert_eq!(body["campaigns"], 3);
    }
}
