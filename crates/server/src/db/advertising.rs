//! Advertising campaign and daily metric repository.
//!
//! Campaign totals (`spent`, `impressions`, ...) are always recomputed from
//! the `ad_metrics` rows after a metric is written, so they never drift.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, SqliteConnection};

use webshop_crm_core::{AdPlatform, CampaignId, CampaignStatus, UserId, money};

use super::{RepositoryError, conflict_on_unique, days_ago, parse_column, push_set};
use crate::models::{
    AdMetric, AdTotals, Campaign, CampaignComparison, CampaignListing, CampaignUpdate,
    DerivedMetrics, NewCampaign, PlatformPerformance, RemoteCampaign,
};

const CAMPAIGN_COLUMNS: &str = "ac.id, ac.name, ac.platform, ac.campaign_id, ac.status, ac.budget, \
     ac.spent, ac.impressions, ac.clicks, ac.conversions, ac.revenue, ac.created_by, \
     ac.created_at, ac.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    name: String,
    platform: String,
    campaign_id: Option<String>,
    status: String,
    budget: f64,
    spent: f64,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    revenue: f64,
    created_by: Option<i64>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = RepositoryError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CampaignId::new(row.id),
            name: row.name,
            platform: parse_column(&row.platform)?,
            campaign_id: row.campaign_id,
            status: parse_column(&row.status)?,
            budget: money::from_db(row.budget),
            spent: money::from_db(row.spent),
            impressions: row.impressions,
            clicks: row.clicks,
            conversions: row.conversions,
            revenue: money::from_db(row.revenue),
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignListingRow {
    #[sqlx(flatten)]
    campaign: CampaignRow,
    created_by_name: Option<String>,
}

impl TryFrom<CampaignListingRow> for CampaignListing {
    type Error = RepositoryError;

    fn try_from(row: CampaignListingRow) -> Result<Self, Self::Error> {
        let campaign: Campaign = row.campaign.try_into()?;
        let metrics = DerivedMetrics::compute(
            campaign.impressions,
            campaign.clicks,
            campaign.conversions,
            campaign.spent,
        );
        Ok(Self {
            campaign,
            metrics,
            created_by_name: row.created_by_name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MetricRow {
    date: NaiveDate,
    impressions: i64,
    clicks: i64,
    spent: f64,
    conversions: i64,
    revenue: f64,
}

impl From<MetricRow> for AdMetric {
    fn from(row: MetricRow) -> Self {
        Self {
            date: row.date,
            impressions: row.impressions,
            clicks: row.clicks,
            spent: money::from_db(row.spent),
            conversions: row.conversions,
            revenue: money::from_db(row.revenue),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ComparisonRow {
    id: i64,
    name: String,
    platform: String,
    impressions: i64,
    clicks: i64,
    spent: f64,
    conversions: i64,
    revenue: f64,
}

fn listing_select() -> String {
    format!(
        "SELECT {CAMPAIGN_COLUMNS}, u.first_name || ' ' || u.last_name AS created_by_name
         FROM ad_campaigns ac
         LEFT JOIN users u ON u.id = ac.created_by"
    )
}

fn collect_listings(rows: Vec<CampaignListingRow>) -> Result<Vec<CampaignListing>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

async fn upsert_metric_on(
    conn: &mut SqliteConnection,
    campaign_id: CampaignId,
    metric: &AdMetric,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO ad_metrics (campaign_id, date, impressions, clicks, spent, conversions, revenue)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (campaign_id, date) DO UPDATE SET
            impressions = excluded.impressions,
            clicks = excluded.clicks,
            spent = excluded.spent,
            conversions = excluded.conversions,
            revenue = excluded.revenue",
    )
    .bind(campaign_id)
    .bind(metric.date)
    .bind(metric.impressions)
    .bind(metric.clicks)
    .bind(money::to_db(metric.spent))
    .bind(metric.conversions)
    .bind(money::to_db(metric.revenue))
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE ad_campaigns SET
            spent = (SELECT COALESCE(SUM(spent), 0.0) FROM ad_metrics WHERE campaign_id = ?1),
            impressions = (SELECT COALESCE(SUM(impressions), 0) FROM ad_metrics WHERE campaign_id = ?1),
            clicks = (SELECT COALESCE(SUM(clicks), 0) FROM ad_metrics WHERE campaign_id = ?1),
            conversions = (SELECT COALESCE(SUM(conversions), 0) FROM ad_metrics WHERE campaign_id = ?1),
            revenue = (SELECT COALESCE(SUM(revenue), 0.0) FROM ad_metrics WHERE campaign_id = ?1),
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
    )
    .bind(campaign_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

pub struct AdvertisingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AdvertisingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Campaigns with derived metrics, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        platform: Option<AdPlatform>,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<CampaignListing>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(listing_select());
        qb.push(" WHERE 1 = 1");
        if let Some(platform) = platform {
            qb.push(" AND ac.platform = ").push_bind(platform);
        }
        if let Some(status) = status {
            qb.push(" AND ac.status = ").push_bind(status);
        }
        qb.push(" ORDER BY ac.created_at DESC, ac.id DESC");

        collect_listings(qb.build_query_as().fetch_all(self.pool).await?)
    }

    /// Get a campaign with derived metrics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CampaignId) -> Result<Option<CampaignListing>, RepositoryError> {
        let row = sqlx::query_as::<_, CampaignListingRow>(&format!(
            "{} WHERE ac.id = ?",
            listing_select()
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Most recent daily metrics of a campaign.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn metrics(
        &self,
        id: CampaignId,
        limit: i64,
    ) -> Result<Vec<AdMetric>, RepositoryError> {
        let rows = sqlx::query_as::<_, MetricRow>(
            "SELECT date, impressions, clicks, spent, conversions, revenue
             FROM ad_metrics WHERE campaign_id = ?
             ORDER BY date DESC LIMIT ?",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a campaign.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the platform campaign is already linked.
    pub async fn create(&self, campaign: &NewCampaign) -> Result<CampaignId, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO ad_campaigns (name, platform, campaign_id, budget, created_by)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&campaign.name)
        .bind(campaign.platform)
        .bind(&campaign.campaign_id)
        .bind(money::to_db(campaign.budget))
        .bind(campaign.created_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Campaign is already linked"))?;

        Ok(CampaignId::new(id))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the campaign does not exist.
    pub async fn update(
        &self,
        id: CampaignId,
        update: CampaignUpdate,
    ) -> Result<(), RepositoryError> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("UPDATE ad_campaigns SET updated_at = CURRENT_TIMESTAMP");
        push_set(&mut qb, "name", update.name);
        push_set(&mut qb, "budget", update.budget.map(money::to_db));
        push_set(&mut qb, "status", update.status);
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or replace one day of metrics and refresh the campaign totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the campaign does not exist.
    pub async fn upsert_metric(
        &self,
        id: CampaignId,
        metric: &AdMetric,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM ad_campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        upsert_metric_on(&mut *tx, id, metric).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or update a campaign reported by an ad platform, keyed on
    /// `(platform, external id)`, and record today's metrics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn upsert_remote(
        &self,
        platform: AdPlatform,
        remote: &RemoteCampaign,
        created_by: Option<UserId>,
    ) -> Result<CampaignId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO ad_campaigns (name, platform, campaign_id, status, budget, created_by)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (platform, campaign_id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                budget = excluded.budget,
                updated_at = CURRENT_TIMESTAMP
             RETURNING id",
        )
        .bind(&remote.name)
        .bind(platform)
        .bind(&remote.external_id)
        .bind(remote.status)
        .bind(money::to_db(remote.budget))
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let id = CampaignId::new(id);
        upsert_metric_on(&mut *tx, id, &remote.today).await?;
        tx.commit().await?;
        Ok(id)
    }

    // =========================================================================
    // Overview
    // =========================================================================

    /// Campaign counts plus spend, conversions and revenue of the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self, days: i64) -> Result<AdTotals, RepositoryError> {
        let (total_campaigns, active_campaigns, spend, conversions, revenue): (
            i64,
            i64,
            f64,
            i64,
            f64,
        ) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM ad_campaigns),
                (SELECT COUNT(*) FROM ad_campaigns WHERE status = 'active'),
                (SELECT COALESCE(SUM(spent), 0.0) FROM ad_metrics WHERE date >= date('now', ?1)),
                (SELECT COALESCE(SUM(conversions), 0) FROM ad_metrics WHERE date >= date('now', ?1)),
                (SELECT COALESCE(SUM(revenue), 0.0) FROM ad_metrics WHERE date >= date('now', ?1))",
        )
        .bind(days_ago(days))
        .fetch_one(self.pool)
        .await?;

        Ok(AdTotals {
            total_campaigns,
            active_campaigns,
            period_spend: money::from_db(spend),
            period_conversions: conversions,
            period_revenue: money::from_db(revenue),
        })
    }

    /// Lifetime performance per platform.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn platform_performance(&self) -> Result<Vec<PlatformPerformance>, RepositoryError> {
        let rows: Vec<(String, i64, f64, i64, i64, i64)> = sqlx::query_as(
            "SELECT platform, COUNT(*), COALESCE(SUM(spent), 0.0), COALESCE(SUM(impressions), 0),
                    COALESCE(SUM(clicks), 0), COALESCE(SUM(conversions), 0)
             FROM ad_campaigns GROUP BY platform ORDER BY platform",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(platform, campaigns, spent, impressions, clicks, conversions)| {
                    let spent = money::from_db(spent);
                    let derived = DerivedMetrics::compute(impressions, clicks, conversions, spent);
                    PlatformPerformance {
                        platform,
                        campaigns,
                        spent,
                        impressions,
                        clicks,
                        conversions,
                        ctr: derived.ctr,
                        cpc: derived.cpc,
                    }
                },
            )
            .collect())
    }

    /// Metric sums per day for the last `days` days, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_performance(&self, days: i64) -> Result<Vec<AdMetric>, RepositoryError> {
        let rows = sqlx::query_as::<_, MetricRow>(
            "SELECT date, COALESCE(SUM(impressions), 0) AS impressions,
                    COALESCE(SUM(clicks), 0) AS clicks, COALESCE(SUM(spent), 0.0) AS spent,
                    COALESCE(SUM(conversions), 0) AS conversions,
                    COALESCE(SUM(revenue), 0.0) AS revenue
             FROM ad_metrics
             WHERE date >= date('now', ?)
             GROUP BY date ORDER BY date DESC",
        )
        .bind(days_ago(days))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Campaigns with the most conversions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_by_conversions(
        &self,
        limit: i64,
    ) -> Result<Vec<CampaignListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, CampaignListingRow>(&format!(
            "{} WHERE ac.conversions > 0 ORDER BY ac.conversions DESC LIMIT ?",
            listing_select()
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        collect_listings(rows)
    }

    /// Metric sums of the given campaigns over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn compare(
        &self,
        ids: &[CampaignId],
        days: i64,
    ) -> Result<Vec<CampaignComparison>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT ac.id, ac.name, ac.platform,
                    COALESCE(SUM(am.impressions), 0) AS impressions,
                    COALESCE(SUM(am.clicks), 0) AS clicks,
                    COALESCE(SUM(am.spent), 0.0) AS spent,
                    COALESCE(SUM(am.conversions), 0) AS conversions,
                    COALESCE(SUM(am.revenue), 0.0) AS revenue
             FROM ad_campaigns ac
             LEFT JOIN ad_metrics am ON am.campaign_id = ac.id AND am.date >= date('now', ",
        );
        qb.push_bind(days_ago(days));
        qb.push(") WHERE ac.id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") GROUP BY ac.id, ac.name, ac.platform ORDER BY ac.id");

        let rows = qb
            .build_query_as::<ComparisonRow>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|r| -> Result<CampaignComparison, RepositoryError> {
                let spent = money::from_db(r.spent);
                let revenue = money::from_db(r.revenue);
                Ok(CampaignComparison {
                    id: CampaignId::new(r.id),
                    name: r.name,
                    platform: parse_column(&r.platform)?,
                    impressions: r.impressions,
                    clicks: r.clicks,
                    spent,
                    conversions: r.conversions,
                    revenue,
                    metrics: DerivedMetrics::compute(r.impressions, r.clicks, r.conversions, spent),
                    roas: money::ratio(revenue, spent),
                })
            })
            .collect()
    }
}
