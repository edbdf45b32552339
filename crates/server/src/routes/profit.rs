//! Profit analysis routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::SnapshotId;

use crate::{
    db::ProfitRepository,
    error::AppError,
    middleware::{RequireManager, RequireStaff},
    models::ProfitSnapshot,
    services::profit::{
        BreakEven, Period, PeriodComparison, ProfitAnalysis, ProfitService, ProfitSummary,
    },
    state::AppState,
};

use super::{DEFAULT_PERIOD_DAYS, JsonBody, PeriodQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analysis", get(analysis))
        .route("/comparison", get(comparison))
        .route("/break-even", get(break_even))
        .route("/snapshot", post(snapshot))
        .route("/snapshots", get(snapshots))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub current_start: Option<NaiveDate>,
    pub current_end: Option<NaiveDate>,
    pub previous_start: Option<NaiveDate>,
    pub previous_end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub message: &'static str,
    pub snapshot_id: SnapshotId,
    pub summary: ProfitSummary,
}

#[derive(Debug, Serialize)]
pub struct SnapshotsResponse {
    pub snapshots: Vec<ProfitSnapshot>,
}

fn period(start: NaiveDate, end: NaiveDate) -> Result<Period, AppError> {
    if end < start {
        return Err(AppError::BadRequest(
            "end date cannot be before start date".to_string(),
        ));
    }
    Ok(Period::new(start, end))
}

impl AnalysisQuery {
    /// Requested period, or the trailing default window ending today.
    fn period(&self) -> Result<Period, AppError> {
        let today = Utc::now().date_naive();
        match (self.start_date, self.end_date) {
            (None, None) => Ok(Period::trailing(DEFAULT_PERIOD_DAYS, today)),
            (Some(start), end) => period(start, end.unwrap_or(today)),
            (None, Some(end)) => Ok(Period::trailing(DEFAULT_PERIOD_DAYS, end)),
        }
    }
}

impl ComparisonQuery {
    fn periods(&self) -> Result<(Period, Period), AppError> {
        let (Some(cs), Some(ce), Some(ps), Some(pe)) = (
            self.current_start,
            self.current_end,
            self.previous_start,
            self.previous_end,
        ) else {
            return Err(AppError::BadRequest(
                "current_start, current_end, previous_start and previous_end are required"
                    .to_string(),
            ));
        };
        Ok((period(cs, ce)?, period(ps, pe)?))
    }
}

#[instrument(skip(_staff, state))]
async fn analysis(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<ProfitAnalysis>, AppError> {
    let period = query.period()?;
    let analysis = ProfitService::new(state.pool()).analysis(period).await?;
    Ok(Json(analysis))
}

#[instrument(skip(_staff, state))]
async fn comparison(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ComparisonQuery>,
) -> Result<Json<PeriodComparison>, AppError> {
    let (current, previous) = query.periods()?;
    let comparison = ProfitService::new(state.pool())
        .comparison(current, previous)
        .await?;
    Ok(Json(comparison))
}

#[instrument(skip(_staff, state))]
async fn break_even(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<BreakEven>, AppError> {
    let report = ProfitService::new(state.pool())
        .break_even(query.days())
        .await?;
    Ok(Json(report))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn snapshot(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SnapshotRequest>,
) -> Result<(StatusCode, Json<SnapshotResponse>), AppError> {
    let period = period(body.period_start, body.period_end)?;
    let (snapshot, summary) = ProfitService::new(state.pool())
        .snapshot(period, Some(user.id))
        .await?;

    info!(snapshot_id = %snapshot.id, "Profit snapshot created");
    Ok((
        StatusCode::CREATED,
        Json(SnapshotResponse {
            message: "Profit snapshot saved successfully",
            snapshot_id: snapshot.id,
            summary,
        }),
    ))
}

#[instrument(skip(_staff, state))]
async fn snapshots(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<SnapshotsResponse>, AppError> {
    let snapshots = ProfitRepository::new(state.pool()).list_snapshots().await?;
    Ok(Json(SnapshotsResponse { snapshots }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).expect("valid date")
    }

    #[test]
    fn test_comparison_requires_all_dates() {
        let query = ComparisonQuery {
            current_start: Some(date(2, 1)),
            current_end: Some(date(2, 29)),
            previous_start: Some(date(1, 1)),
            previous_end: None,
        };
        assert!(matches!(query.periods(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_comparison_periods() {
        let query = ComparisonQuery {
            current_start: Some(date(2, 1)),
            current_end: Some(date(2, 29)),
            previous_start: Some(date(1, 1)),
            previous_end: Some(date(1, 31)),
        };
        let (current, previous) = query.periods().expect("valid periods");
        assert_eq!(current.days, 29);
        assert_eq!(previous.days, 31);
    }

    #[test]
    fn test_analysis_explicit_period() {
        let query = AnalysisQuery {
            start_date: Some(date(3, 1)),
            end_date: Some(date(3, 10)),
        };
        assert_eq!(query.period().expect("valid").days, 10);

        let reversed = AnalysisQuery {
            start_date: Some(date(3, 10)),
            end_date: Some(date(3, 1)),
        };
        assert!(reversed.period().is_err());
    }
}
