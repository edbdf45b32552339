//! Profit analysis, fixed cost allocation and break-even projection.
//!
//! Fixed costs are spread over a period pro rata using average month,
//! quarter and year lengths (30.44, 91.31 and 365.25 days). Sales figures
//! come from [`ProfitRepository`]; the arithmetic here is pure so it can be
//! tested without a database.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sqlx::SqlitePool;

use webshop_crm_core::{BillingCycle, UserId, money};

use crate::db::{FixedCostRepository, ProfitRepository, RepositoryError};
use crate::models::{
    CategoryRevenue, DailyProfit, FixedCost, NewProfitSnapshot, PeriodFigures, ProfitSnapshot,
};

pub const DAYS_PER_MONTH: Decimal = dec!(30.44);
pub const DAYS_PER_QUARTER: Decimal = dec!(91.31);
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);

/// Inclusive length of a period in days.
#[must_use]
pub fn period_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Share of a cost falling into a period of `days` days.
#[must_use]
pub fn allocate(amount: Decimal, cycle: BillingCycle, days: i64) -> Decimal {
    let cycle_days = match cycle {
        BillingCycle::Monthly => DAYS_PER_MONTH,
        BillingCycle::Quarterly => DAYS_PER_QUARTER,
        BillingCycle::Yearly => DAYS_PER_YEAR,
    };
    amount * Decimal::from(days) / cycle_days
}

/// Amount per month of a recurring cost.
#[must_use]
pub fn monthly_equivalent(amount: Decimal, cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Monthly => amount,
        BillingCycle::Quarterly => amount / dec!(3),
        BillingCycle::Yearly => amount / dec!(12),
    }
}

// =============================================================================
// Fixed cost reports
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CostSummaryRow {
    pub category: String,
    pub billing_cycle: BillingCycle,
    pub cost_items: i64,
    pub monthly_total: Decimal,
    pub yearly_total: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CostTotals {
    pub total_items: i64,
    pub monthly: Decimal,
    pub yearly: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub summary: Vec<CostSummaryRow>,
    pub totals: CostTotals,
}

/// Monthly and yearly equivalents per (category, cycle), largest first.
#[must_use]
pub fn summarize_costs(costs: &[FixedCost]) -> CostSummary {
    let mut groups: BTreeMap<(String, BillingCycle), (i64, Decimal)> = BTreeMap::new();
    for cost in costs {
        let entry = groups
            .entry((cost.category.clone(), cost.billing_cycle))
            .or_default();
        entry.0 += 1;
        entry.1 += monthly_equivalent(cost.amount, cost.billing_cycle);
    }

    let mut summary: Vec<CostSummaryRow> = groups
        .into_iter()
        .map(|((category, billing_cycle), (cost_items, monthly))| CostSummaryRow {
            category,
            billing_cycle,
            cost_items,
            monthly_total: money::round2(monthly),
            yearly_total: money::round2(monthly * dec!(12)),
        })
        .collect();
    summary.sort_by(|a, b| b.monthly_total.cmp(&a.monthly_total));

    let monthly: Decimal = costs
        .iter()
        .map(|c| monthly_equivalent(c.amount, c.billing_cycle))
        .sum();

    CostSummary {
        summary,
        totals: CostTotals {
            total_items: i64::try_from(costs.len()).unwrap_or(i64::MAX),
            monthly: money::round2(monthly),
            yearly: money::round2(monthly * dec!(12)),
        },
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
}

impl Period {
    #[must_use]
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            days: period_days(start_date, end_date),
        }
    }

    /// The `days` days up to and including `end`.
    #[must_use]
    pub fn trailing(days: i64, end: NaiveDate) -> Self {
        Self::new(end - chrono::Duration::days(days), end)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocatedCost {
    #[serde(flatten)]
    pub cost: FixedCost,
    pub allocated_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCosts {
    pub category: String,
    pub costs: Vec<AllocatedCost>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodCosts {
    pub period: Period,
    pub costs_by_category: Vec<CategoryCosts>,
    pub total: Decimal,
    pub daily_average: Decimal,
}

/// Allocate running costs to a period and group them by category.
#[must_use]
pub fn allocate_period(costs: Vec<FixedCost>, period: Period) -> PeriodCosts {
    let mut groups: BTreeMap<String, Vec<AllocatedCost>> = BTreeMap::new();
    for cost in costs {
        let allocated_amount = money::round2(allocate(cost.amount, cost.billing_cycle, period.days));
        groups
            .entry(cost.category.clone())
            .or_default()
            .push(AllocatedCost {
                cost,
                allocated_amount,
            });
    }

    let costs_by_category: Vec<CategoryCosts> = groups
        .into_iter()
        .map(|(category, costs)| CategoryCosts {
            total: costs.iter().map(|c| c.allocated_amount).sum(),
            category,
            costs,
        })
        .collect();
    let total: Decimal = costs_by_category.iter().map(|c| c.total).sum();

    PeriodCosts {
        period,
        daily_average: if period.days > 0 {
            money::round2(total / Decimal::from(period.days))
        } else {
            Decimal::ZERO
        },
        costs_by_category,
        total,
    }
}

fn allocated_total(costs: &[FixedCost], days: i64) -> Decimal {
    money::round2(
        costs
            .iter()
            .map(|c| allocate(c.amount, c.billing_cycle, days))
            .sum(),
    )
}

// =============================================================================
// Profit analysis
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfitSummary {
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub gross_profit: Decimal,
    pub total_fixed_costs: Decimal,
    pub total_ad_spend: Decimal,
    pub net_profit: Decimal,
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
    pub break_even_revenue: Decimal,
    pub orders_count: i64,
    pub avg_order_value: Decimal,
    pub units_sold: i64,
}

impl ProfitSummary {
    #[must_use]
    pub fn from_figures(figures: &PeriodFigures, fixed_costs: Decimal) -> Self {
        let gross_profit = figures.revenue - figures.cogs;
        let net_profit = gross_profit - fixed_costs - figures.ad_spend;

        Self {
            total_revenue: figures.revenue,
            total_cogs: figures.cogs,
            gross_profit,
            total_fixed_costs: fixed_costs,
            total_ad_spend: figures.ad_spend,
            net_profit,
            gross_margin: money::percentage(gross_profit, figures.revenue),
            net_margin: money::percentage(net_profit, figures.revenue),
            break_even_revenue: fixed_costs + figures.ad_spend,
            orders_count: figures.orders_count,
            avg_order_value: figures.avg_order_value,
            units_sold: figures.units_sold,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CostStructure {
    pub cogs_percentage: Decimal,
    pub fixed_costs_percentage: Decimal,
    pub ad_spend_percentage: Decimal,
}

impl From<&ProfitSummary> for CostStructure {
    fn from(s: &ProfitSummary) -> Self {
        Self {
            cogs_percentage: money::percentage(s.total_cogs, s.total_revenue),
            fixed_costs_percentage: money::percentage(s.total_fixed_costs, s.total_revenue),
            ad_spend_percentage: money::percentage(s.total_ad_spend, s.total_revenue),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitBreakdown {
    pub revenue_by_category: Vec<CategoryRevenue>,
    pub daily_trend: Vec<DailyProfit>,
    pub cost_structure: CostStructure,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitAnalysis {
    pub period: Period,
    pub summary: ProfitSummary,
    pub breakdown: ProfitBreakdown,
}

/// Figures of one side of a period comparison.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeriodResult {
    pub period: Period,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub fixed_costs: Decimal,
    pub ad_spend: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub orders: i64,
    pub units_sold: i64,
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
}

impl PeriodResult {
    fn new(period: Period, summary: &ProfitSummary) -> Self {
        Self {
            period,
            revenue: summary.total_revenue,
            cogs: summary.total_cogs,
            fixed_costs: summary.total_fixed_costs,
            ad_spend: summary.total_ad_spend,
            gross_profit: summary.gross_profit,
            net_profit: summary.net_profit,
            orders: summary.orders_count,
            units_sold: summary.units_sold,
            gross_margin: summary.gross_margin,
            net_margin: summary.net_margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub absolute: Decimal,
    pub percentage: Decimal,
}

impl Change {
    /// Relative change against a positive baseline; 0 otherwise.
    #[must_use]
    pub fn against_positive(current: Decimal, previous: Decimal) -> Self {
        let absolute = current - previous;
        Self {
            absolute,
            percentage: if previous > Decimal::ZERO {
                money::percentage(absolute, previous)
            } else {
                Decimal::ZERO
            },
        }
    }

    /// Relative change against the magnitude of any non-zero baseline.
    #[must_use]
    pub fn against_magnitude(current: Decimal, previous: Decimal) -> Self {
        let absolute = current - previous;
        Self {
            absolute,
            percentage: money::percentage(absolute, previous.abs()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Changes {
    pub revenue: Change,
    pub gross_profit: Change,
    pub net_profit: Change,
    pub orders: Change,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeriodComparison {
    pub current_period: PeriodResult,
    pub previous_period: PeriodResult,
    pub changes: Changes,
}

/// Compare two periods.
#[must_use]
pub fn compare_periods(current: PeriodResult, previous: PeriodResult) -> PeriodComparison {
    PeriodComparison {
        changes: Changes {
            revenue: Change::against_positive(current.revenue, previous.revenue),
            gross_profit: Change::against_positive(current.gross_profit, previous.gross_profit),
            net_profit: Change::against_magnitude(current.net_profit, previous.net_profit),
            orders: Change::against_positive(
                money::from_count(current.orders),
                money::from_count(previous.orders),
            ),
        },
        current_period: current,
        previous_period: previous,
    }
}

// =============================================================================
// Break-even
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CurrentMonth {
    pub revenue_to_date: Decimal,
    pub days_into_month: u32,
    pub projected_monthly_revenue: Decimal,
    pub break_even_progress: Decimal,
    pub surplus_deficit: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakEven {
    pub monthly_fixed_costs: Decimal,
    pub avg_monthly_ad_spend: Decimal,
    pub total_monthly_costs: Decimal,
    pub avg_gross_margin_percentage: Decimal,
    pub break_even_revenue_monthly: Decimal,
    pub break_even_revenue_daily: Decimal,
    pub current_month: CurrentMonth,
}

/// Inputs of [`break_even`].
#[derive(Debug, Clone, Copy)]
pub struct BreakEvenInputs {
    pub monthly_fixed_costs: Decimal,
    pub avg_monthly_ad_spend: Decimal,
    pub avg_gross_margin_percentage: Decimal,
    pub revenue_to_date: Decimal,
    pub days_into_month: u32,
}

/// Monthly revenue needed to cover fixed costs and ad spend at the current
/// gross margin, and how the running month is tracking against it.
#[must_use]
pub fn break_even(inputs: BreakEvenInputs) -> BreakEven {
    let total_monthly_costs = inputs.monthly_fixed_costs + inputs.avg_monthly_ad_spend;
    let margin = inputs.avg_gross_margin_percentage;
    let monthly = if margin > Decimal::ZERO {
        total_monthly_costs / (margin / Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    };

    let day = inputs.days_into_month.max(1);
    let projected = inputs.revenue_to_date * DAYS_PER_MONTH / Decimal::from(day);

    BreakEven {
        monthly_fixed_costs: money::round2(inputs.monthly_fixed_costs),
        avg_monthly_ad_spend: inputs.avg_monthly_ad_spend,
        total_monthly_costs: money::round2(total_monthly_costs),
        avg_gross_margin_percentage: margin,
        break_even_revenue_monthly: money::round2(monthly),
        break_even_revenue_daily: money::round2(monthly / DAYS_PER_MONTH),
        current_month: CurrentMonth {
            revenue_to_date: inputs.revenue_to_date,
            days_into_month: day,
            projected_monthly_revenue: money::round2(projected),
            break_even_progress: money::percentage(projected, monthly),
            surplus_deficit: money::round2(projected - monthly),
        },
    }
}

// =============================================================================
// Service
// =============================================================================

/// Profit reports over the live database.
pub struct ProfitService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfitService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn summary(&self, period: Period) -> Result<ProfitSummary, RepositoryError> {
        let figures = ProfitRepository::new(self.pool)
            .period_figures(period.start_date, period.end_date)
            .await?;
        let costs = FixedCostRepository::new(self.pool)
            .active_in_period(period.start_date, period.end_date)
            .await?;

        Ok(ProfitSummary::from_figures(
            &figures,
            allocated_total(&costs, period.days),
        ))
    }

    /// Full profit and loss for a period.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn analysis(&self, period: Period) -> Result<ProfitAnalysis, RepositoryError> {
        let summary = self.summary(period).await?;
        let repo = ProfitRepository::new(self.pool);

        Ok(ProfitAnalysis {
            period,
            breakdown: ProfitBreakdown {
                revenue_by_category: repo
                    .revenue_by_category(period.start_date, period.end_date)
                    .await?,
                daily_trend: repo.daily_trend(period.start_date, period.end_date).await?,
                cost_structure: CostStructure::from(&summary),
            },
            summary,
        })
    }

    /// Compare two periods.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn comparison(
        &self,
        current: Period,
        previous: Period,
    ) -> Result<PeriodComparison, RepositoryError> {
        let current_summary = self.summary(current).await?;
        let previous_summary = self.summary(previous).await?;

        Ok(compare_periods(
            PeriodResult::new(current, &current_summary),
            PeriodResult::new(previous, &previous_summary),
        ))
    }

    /// Break-even projection using the margin of the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn break_even(&self, days: i64) -> Result<BreakEven, RepositoryError> {
        let costs = FixedCostRepository::new(self.pool).list_active().await?;
        let repo = ProfitRepository::new(self.pool);

        Ok(break_even(BreakEvenInputs {
            monthly_fixed_costs: costs
                .iter()
                .map(|c| monthly_equivalent(c.amount, c.billing_cycle))
                .sum(),
            avg_monthly_ad_spend: repo.avg_monthly_ad_spend().await?,
            avg_gross_margin_percentage: repo.avg_line_margin(days).await?,
            revenue_to_date: repo.month_to_date_revenue().await?,
            days_into_month: Utc::now().day(),
        }))
    }

    /// Compute and store the analysis of a period.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query or the insert fails.
    pub async fn snapshot(
        &self,
        period: Period,
        created_by: Option<UserId>,
    ) -> Result<(ProfitSnapshot, ProfitSummary), RepositoryError> {
        let summary = self.summary(period).await?;

        let snapshot = ProfitRepository::new(self.pool)
            .create_snapshot(&NewProfitSnapshot {
                period_start: period.start_date,
                period_end: period.end_date,
                total_revenue: summary.total_revenue,
                total_cogs: summary.total_cogs,
                total_fixed_costs: summary.total_fixed_costs,
                total_ad_spend: summary.total_ad_spend,
                gross_profit: summary.gross_profit,
                net_profit: summary.net_profit,
                gross_margin: summary.gross_margin,
                net_margin: summary.net_margin,
                orders_count: summary.orders_count,
                created_by,
            })
            .await?;

        tracing::info!(
            snapshot_id = %snapshot.id,
            start = %period.start_date,
            end = %period.end_date,
            "Profit snapshot stored"
        );
        Ok((snapshot, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webshop_crm_core::FixedCostId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    fn cost(category: &str, amount: Decimal, cycle: BillingCycle) -> FixedCost {
        FixedCost {
            id: FixedCostId::new(1),
            name: format!("{category} cost"),
            description: None,
            category: category.to_string(),
            amount,
            billing_cycle: cycle,
            start_date: date(2024, 1, 1),
            end_date: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_period_days_is_inclusive() {
        assert_eq!(period_days(date(2024, 3, 1), date(2024, 3, 31)), 31);
        assert_eq!(period_days(date(2024, 3, 1), date(2024, 3, 1)), 1);
    }

    #[test]
    fn test_allocation_per_cycle() {
        assert_eq!(
            money::round2(allocate(dec!(1522), BillingCycle::Monthly, 30)),
            dec!(1500)
        );
        assert_eq!(
            money::round2(allocate(dec!(913.10), BillingCycle::Quarterly, 10)),
            dec!(100)
        );
        assert_eq!(
            money::round2(allocate(dec!(3652.50), BillingCycle::Yearly, 1)),
            dec!(10)
        );
    }

    #[test]
    fn test_summarize_costs() {
        let costs = vec![
            cost("Housing", dec!(1200), BillingCycle::Monthly),
            cost("Insurance", dec!(600), BillingCycle::Yearly),
            cost("IT & Communication", dec!(90), BillingCycle::Quarterly),
        ];
        let summary = summarize_costs(&costs);

        assert_eq!(summary.totals.total_items, 3);
        assert_eq!(summary.totals.monthly, dec!(1280));
        assert_eq!(summary.totals.yearly, dec!(15360));
        assert_eq!(summary.summary[0].category, "Housing");
        assert_eq!(summary.summary[2].monthly_total, dec!(30));
    }

    #[test]
    fn test_allocate_period_groups_by_category() {
        let costs = vec![
            cost("Housing", dec!(304.40), BillingCycle::Monthly),
            cost("Housing", dec!(913.10), BillingCycle::Quarterly),
            cost("Marketing", dec!(365.25), BillingCycle::Yearly),
        ];
        let period = Period::new(date(2024, 1, 1), date(2024, 1, 10));
        let result = allocate_period(costs, period);

        assert_eq!(result.period.days, 10);
        assert_eq!(result.costs_by_category.len(), 2);
        assert_eq!(result.costs_by_category[0].total, dec!(200));
        assert_eq!(result.total, dec!(210));
        assert_eq!(result.daily_average, dec!(21));
    }

    #[test]
    fn test_profit_summary() {
        let figures = PeriodFigures {
            revenue: dec!(10000),
            orders_count: 100,
            avg_order_value: dec!(100),
            cogs: dec!(4000),
            units_sold: 250,
            ad_spend: dec!(1000),
        };
        let summary = ProfitSummary::from_figures(&figures, dec!(2000));

        assert_eq!(summary.gross_profit, dec!(6000));
        assert_eq!(summary.net_profit, dec!(3000));
        assert_eq!(summary.gross_margin, dec!(60));
        assert_eq!(summary.net_margin, dec!(30));
        assert_eq!(summary.break_even_revenue, dec!(3000));

        let structure = CostStructure::from(&summary);
        assert_eq!(structure.cogs_percentage, dec!(40));
        assert_eq!(structure.ad_spend_percentage, dec!(10));
    }

    #[test]
    fn test_profit_summary_without_revenue() {
        let summary = ProfitSummary::from_figures(&PeriodFigures::default(), dec!(500));
        assert_eq!(summary.net_profit, dec!(-500));
        assert_eq!(summary.gross_margin, Decimal::ZERO);
        assert_eq!(summary.net_margin, Decimal::ZERO);
    }

    #[test]
    fn test_change_percentages() {
        assert_eq!(
            Change::against_positive(dec!(150), dec!(100)),
            Change {
                absolute: dec!(50),
                percentage: dec!(50)
            }
        );
        assert_eq!(
            Change::against_positive(dec!(150), dec!(-100)).percentage,
            Decimal::ZERO
        );
        // A loss shrinking from -200 to -100 is a 50% improvement.
        assert_eq!(
            Change::against_magnitude(dec!(-100), dec!(-200)).percentage,
            dec!(50)
        );
        assert_eq!(
            Change::against_magnitude(dec!(100), Decimal::ZERO).percentage,
            Decimal::ZERO
        );
    }

    #[test]
    fn test_break_even() {
        let result = break_even(BreakEvenInputs {
            monthly_fixed_costs: dec!(3000),
            avg_monthly_ad_spend: dec!(1000),
            avg_gross_margin_percentage: dec!(40),
            revenue_to_date: dec!(5000),
            days_into_month: 10,
        });

        assert_eq!(result.total_monthly_costs, dec!(4000));
        assert_eq!(result.break_even_revenue_monthly, dec!(10000));
        assert_eq!(result.break_even_revenue_daily, dec!(328.52));
        assert_eq!(result.current_month.projected_monthly_revenue, dec!(15220));
        assert_eq!(result.current_month.break_even_progress, dec!(152.2));
        assert_eq!(result.current_month.surplus_deficit, dec!(5220));
    }

    #[test]
    fn test_break_even_without_margin() {
        let result = break_even(BreakEvenInputs {
            monthly_fixed_costs: dec!(3000),
            avg_monthly_ad_spend: Decimal::ZERO,
            avg_gross_margin_percentage: Decimal::ZERO,
            revenue_to_date: Decimal::ZERO,
            days_into_month: 1,
        });
        assert_eq!(result.break_even_revenue_monthly, Decimal::ZERO);
        assert_eq!(result.current_month.break_even_progress, Decimal::ZERO);
    }
}
