//! Rule-based business insights.
//!
//! Every recommendation comes from a fixed threshold rule over sales,
//! customer and cost figures. Rules are pure functions over the inputs
//! fetched by [`AnalyticsRepository`]; [`InsightService`] only gathers data
//! and assembles responses.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;
use sqlx::SqlitePool;

use webshop_crm_core::{ProductId, money};

use crate::db::{AnalyticsRepository, ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::models::{
    BusinessMetrics, CityStat, CustomerSegment, ProductSalesWindow, RepeatBehaviour,
};

/// Default analysis window for product rules.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Number of recommendations on the dashboard.
const DASHBOARD_TOP: usize = 8;

/// Gross margin assumed by the break-even estimate.
const ASSUMED_GROSS_MARGIN: Decimal = dec!(0.6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

// =============================================================================
// Product rules
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRule {
    ScaleUp,
    OptimizeOrDiscontinue,
    IncreaseMarketing,
    RestockUrgent,
    PriceOptimization,
}

/// Figures a product rule fired on. Only the fields relevant to the rule
/// are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleMetrics {
    pub daily_sales: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_percentage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tied_up_capital: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_margin: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_margin: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRecommendation {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(rename = "type")]
    pub rule: ProductRule,
    pub priority: Priority,
    pub confidence: Decimal,
    pub reason: String,
    pub action: String,
    pub expected_impact: String,
    pub metrics: RuleMetrics,
}

/// Per-product figures the rules are evaluated on.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPerformance {
    #[serde(flatten)]
    pub sales: ProductSalesWindow,
    pub unit_margin: Decimal,
    pub margin_percentage: Decimal,
    pub daily_sales: Decimal,
    pub daily_revenue: Decimal,
}

impl ProductPerformance {
    #[must_use]
    pub fn new(sales: ProductSalesWindow, period_days: i64) -> Self {
        let days = Decimal::from(period_days.max(1));
        let unit_margin = sales.selling_price - sales.purchase_price;

        Self {
            unit_margin,
            margin_percentage: money::percentage(unit_margin, sales.selling_price),
            daily_sales: money::round2(money::from_count(sales.quantity_sold) / days),
            daily_revenue: money::round2(sales.revenue / days),
            sales,
        }
    }
}

/// Evaluate every product rule against one product. Several rules can fire.
#[must_use]
pub fn product_recommendations(product: &ProductPerformance) -> Vec<ProductRecommendation> {
    let daily = product.daily_sales;
    let margin = product.margin_percentage;
    let stock = product.sales.stock_quantity;
    let revenue = product.sales.revenue;
    let purchase = product.sales.purchase_price;
    let selling = product.sales.selling_price;

    let recommend = |rule, priority, confidence, reason, action, expected_impact, metrics| {
        ProductRecommendation {
            product_id: product.sales.id,
            product_name: product.sales.name.clone(),
            rule,
            priority,
            confidence,
            reason,
            action,
            expected_impact,
            metrics,
        }
    };
    let mut out = Vec::new();

    if daily > Decimal::ONE && margin > dec!(50) && stock > 20 {
        let target = (money::from_count(stock) * dec!(1.5)).ceil();
        out.push(recommend(
            ProductRule::ScaleUp,
            Priority::High,
            dec!(0.85),
            format!("Strong sales ({daily:.1}/day) with a healthy margin ({margin:.1}%)."),
            format!("Raise stock to {target} units and increase marketing for this product."),
            format!(
                "Potential extra revenue: €{:.2}/month",
                money::round2(revenue * dec!(0.3))
            ),
            RuleMetrics {
                daily_sales: daily,
                margin_percentage: Some(margin),
                current_stock: Some(stock),
                ..RuleMetrics::default()
            },
        ));
    }

    if daily < dec!(0.5) && revenue < dec!(100) && stock > 10 {
        out.push(recommend(
            ProductRule::OptimizeOrDiscontinue,
            Priority::Medium,
            dec!(0.75),
            format!(
                "Slow sales ({daily:.1}/day) and limited revenue (€{revenue:.2}) while stock takes up storage."
            ),
            "Discount the remaining stock or stop purchasing this product.".to_string(),
            format!("Storage savings: €{}/month", money::from_count(stock * 2)),
            RuleMetrics {
                daily_sales: daily,
                total_revenue: Some(revenue),
                tied_up_capital: Some(money::round2(money::from_count(stock) * purchase)),
                ..RuleMetrics::default()
            },
        ));
    }

    if margin > dec!(60) && daily > Decimal::ZERO && daily < Decimal::ONE {
        let extra_profit = money::round2(daily * dec!(0.5) * product.unit_margin * dec!(30));
        out.push(recommend(
            ProductRule::IncreaseMarketing,
            Priority::High,
            dec!(0.80),
            format!("Excellent margin ({margin:.1}%) but low sales."),
            "Start a targeted ad campaign; the margin justifies the spend.".to_string(),
            format!("With 50% more sales: +€{extra_profit:.2} profit/month"),
            RuleMetrics {
                daily_sales: daily,
                margin_percentage: Some(margin),
                unit_margin: Some(product.unit_margin),
                ..RuleMetrics::default()
            },
        ));
    }

    if stock < 10 && daily > dec!(0.5) {
        let days_remaining = (money::from_count(stock) / daily)
            .ceil()
            .to_i64()
            .unwrap_or_default();
        out.push(recommend(
            ProductRule::RestockUrgent,
            Priority::Urgent,
            dec!(0.95),
            format!("Low stock ({stock} units) while selling {daily:.1}/day. Sell-out risk."),
            format!("Reorder now. Current stock lasts {days_remaining} more days."),
            format!(
                "Avoids €{:.2}/week in lost revenue",
                money::round2(daily * selling * dec!(7))
            ),
            RuleMetrics {
                daily_sales: daily,
                current_stock: Some(stock),
                days_remaining: Some(days_remaining),
                ..RuleMetrics::default()
            },
        ));
    }

    if daily > dec!(2) && margin < dec!(40) {
        let suggested = money::round2(purchase * dec!(1.6));
        let extra_profit = money::round2((suggested - selling) * daily * dec!(30));
        out.push(recommend(
            ProductRule::PriceOptimization,
            Priority::Medium,
            dec!(0.70),
            format!("High sales ({daily:.1}/day) but a thin margin ({margin:.1}%)."),
            format!("Test a price of €{suggested:.2} for a better margin."),
            format!("Potential extra profit: €{extra_profit:.2}/month"),
            RuleMetrics {
                daily_sales: daily,
                current_price: Some(selling),
                suggested_price: Some(suggested),
                margin_percentage: Some(margin),
                projected_margin: Some(money::percentage(suggested - purchase, suggested)),
                ..RuleMetrics::default()
            },
        ));
    }

    out
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductAnalysis {
    pub products: Vec<ProductPerformance>,
    pub recommendations: Vec<ProductRecommendation>,
    pub period_days: i64,
    pub analysis_date: DateTime<Utc>,
}

impl ProductAnalysis {
    #[must_use]
    pub fn build(sales: Vec<ProductSalesWindow>, period_days: i64) -> Self {
        let products: Vec<_> = sales
            .into_iter()
            .map(|s| ProductPerformance::new(s, period_days))
            .collect();
        let mut recommendations: Vec<_> =
            products.iter().flat_map(product_recommendations).collect();
        recommendations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.confidence.cmp(&a.confidence))
        });

        Self {
            products,
            recommendations,
            period_days,
            analysis_date: Utc::now(),
        }
    }
}

// =============================================================================
// Customer and business insights
// =============================================================================

/// A non-product insight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub priority: Priority,
    pub confidence: Decimal,
    pub title: String,
    pub insight: String,
    pub recommendation: String,
    pub potential_impact: String,
}

fn sort_insights(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.confidence.cmp(&a.confidence))
    });
}

/// Customer-behaviour insights from spend segments, repeat behaviour and
/// cities ranked by revenue.
#[must_use]
pub fn customer_insights(
    segments: &[CustomerSegment],
    repeat: RepeatBehaviour,
    cities: &[CityStat],
) -> Vec<Insight> {
    let total_customers: i64 = segments.iter().map(|s| s.customers).sum();
    let segment = |name: &str| segments.iter().find(|s| s.segment == name);
    let mut insights = Vec::new();

    if let Some(vip) = segment("vip")
        && vip.customers > 0
    {
        let share = money::percentage(
            money::from_count(vip.customers),
            money::from_count(total_customers),
        );
        insights.push(Insight {
            kind: "customer_segment",
            priority: Priority::High,
            confidence: dec!(0.90),
            title: "VIP customer focus".to_string(),
            insight: format!(
                "You have {} VIP customers ({share:.1}%) spending €{:.2} on average.",
                vip.customers, vip.avg_spent
            ),
            recommendation:
                "Create a VIP programme with exclusive offers and personal service to keep them."
                    .to_string(),
            potential_impact: format!(
                "Retaining VIP customers can add €{:.2} in revenue.",
                money::round2(vip.total_revenue * dec!(0.1))
            ),
        });
    }

    if let Some(none) = segment("none")
        && none.customers > 5
    {
        insights.push(Insight {
            kind: "conversion_opportunity",
            priority: Priority::Medium,
            confidence: dec!(0.75),
            title: "Conversion opportunity".to_string(),
            insight: format!(
                "{} customers registered but have not bought anything yet.",
                none.customers
            ),
            recommendation:
                "Start a welcome campaign with 10% off a first purchase within 7 days."
                    .to_string(),
            potential_impact: format!(
                "At 20% conversion: €{:.2} extra revenue.",
                money::round2(money::from_count(none.customers) * dec!(0.2) * dec!(75))
            ),
        });
    }

    let ordering = repeat.one_time_customers + repeat.repeat_customers;
    if ordering > 0 {
        let repeat_rate = money::percentage(
            money::from_count(repeat.repeat_customers),
            money::from_count(ordering),
        );
        if repeat_rate < dec!(30) {
            insights.push(Insight {
                kind: "retention_improvement",
                priority: Priority::High,
                confidence: dec!(0.85),
                title: "Improve customer retention".to_string(),
                insight: format!(
                    "Only {repeat_rate:.1}% of customers buy more than once, below the 35% average."
                ),
                recommendation:
                    "Add a follow-up email series and a loyalty programme to drive repeat purchases."
                        .to_string(),
                potential_impact: format!(
                    "Reaching a 35% repeat rate can add €{:.2} in revenue.",
                    money::round2(
                        money::from_count(repeat.one_time_customers) * dec!(0.05) * dec!(85)
                    )
                ),
            });
        }
    }

    if let Some(top) = cities.first() {
        insights.push(Insight {
            kind: "geographic_opportunity",
            priority: Priority::Medium,
            confidence: dec!(0.70),
            title: "Geographic opportunity".to_string(),
            insight: format!(
                "{} is your best market with €{:.2} revenue from {} customers.",
                top.city, top.revenue, top.customers
            ),
            recommendation: format!(
                "Focus marketing on {} and similar cities. Consider local partnerships or events.",
                top.city
            ),
            potential_impact: "Expanding into similar markets can grow revenue by 25%."
                .to_string(),
        });
    }

    sort_insights(&mut insights);
    insights
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerAnalysis {
    pub segments: Vec<CustomerSegment>,
    pub repeat_behaviour: RepeatBehaviour,
    pub top_cities: Vec<CityStat>,
    pub insights: Vec<Insight>,
    pub analysis_date: DateTime<Utc>,
}

/// Revenue growth against the previous 30 days, in percent. Zero without a
/// previous period.
#[must_use]
pub fn revenue_growth(metrics: &BusinessMetrics) -> Decimal {
    money::percentage(
        metrics.monthly_revenue - metrics.previous_month_revenue,
        metrics.previous_month_revenue,
    )
}

/// Share of ordering customers with more than one order, in percent.
#[must_use]
pub fn business_repeat_rate(metrics: &BusinessMetrics) -> Decimal {
    money::percentage(
        money::from_count(metrics.repeat_customers),
        money::from_count(metrics.active_customers),
    )
}

/// Orders per month needed to cover monthly fixed costs at the assumed
/// gross margin. Zero without an average order value.
#[must_use]
pub fn break_even_orders(monthly_fixed_costs: Decimal, avg_order_value: Decimal) -> i64 {
    if avg_order_value <= Decimal::ZERO {
        return 0;
    }
    (monthly_fixed_costs / (avg_order_value * ASSUMED_GROSS_MARGIN))
        .ceil()
        .to_i64()
        .unwrap_or_default()
}

#[must_use]
pub fn business_insights(metrics: &BusinessMetrics) -> Vec<Insight> {
    let growth = revenue_growth(metrics);
    let current = metrics.monthly_revenue;
    let mut insights = Vec::new();

    if growth > dec!(10) {
        insights.push(Insight {
            kind: "growth_acceleration",
            priority: Priority::High,
            confidence: dec!(0.85),
            title: "Strong growth momentum".to_string(),
            insight: format!(
                "Revenue grew {growth:.1}% against the previous month (€{current:.2})."
            ),
            recommendation:
                "Use the momentum: raise the marketing budget and stock of best sellers."
                    .to_string(),
            potential_impact: format!(
                "If growth holds: €{:.2} next month.",
                money::round2(current * dec!(1.1))
            ),
        });
    } else if growth < dec!(-5) {
        insights.push(Insight {
            kind: "revenue_decline",
            priority: Priority::Urgent,
            confidence: dec!(0.90),
            title: "Revenue decline".to_string(),
            insight: format!(
                "Revenue fell {:.1}% against the previous month.",
                growth.abs()
            ),
            recommendation:
                "Check for seasonal effects, competition or product issues and start a recovery campaign."
                    .to_string(),
            potential_impact: format!(
                "Without action another €{:.2} may be lost.",
                money::round2((current - metrics.previous_month_revenue).abs() * dec!(1.5))
            ),
        });
    }

    if metrics.new_customers_month < 10 {
        insights.push(Insight {
            kind: "customer_acquisition",
            priority: Priority::High,
            confidence: dec!(0.80),
            title: "Low customer acquisition".to_string(),
            insight: format!(
                "Only {} new customers this month, below a healthy 20+.",
                metrics.new_customers_month
            ),
            recommendation:
                "Increase the acquisition budget with a focus on social media and search ads."
                    .to_string(),
            potential_impact: format!(
                "Doubling new customers can add €{} in revenue.",
                money::from_count(metrics.new_customers_month * 85 * 2)
            ),
        });
    }

    let needed = break_even_orders(metrics.monthly_fixed_costs, metrics.avg_order_value);
    if metrics.monthly_orders < needed {
        let shortfall = metrics.monthly_fixed_costs
            - money::from_count(metrics.monthly_orders)
                * metrics.avg_order_value
                * ASSUMED_GROSS_MARGIN;
        insights.push(Insight {
            kind: "break_even_warning",
            priority: Priority::Urgent,
            confidence: dec!(0.95),
            title: "Break-even risk".to_string(),
            insight: format!(
                "You need {} more orders to break even.",
                needed - metrics.monthly_orders
            ),
            recommendation:
                "Focus on conversion and raise the average order value through upselling."
                    .to_string(),
            potential_impact: format!(
                "Breaking even avoids a €{:.2} loss.",
                money::round2(shortfall)
            ),
        });
    }

    let repeat_rate = business_repeat_rate(metrics);
    if repeat_rate > dec!(40) {
        insights.push(Insight {
            kind: "loyalty_strength",
            priority: Priority::Medium,
            confidence: dec!(0.80),
            title: "Strong customer loyalty".to_string(),
            insight: format!("{repeat_rate:.1}% of customers buy more than once."),
            recommendation:
                "Introduce a referral programme so loyal customers bring in new ones.".to_string(),
            potential_impact: format!(
                "A referral programme can bring in {} new customers.",
                metrics.repeat_customers * 3 / 10
            ),
        });
    }

    insights
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            90.. => Self::APlus,
            80..=89 => Self::A,
            70..=79 => Self::B,
            60..=69 => Self::C,
            50..=59 => Self::D,
            _ => Self::F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthBreakdown {
    pub revenue_growth: Decimal,
    pub customer_acquisition: i64,
    pub order_volume: i64,
    pub avg_order_value: Decimal,
    pub repeat_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthScore {
    pub score: u32,
    pub grade: Grade,
    pub breakdown: HealthBreakdown,
}

/// Score out of 100: revenue growth 25, acquisition 20, order volume 20,
/// average order value 15 and repeat rate 20 points.
#[must_use]
pub fn health_score(metrics: &BusinessMetrics) -> HealthScore {
    let growth = revenue_growth(metrics);
    let repeat_rate = business_repeat_rate(metrics);
    let aov = metrics.avg_order_value;

    let growth_points = if growth > dec!(15) {
        25
    } else if growth > dec!(5) {
        20
    } else if growth > Decimal::ZERO {
        15
    } else if growth > dec!(-5) {
        10
    } else {
        5
    };

    let acquisition_points = match metrics.new_customers_month {
        21.. => 20,
        16..=20 => 15,
        11..=15 => 10,
        6..=10 => 5,
        _ => 0,
    };

    let volume_points = match metrics.monthly_orders {
        101.. => 20,
        51..=100 => 15,
        26..=50 => 10,
        11..=25 => 5,
        _ => 0,
    };

    let aov_points = if aov > dec!(150) {
        15
    } else if aov > dec!(100) {
        12
    } else if aov > dec!(75) {
        9
    } else if aov > dec!(50) {
        6
    } else if aov > dec!(25) {
        3
    } else {
        0
    };

    let repeat_points = if repeat_rate > dec!(40) {
        20
    } else if repeat_rate > dec!(30) {
        15
    } else if repeat_rate > dec!(20) {
        10
    } else if repeat_rate > dec!(10) {
        5
    } else {
        0
    };

    let score = growth_points + acquisition_points + volume_points + aov_points + repeat_points;

    HealthScore {
        score,
        grade: Grade::from_score(score),
        breakdown: HealthBreakdown {
            revenue_growth: growth,
            customer_acquisition: metrics.new_customers_month,
            order_volume: metrics.monthly_orders,
            avg_order_value: aov,
            repeat_rate,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessHealth {
    pub metrics: BusinessMetrics,
    pub insights: Vec<Insight>,
    pub health_score: HealthScore,
    pub analysis_date: DateTime<Utc>,
}

impl BusinessHealth {
    #[must_use]
    pub fn build(metrics: BusinessMetrics) -> Self {
        Self {
            insights: business_insights(&metrics),
            health_score: health_score(&metrics),
            metrics,
            analysis_date: Utc::now(),
        }
    }
}

// =============================================================================
// Seasonal
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalRecommendation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub priority: Priority,
    pub title: &'static str,
    pub insight: &'static str,
    pub recommendation: &'static str,
    pub timing: &'static str,
}

/// Seasonal advice for a calendar month (1-12). February has none.
#[must_use]
pub fn seasonal_recommendations(month: u32) -> Vec<SeasonalRecommendation> {
    let (priority, title, insight, recommendation, timing) = match month {
        12 | 1 => (
            Priority::High,
            "Winter and holiday optimisation",
            "Winter period with high consumer spending.",
            "Focus on warm clothing, gift items and bundle offers.",
            "Implement now",
        ),
        3..=5 => (
            Priority::Medium,
            "Spring collection",
            "Spring demand for lighter clothing and outdoor products.",
            "Promote the spring and summer collection and outdoor accessories.",
            "Start promotion now",
        ),
        6..=8 => (
            Priority::High,
            "Summer peak",
            "Summer peak season for fashion and holiday items.",
            "Maximise stock of summer clothing and holiday accessories.",
            "Increase marketing budget",
        ),
        9..=11 => (
            Priority::Medium,
            "Autumn preparation",
            "Preparing for winter and Black Friday.",
            "Prepare Black Friday campaigns and stock winter items.",
            "Plan Q4 now",
        ),
        _ => return Vec::new(),
    };

    vec![SeasonalRecommendation {
        kind: "seasonal",
        priority,
        title,
        insight,
        recommendation,
        timing,
    }]
}

// =============================================================================
// Dashboard
// =============================================================================

/// Any recommendation shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Recommendation {
    Product(ProductRecommendation),
    Insight(Insight),
    Seasonal(SeasonalRecommendation),
}

impl Recommendation {
    #[must_use]
    pub const fn priority(&self) -> Priority {
        match self {
            Self::Product(r) => r.priority,
            Self::Insight(i) => i.priority,
            Self::Seasonal(s) => s.priority,
        }
    }

    /// Seasonal advice carries no confidence and ranks as 0.5.
    #[must_use]
    pub fn confidence(&self) -> Decimal {
        match self {
            Self::Product(r) => r.confidence,
            Self::Insight(i) => i.confidence,
            Self::Seasonal(_) => dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DashboardOverview {
    pub business_health_score: HealthScore,
    pub total_recommendations: usize,
    pub urgent_actions: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedAnalysis {
    pub product_performance: ProductAnalysis,
    pub customer_behaviour: CustomerAnalysis,
    pub business_health: BusinessHealth,
    pub seasonal: Vec<SeasonalRecommendation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub overview: DashboardOverview,
    pub top_recommendations: Vec<Recommendation>,
    pub detailed_analysis: DetailedAnalysis,
}

impl Dashboard {
    /// Combine the top 3 product, 2 customer, 2 business and 1 seasonal
    /// recommendation, ranked by priority then confidence.
    #[must_use]
    pub fn build(detail: DetailedAnalysis) -> Self {
        let mut combined: Vec<Recommendation> = detail
            .product_performance
            .recommendations
            .iter()
            .take(3)
            .cloned()
            .map(Recommendation::Product)
            .chain(
                detail
                    .customer_behaviour
                    .insights
                    .iter()
                    .take(2)
                    .cloned()
                    .map(Recommendation::Insight),
            )
            .chain(
                detail
                    .business_health
                    .insights
                    .iter()
                    .take(2)
                    .cloned()
                    .map(Recommendation::Insight),
            )
            .chain(
                detail
                    .seasonal
                    .iter()
                    .take(1)
                    .cloned()
                    .map(Recommendation::Seasonal),
            )
            .collect();

        let count = |p: Priority| combined.iter().filter(|r| r.priority() == p).count();
        let overview = DashboardOverview {
            business_health_score: detail.business_health.health_score,
            total_recommendations: combined.len(),
            urgent_actions: count(Priority::Urgent),
            high_priority: count(Priority::High),
            medium_priority: count(Priority::Medium),
            low_priority: count(Priority::Low),
        };

        combined.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| b.confidence().cmp(&a.confidence()))
        });
        combined.truncate(DASHBOARD_TOP);

        Self {
            overview,
            top_recommendations: combined,
            detailed_analysis: detail,
        }
    }
}

/// Recommendations for a single product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductAdvice {
    pub product_id: ProductId,
    pub recommendations: Vec<ProductRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

// =============================================================================
// Service
// =============================================================================

pub struct InsightService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InsightService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Product rules over the last `period_days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn products(&self, period_days: i64) -> Result<ProductAnalysis, RepositoryError> {
        let sales = AnalyticsRepository::new(self.pool)
            .product_sales_window(period_days)
            .await?;
        Ok(ProductAnalysis::build(sales, period_days))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn customers(&self) -> Result<CustomerAnalysis, RepositoryError> {
        let repo = AnalyticsRepository::new(self.pool);
        let segments = repo.value_segments().await?;
        let repeat_behaviour = repo.repeat_behaviour().await?;
        let top_cities = repo.cities_by_revenue(10).await?;

        Ok(CustomerAnalysis {
            insights: customer_insights(&segments, repeat_behaviour, &top_cities),
            segments,
            repeat_behaviour,
            top_cities,
            analysis_date: Utc::now(),
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn business_health(&self) -> Result<BusinessHealth, RepositoryError> {
        let metrics = AnalyticsRepository::new(self.pool).business_metrics().await?;
        Ok(BusinessHealth::build(metrics))
    }

    /// Every analysis at once, on the default 30-day window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detailed(&self) -> Result<DetailedAnalysis, RepositoryError> {
        Ok(DetailedAnalysis {
            product_performance: self.products(DEFAULT_PERIOD_DAYS).await?,
            customer_behaviour: self.customers().await?,
            business_health: self.business_health().await?,
            seasonal: seasonal_recommendations(Utc::now().month()),
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn dashboard(&self) -> Result<Dashboard, RepositoryError> {
        Ok(Dashboard::build(self.detailed().await?))
    }

    /// Recommendations for one active product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist or is
    /// inactive, `AppError::Database` if a query fails.
    pub async fn product(&self, id: ProductId) -> Result<ProductAdvice, AppError> {
        let product = ProductRepository::new(self.pool)
            .get(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let recommendations: Vec<_> = self
            .products(DEFAULT_PERIOD_DAYS)
            .await?
            .recommendations
            .into_iter()
            .filter(|r| r.product_id == product.id)
            .collect();

        let message = recommendations.is_empty().then_some(
            "No specific recommendations for this product. It performs within normal parameters.",
        );

        Ok(ProductAdvice {
            product_id: product.id,
            recommendations,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(
        purchase: Decimal,
        selling: Decimal,
        stock: i64,
        sold: i64,
        revenue: Decimal,
    ) -> ProductPerformance {
        ProductPerformance::new(
            ProductSalesWindow {
                id: ProductId::new(1),
                name: "Canvas tote".to_string(),
                sku: Some("TOTE-1".to_string()),
                category: Some("Bags".to_string()),
                purchase_price: purchase,
                selling_price: selling,
                stock_quantity: stock,
                quantity_sold: sold,
                revenue,
                orders_count: sold,
            },
            30,
        )
    }

    fn rules(p: &ProductPerformance) -> Vec<ProductRule> {
        product_recommendations(p).into_iter().map(|r| r.rule).collect()
    }

    fn metrics() -> BusinessMetrics {
        BusinessMetrics::default()
    }

    #[test]
    fn test_performance_figures() {
        let p = product(dec!(10), dec!(25), 50, 45, dec!(1125));
        assert_eq!(p.unit_margin, dec!(15));
        assert_eq!(p.margin_percentage, dec!(60));
        assert_eq!(p.daily_sales, dec!(1.5));
        assert_eq!(p.daily_revenue, dec!(37.5));
    }

    #[test]
    fn test_scale_up() {
        let p = product(dec!(10), dec!(25), 50, 45, dec!(1125));
        assert_eq!(rules(&p), vec![ProductRule::ScaleUp]);
    }

    #[test]
    fn test_optimize_or_discontinue() {
        let p = product(dec!(20), dec!(25), 40, 3, dec!(75));
        assert_eq!(rules(&p), vec![ProductRule::OptimizeOrDiscontinue]);
    }

    #[test]
    fn test_increase_marketing_needs_some_sales() {
        let selling = product(dec!(5), dec!(20), 5, 15, dec!(300));
        assert!(rules(&selling).contains(&ProductRule::IncreaseMarketing));

        let idle = product(dec!(5), dec!(20), 5, 0, Decimal::ZERO);
        assert!(rules(&idle).is_empty());
    }

    #[test]
    fn test_restock_urgent_days_remaining() {
        let p = product(dec!(10), dec!(12), 4, 30, dec!(360));
        let recs = product_recommendations(&p);
        let restock = recs
            .iter()
            .find(|r| r.rule == ProductRule::RestockUrgent)
            .expect("restock rule fires");
        assert_eq!(restock.priority, Priority::Urgent);
        assert_eq!(restock.metrics.days_remaining, Some(4));
    }

    #[test]
    fn test_price_optimization_suggests_markup() {
        let p = product(dec!(10), dec!(12), 100, 90, dec!(1080));
        let recs = product_recommendations(&p);
        let price = recs
            .iter()
            .find(|r| r.rule == ProductRule::PriceOptimization)
            .expect("price rule fires");
        assert_eq!(price.metrics.suggested_price, Some(dec!(16.00)));
        assert_eq!(price.metrics.projected_margin, Some(dec!(37.5)));
    }

    #[test]
    fn test_zero_selling_price_has_zero_margin() {
        let p = product(dec!(10), Decimal::ZERO, 0, 0, Decimal::ZERO);
        assert_eq!(p.margin_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_recommendations_sorted_by_priority_then_confidence() {
        let analysis = ProductAnalysis::build(
            vec![
                product(dec!(20), dec!(25), 40, 3, dec!(75)).sales,
                product(dec!(10), dec!(12), 4, 30, dec!(360)).sales,
                product(dec!(10), dec!(25), 50, 45, dec!(1125)).sales,
            ],
            30,
        );
        let order: Vec<_> = analysis.recommendations.iter().map(|r| r.rule).collect();
        assert_eq!(
            order,
            vec![
                ProductRule::RestockUrgent,
                ProductRule::ScaleUp,
                ProductRule::OptimizeOrDiscontinue,
            ]
        );
    }

    fn segment(name: &str, customers: i64, avg: Decimal) -> CustomerSegment {
        CustomerSegment {
            segment: name.to_string(),
            customers,
            avg_spent: avg,
            total_revenue: avg * Decimal::from(customers),
        }
    }

    #[test]
    fn test_customer_insights() {
        let segments = vec![
            segment("none", 6, Decimal::ZERO),
            segment("low", 10, dec!(50)),
            segment("vip", 4, dec!(1500)),
        ];
        let repeat = RepeatBehaviour {
            one_time_customers: 12,
            repeat_customers: 2,
        };
        let cities = vec![CityStat {
            city: "Utrecht".to_string(),
            customers: 5,
            revenue: dec!(2400),
        }];

        let kinds: Vec<_> = customer_insights(&segments, repeat, &cities)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "customer_segment",
                "retention_improvement",
                "conversion_opportunity",
                "geographic_opportunity",
            ]
        );
    }

    #[test]
    fn test_customer_insights_without_orders() {
        let segments = vec![segment("none", 3, Decimal::ZERO)];
        assert!(customer_insights(&segments, RepeatBehaviour::default(), &[]).is_empty());
    }

    #[test]
    fn test_break_even_orders() {
        assert_eq!(break_even_orders(dec!(600), dec!(100)), 10);
        assert_eq!(break_even_orders(dec!(601), dec!(100)), 11);
        assert_eq!(break_even_orders(dec!(600), Decimal::ZERO), 0);
    }

    #[test]
    fn test_business_insights() {
        let m = BusinessMetrics {
            monthly_revenue: dec!(800),
            previous_month_revenue: dec!(1000),
            new_customers_month: 3,
            repeat_customers: 9,
            active_customers: 20,
            monthly_orders: 8,
            avg_order_value: dec!(100),
            monthly_fixed_costs: dec!(1200),
        };
        let kinds: Vec<_> = business_insights(&m).into_iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "revenue_decline",
                "customer_acquisition",
                "break_even_warning",
                "loyalty_strength",
            ]
        );
    }

    #[test]
    fn test_health_score_empty_shop() {
        let score = health_score(&metrics());
        assert_eq!(score.score, 10);
        assert_eq!(score.grade, Grade::F);
    }

    #[test]
    fn test_health_score_thriving_shop() {
        let m = BusinessMetrics {
            monthly_revenue: dec!(20000),
            previous_month_revenue: dec!(15000),
            new_customers_month: 25,
            repeat_customers: 50,
            active_customers: 100,
            monthly_orders: 120,
            avg_order_value: dec!(160),
            monthly_fixed_costs: dec!(2000),
        };
        let score = health_score(&m);
        assert_eq!(score.score, 100);
        assert_eq!(score.grade, Grade::APlus);
        assert_eq!(score.breakdown.repeat_rate, dec!(50));
    }

    #[test]
    fn test_grades() {
        assert_eq!(Grade::from_score(90), Grade::APlus);
        assert_eq!(Grade::from_score(85), Grade::A);
        assert_eq!(Grade::from_score(70), Grade::B);
        assert_eq!(Grade::from_score(65), Grade::C);
        assert_eq!(Grade::from_score(50), Grade::D);
        assert_eq!(Grade::from_score(49), Grade::F);
    }

    #[test]
    fn test_seasonal() {
        assert!(seasonal_recommendations(2).is_empty());
        assert_eq!(seasonal_recommendations(12)[0].priority, Priority::High);
        assert_eq!(seasonal_recommendations(4)[0].priority, Priority::Medium);
        assert_eq!(seasonal_recommendations(7)[0].priority, Priority::High);
        assert_eq!(seasonal_recommendations(10)[0].title, "Autumn preparation");
    }

    #[test]
    fn test_dashboard_ranks_and_counts() {
        let products = ProductAnalysis::build(
            vec![product(dec!(10), dec!(12), 4, 30, dec!(360)).sales],
            30,
        );
        let detail = DetailedAnalysis {
            product_performance: products,
            customer_behaviour: CustomerAnalysis {
                segments: Vec::new(),
                repeat_behaviour: RepeatBehaviour::default(),
                top_cities: Vec::new(),
                insights: Vec::new(),
                analysis_date: Utc::now(),
            },
            business_health: BusinessHealth::build(metrics()),
            seasonal: seasonal_recommendations(7),
        };

        let dashboard = Dashboard::build(detail);
        assert_eq!(dashboard.overview.urgent_actions, 1);
        assert_eq!(dashboard.overview.high_priority, 2);
        assert_eq!(dashboard.overview.total_recommendations, 3);
        assert_eq!(dashboard.top_recommendations[0].priority(), Priority::Urgent);
        assert!(matches!(
            dashboard.top_recommendations.last(),
            Some(Recommendation::Seasonal(_))
        ));
    }
}
