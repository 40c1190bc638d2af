//! Composite scores and categorical labels.
//!
//! Health score weights (out of 100):
//!
//! | factor            | weight | normalization                           |
//! |-------------------|--------|-----------------------------------------|
//! | ROAS vs benchmark | 40     | `roas / benchmark * 50`                 |
//! | stability         | 20     | `(1 - coefficient of variation) * 100`  |
//! | trend momentum    | 20     | `50 + pct change first→last week`       |
//! | efficiency        | 20     | `roas / target_roas * 100`              |
//!
//! Each factor is clamped to `[0, 100]` before weighting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::delta::{pct_change, Metric};
use crate::error::{EngineError, EngineResult};
use crate::insight::{ConfidenceBands, FatigueBands};
use crate::kpi::{self, safe_div, PeriodAggregate};
use crate::models::MetricTotals;

pub const WEIGHT_ROAS_VS_BENCHMARK: u32 = 40;
pub const WEIGHT_STABILITY: u32 = 20;
pub const WEIGHT_TREND: u32 = 20;
pub const WEIGHT_EFFICIENCY: u32 = 20;

const NEUTRAL_SCORE: f64 = 50.0;
const TREND_WEEKS: usize = 4;
const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactor {
    pub name: String,
    pub score: f64,
    pub weight: u32,
}

/// Named, pre-normalized factors whose weights sum to exactly 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScoreInput {
    factors: Vec<ScoreFactor>,
}

impl CompositeScoreInput {
    pub fn new(factors: Vec<ScoreFactor>) -> EngineResult<Self> {
        let total: u32 = factors.iter().map(|factor| factor.weight).sum();
        if total != 100 {
            return Err(EngineError::InvalidWeights(total));
        }
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &[ScoreFactor] {
        &self.factors
    }

    /// Weighted score clamped to `[0, 100]`.
    pub fn score(&self) -> f64 {
        let weighted: f64 = self
            .factors
            .iter()
            .map(|factor| normalize(factor.score) * factor.weight as f64)
            .sum();
        normalize(weighted / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    Excellent,
    Good,
    Monitor,
    Warning,
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthLabel::Excellent => "excellent",
            HealthLabel::Good => "good",
            HealthLabel::Monitor => "monitor",
            HealthLabel::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// Lower bounds of each health band.
///
/// With `monitor == good` the monitor band is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthBands {
    pub excellent: u8,
    pub good: u8,
    pub monitor: u8,
}

impl Default for HealthBands {
    fn default() -> Self {
        Self {
            excellent: 80,
            good: 60,
            monitor: 60,
        }
    }
}

impl HealthBands {
    pub fn label(&self, score: u8) -> HealthLabel {
        if score >= self.excellent {
            HealthLabel::Excellent
        } else if score >= self.good {
            HealthLabel::Good
        } else if score >= self.monitor {
            HealthLabel::Monitor
        } else {
            HealthLabel::Warning
        }
    }
}

/// Thresholds, in percent, for week-over-week trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendBands {
    pub stable_pct: f64,
    pub volatile_pct: f64,
}

impl Default for TrendBands {
    fn default() -> Self {
        Self {
            stable_pct: 5.0,
            volatile_pct: 25.0,
        }
    }
}

/// Scoring tunables. Keys are snake_case, as in the config file and the
/// `CAMPAIGN_PULSE__SCORING__*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Account-level ROAS the entity is measured against.
    pub benchmark_roas: f64,
    pub target_roas: f64,
    pub health_bands: HealthBands,
    pub trend_bands: TrendBands,
    pub confidence_bands: ConfidenceBands,
    pub fatigue_bands: FatigueBands,
    /// Revenue target per calendar month, January first.
    pub monthly_revenue_targets: Vec<f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            benchmark_roas: 4.0,
            target_roas: 6.5,
            health_bands: HealthBands::default(),
            trend_bands: TrendBands::default(),
            confidence_bands: ConfidenceBands::default(),
            fatigue_bands: FatigueBands::default(),
            monthly_revenue_targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub score: u8,
    pub label: HealthLabel,
    pub breakdown: Vec<ScoreFactor>,
}

/// Health score for an entity with aggregate `roas` and chronological
/// `daily_roas` history.
pub fn health_score(roas: f64, daily_roas: &[f64], config: &ScoringConfig) -> HealthScore {
    let factors = vec![
        ScoreFactor {
            name: "roasVsBenchmark".to_string(),
            score: normalize(safe_div(roas, config.benchmark_roas) * 50.0),
            weight: WEIGHT_ROAS_VS_BENCHMARK,
        },
        ScoreFactor {
            name: "stability".to_string(),
            score: stability_score(daily_roas),
            weight: WEIGHT_STABILITY,
        },
        ScoreFactor {
            name: "trend".to_string(),
            score: momentum_score(daily_roas),
            weight: WEIGHT_TREND,
        },
        ScoreFactor {
            name: "efficiency".to_string(),
            score: normalize(safe_div(roas, config.target_roas) * 100.0),
            weight: WEIGHT_EFFICIENCY,
        },
    ];

    let input = CompositeScoreInput { factors };
    let score = input.score().round() as u8;

    HealthScore {
        score,
        label: config.health_bands.label(score),
        breakdown: input.factors,
    }
}

fn stability_score(daily_roas: &[f64]) -> f64 {
    if daily_roas.len() < 2 {
        return NEUTRAL_SCORE;
    }
    let cv = volatility(daily_roas).coefficient_of_variation;
    normalize((1.0 - cv) * 100.0)
}

fn momentum_score(daily_roas: &[f64]) -> f64 {
    let weeks = weekly_means(daily_roas, TREND_WEEKS);
    match (weeks.first(), weeks.last()) {
        (Some(first), Some(last)) if weeks.len() >= 2 => {
            normalize(NEUTRAL_SCORE + pct_change(*last, *first))
        }
        _ => NEUTRAL_SCORE,
    }
}

/// Mean of each 7-day block in the most recent `weeks * 7` points, oldest
/// first. Incomplete leading blocks are dropped.
pub fn weekly_means(daily: &[f64], weeks: usize) -> Vec<f64> {
    let span = (weeks * DAYS_PER_WEEK).min(daily.len());
    let recent = &daily[daily.len() - span..];
    let skip = recent.len() % DAYS_PER_WEEK;

    recent[skip..]
        .chunks(DAYS_PER_WEEK)
        .map(|week| week.iter().sum::<f64>() / week.len() as f64)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilitySummary {
    pub roas_volatility: f64,
    pub best_day_roas: f64,
    pub worst_day_roas: f64,
    pub coefficient_of_variation: f64,
}

/// Population standard deviation, extremes and coefficient of variation.
pub fn volatility(series: &[f64]) -> VolatilitySummary {
    if series.is_empty() {
        return VolatilitySummary::default();
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    VolatilitySummary {
        roas_volatility: std_dev,
        best_day_roas: series.iter().copied().fold(f64::MIN, f64::max),
        worst_day_roas: series.iter().copied().fold(f64::MAX, f64::min),
        coefficient_of_variation: safe_div(std_dev, mean),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalingCategory {
    PositiveScaling,
    NegativeScaling,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingAnalysis {
    pub low_spend_roas: f64,
    pub high_spend_roas: f64,
    pub scaling_efficiency: f64,
    pub category: ScalingCategory,
}

/// Compares ROAS on the lower-spend half of days with the higher-spend half.
pub fn scaling(daily: &[MetricTotals]) -> ScalingAnalysis {
    let mut days: Vec<&MetricTotals> = daily.iter().filter(|day| day.spend > 0.0).collect();
    if days.len() < 2 {
        return ScalingAnalysis {
            low_spend_roas: 0.0,
            high_spend_roas: 0.0,
            scaling_efficiency: 0.0,
            category: ScalingCategory::InsufficientData,
        };
    }

    days.sort_by(|a, b| a.spend.total_cmp(&b.spend));
    let split = days.len().div_ceil(2);
    let (low, high) = days.split_at(split);

    let low_spend_roas = kpi::roas(&sum(low));
    let high_spend_roas = kpi::roas(&sum(high));
    let scaling_efficiency = high_spend_roas - low_spend_roas;

    ScalingAnalysis {
        low_spend_roas,
        high_spend_roas,
        scaling_efficiency,
        category: if scaling_efficiency >= 0.0 {
            ScalingCategory::PositiveScaling
        } else {
            ScalingCategory::NegativeScaling
        },
    }
}

fn sum(days: &[&MetricTotals]) -> MetricTotals {
    let mut totals = MetricTotals::default();
    for day in days {
        totals.merge(day);
    }
    totals
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunnelStage {
    Tofu,
    Mofu,
    Bofu,
}

impl std::str::FromStr for FunnelStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TOFU" => Ok(FunnelStage::Tofu),
            "MOFU" => Ok(FunnelStage::Mofu),
            "BOFU" => Ok(FunnelStage::Bofu),
            _ => Err(format!("unknown funnel stage: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
}

/// Presentation of a signed stage score as a capped bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelBar {
    pub width_pct: f64,
    pub tone: Tone,
}

/// Display transform only; the score itself stays unbounded.
pub fn funnel_bar(score: f64) -> FunnelBar {
    FunnelBar {
        width_pct: (score.abs() * 20.0).min(100.0),
        tone: if score >= 0.0 {
            Tone::Positive
        } else {
            Tone::Negative
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelScores {
    pub tofu: f64,
    pub mofu: f64,
    pub bofu: f64,
}

impl FunnelScores {
    /// Stage scores against a benchmark aggregate. Each stage is the mean
    /// polarity-adjusted percent change of its KPIs, scaled down by ten.
    pub fn against(entity: &PeriodAggregate, benchmark: &PeriodAggregate) -> Self {
        let stage = |metrics: [Metric; 2]| -> f64 {
            let total: f64 = metrics
                .iter()
                .map(|metric| {
                    let change = pct_change(metric.value(entity), metric.value(benchmark));
                    metric.polarity().orient(change)
                })
                .sum();
            total / metrics.len() as f64 / 10.0
        };

        Self {
            tofu: stage([Metric::Cpm, Metric::Ctr]),
            mofu: stage([Metric::Cpc, Metric::ConversionRate]),
            bofu: stage([Metric::Cpa, Metric::Roas]),
        }
    }

    pub fn get(&self, stage: FunnelStage) -> f64 {
        match stage {
            FunnelStage::Tofu => self.tofu,
            FunnelStage::Mofu => self.mofu,
            FunnelStage::Bofu => self.bofu,
        }
    }

    /// Highest-scoring stage; ties resolve toward the bottom of the funnel.
    pub fn inferred_stage(&self) -> FunnelStage {
        [FunnelStage::Bofu, FunnelStage::Mofu, FunnelStage::Tofu]
            .into_iter()
            .fold(FunnelStage::Bofu, |best, stage| {
                if self.get(stage) > self.get(best) {
                    stage
                } else {
                    best
                }
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalysis {
    pub scores: FunnelScores,
    pub bars: [FunnelBar; 3],
    pub current_stage: Option<FunnelStage>,
    pub inferred_stage: FunnelStage,
    pub is_misclassified: bool,
}

pub fn funnel(scores: FunnelScores, current_stage: Option<FunnelStage>) -> FunnelAnalysis {
    let inferred_stage = scores.inferred_stage();
    FunnelAnalysis {
        scores,
        bars: [
            funnel_bar(scores.tofu),
            funnel_bar(scores.mofu),
            funnel_bar(scores.bofu),
        ],
        current_stage,
        inferred_stage,
        is_misclassified: current_stage.is_some_and(|stage| stage != inferred_stage),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceTrend {
    Improving,
    Stable,
    Declining,
    Volatile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub weekly_roas: Vec<f64>,
    pub week_over_week: Vec<f64>,
    pub trend: PerformanceTrend,
}

/// Classifies the last four weeks of daily ROAS.
pub fn performance_trend(daily_roas: &[f64], bands: &TrendBands) -> TrendAnalysis {
    let weekly_roas = weekly_means(daily_roas, TREND_WEEKS);
    let week_over_week: Vec<f64> = weekly_roas
        .windows(2)
        .map(|pair| pct_change(pair[1], pair[0]))
        .collect();

    let trend = if week_over_week.is_empty() {
        PerformanceTrend::Stable
    } else {
        let swings_up = week_over_week.iter().any(|change| *change > bands.volatile_pct);
        let swings_down = week_over_week.iter().any(|change| *change < -bands.volatile_pct);
        let mean = week_over_week.iter().sum::<f64>() / week_over_week.len() as f64;

        if swings_up && swings_down {
            PerformanceTrend::Volatile
        } else if mean > bands.stable_pct {
            PerformanceTrend::Improving
        } else if mean < -bands.stable_pct {
            PerformanceTrend::Declining
        } else {
            PerformanceTrend::Stable
        }
    };

    TrendAnalysis {
        weekly_roas,
        week_over_week,
        trend,
    }
}

fn normalize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::DateWindow;
    use chrono::NaiveDate;

    fn day(spend: f64, revenue: f64) -> MetricTotals {
        MetricTotals {
            spend,
            revenue,
            ..Default::default()
        }
    }

    #[test]
    fn health_weights_sum_to_one_hundred() {
        assert_eq!(
            WEIGHT_ROAS_VS_BENCHMARK + WEIGHT_STABILITY + WEIGHT_TREND + WEIGHT_EFFICIENCY,
            100
        );
        let health = health_score(5.0, &[5.0; 28], &ScoringConfig::default());
        let total: u32 = health.breakdown.iter().map(|factor| factor.weight).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn composite_rejects_bad_weights() {
        let factors = vec![
            ScoreFactor {
                name: "a".to_string(),
                score: 50.0,
                weight: 60,
            },
            ScoreFactor {
                name: "b".to_string(),
                score: 50.0,
                weight: 30,
            },
        ];
        assert!(matches!(
            CompositeScoreInput::new(factors),
            Err(EngineError::InvalidWeights(90))
        ));
    }

    #[test]
    fn composite_clamps_out_of_range_factors() {
        let input = CompositeScoreInput::new(vec![
            ScoreFactor {
                name: "hot".to_string(),
                score: 250.0,
                weight: 50,
            },
            ScoreFactor {
                name: "cold".to_string(),
                score: -40.0,
                weight: 50,
            },
        ])
        .unwrap();
        assert_eq!(input.score(), 50.0);
    }

    #[test]
    fn health_score_stays_in_range() {
        let config = ScoringConfig::default();
        let strong = health_score(1e6, &[1e6; 28], &config);
        assert!(strong.score <= 100);
        let weak = health_score(0.0, &[], &config);
        assert_eq!(weak.score, 20);
        assert_eq!(weak.label, HealthLabel::Warning);
    }

    #[test]
    fn steady_strong_roas_is_excellent() {
        let config = ScoringConfig::default();
        let health = health_score(8.0, &[8.0; 28], &config);
        // 100*0.4 + 100*0.2 + 50*0.2 + 100*0.2
        assert_eq!(health.score, 90);
        assert_eq!(health.label, HealthLabel::Excellent);
    }

    #[test]
    fn default_bands_match_dashboard_cutoffs() {
        let bands = HealthBands::default();
        assert_eq!(bands.label(80), HealthLabel::Excellent);
        assert_eq!(bands.label(79), HealthLabel::Good);
        assert_eq!(bands.label(60), HealthLabel::Good);
        assert_eq!(bands.label(59), HealthLabel::Warning);

        let with_monitor = HealthBands {
            monitor: 40,
            ..HealthBands::default()
        };
        assert_eq!(with_monitor.label(45), HealthLabel::Monitor);
        assert_eq!(with_monitor.label(39), HealthLabel::Warning);
    }

    #[test]
    fn volatility_summary_for_known_series() {
        let summary = volatility(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((summary.roas_volatility - 2.0).abs() < 1e-9);
        assert!((summary.coefficient_of_variation - 0.4).abs() < 1e-9);
        assert_eq!(summary.best_day_roas, 9.0);
        assert_eq!(summary.worst_day_roas, 2.0);
    }

    #[test]
    fn scaling_detects_declining_returns() {
        let days = [day(10.0, 80.0), day(20.0, 150.0), day(100.0, 300.0), day(120.0, 360.0)];
        let analysis = scaling(&days);
        assert!((analysis.low_spend_roas - 230.0 / 30.0).abs() < 1e-9);
        assert!((analysis.high_spend_roas - 3.0).abs() < 1e-9);
        assert_eq!(analysis.category, ScalingCategory::NegativeScaling);
    }

    #[test]
    fn scaling_with_improving_returns_is_positive() {
        let days = [day(10.0, 20.0), day(50.0, 250.0), day(60.0, 360.0)];
        let analysis = scaling(&days);
        assert!(analysis.scaling_efficiency > 0.0);
        assert_eq!(analysis.category, ScalingCategory::PositiveScaling);
    }

    #[test]
    fn scaling_needs_two_spending_days() {
        let analysis = scaling(&[day(10.0, 50.0), day(0.0, 5.0)]);
        assert_eq!(analysis.category, ScalingCategory::InsufficientData);
        assert_eq!(analysis.scaling_efficiency, 0.0);
    }

    #[test]
    fn funnel_bar_caps_width() {
        let bar = funnel_bar(-7.5);
        assert_eq!(bar.width_pct, 100.0);
        assert_eq!(bar.tone, Tone::Negative);
        let small = funnel_bar(1.5);
        assert_eq!(small.width_pct, 30.0);
        assert_eq!(small.tone, Tone::Positive);
    }

    #[test]
    fn funnel_scores_against_benchmark() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let window = DateWindow::half_open(date, date);
        let benchmark = PeriodAggregate::new(
            window,
            MetricTotals {
                spend: 100.0,
                revenue: 400.0,
                impressions: 10_000,
                clicks: 100,
                purchases: 10,
            },
        );
        let entity = PeriodAggregate::new(
            window,
            MetricTotals {
                spend: 100.0,
                revenue: 600.0,
                impressions: 10_000,
                clicks: 100,
                purchases: 20,
            },
        );

        let scores = FunnelScores::against(&entity, &benchmark);
        assert_eq!(scores.tofu, 0.0);
        // CPC flat, conversion rate +100%
        assert!((scores.mofu - 5.0).abs() < 1e-9);
        // CPA -50% oriented to +50, ROAS +50%
        assert!((scores.bofu - 5.0).abs() < 1e-9);

        let analysis = funnel(scores, Some(FunnelStage::Tofu));
        assert_eq!(analysis.inferred_stage, FunnelStage::Bofu);
        assert!(analysis.is_misclassified);
        assert!(!funnel(scores, Some(FunnelStage::Bofu)).is_misclassified);
    }

    #[test]
    fn weekly_means_use_most_recent_full_weeks() {
        let mut daily = vec![100.0; 3];
        daily.extend([1.0; 7]);
        daily.extend([2.0; 7]);
        assert_eq!(weekly_means(&daily, 4), vec![1.0, 2.0]);
    }

    #[test]
    fn trend_classification() {
        let bands = TrendBands::default();
        let weeks = |values: [f64; 4]| -> Vec<f64> {
            values.iter().flat_map(|value| [*value; 7]).collect()
        };

        assert_eq!(
            performance_trend(&weeks([4.0, 4.4, 4.8, 5.2]), &bands).trend,
            PerformanceTrend::Improving
        );
        assert_eq!(
            performance_trend(&weeks([5.2, 4.8, 4.4, 4.0]), &bands).trend,
            PerformanceTrend::Declining
        );
        assert_eq!(
            performance_trend(&weeks([4.0, 4.1, 4.0, 4.05]), &bands).trend,
            PerformanceTrend::Stable
        );
        assert_eq!(
            performance_trend(&weeks([4.0, 6.0, 3.0, 4.0]), &bands).trend,
            PerformanceTrend::Volatile
        );
        assert_eq!(
            performance_trend(&[4.0, 5.0], &bands).trend,
            PerformanceTrend::Stable
        );
    }
}
