//! Readouts layered on top of the composite scores: account benchmark
//! indices, sample confidence, fatigue risk, risk flags, a recommended
//! action and target pacing.

use serde::{Deserialize, Serialize};

use crate::kpi::{safe_div, PeriodAggregate};
use crate::models::MetricTotals;
use crate::score::{
    HealthLabel, HealthScore, PerformanceTrend, ScalingCategory, VolatilitySummary,
};

/// ROAS index below which an entity is flagged as trailing the account.
const UNDERPERFORMING_INDEX: f64 = 80.0;
/// Coefficient of variation of daily ROAS above which an entity is flagged.
const VOLATILE_CV: f64 = 0.5;
/// Revenue target used when no monthly target is configured, relative to
/// actual revenue.
const DEFAULT_REVENUE_STRETCH: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkComparison {
    pub account_roas: f64,
    /// Entity ROAS as a multiple of the account ROAS.
    pub roas_vs_account_avg: f64,
    /// 100 means on par with the account.
    pub roas_index_vs_account: f64,
    /// Entity ROAS as a multiple of the target ROAS.
    pub efficiency_index: f64,
}

pub fn benchmark(roas: f64, account_roas: f64, target_roas: f64) -> BenchmarkComparison {
    let ratio = safe_div(roas, account_roas);
    BenchmarkComparison {
        account_roas,
        roas_vs_account_avg: ratio,
        roas_index_vs_account: ratio * 100.0,
        efficiency_index: safe_div(roas, target_roas),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatisticalConfidence {
    HighConfidence,
    MediumConfidence,
    LowConfidence,
}

/// Minimum purchases and active days for each confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceBands {
    pub high_purchases: u64,
    pub high_days: usize,
    pub medium_purchases: u64,
    pub medium_days: usize,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            high_purchases: 30,
            high_days: 14,
            medium_purchases: 10,
            medium_days: 7,
        }
    }
}

/// Confidence in the scores given the purchases behind them and the number
/// of days with spend.
pub fn confidence(
    totals: &MetricTotals,
    active_days: usize,
    bands: &ConfidenceBands,
) -> StatisticalConfidence {
    if totals.purchases >= bands.high_purchases && active_days >= bands.high_days {
        StatisticalConfidence::HighConfidence
    } else if totals.purchases >= bands.medium_purchases && active_days >= bands.medium_days {
        StatisticalConfidence::MediumConfidence
    } else {
        StatisticalConfidence::LowConfidence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FatigueRisk {
    #[serde(rename = "LOW_RISK")]
    Low,
    #[serde(rename = "MEDIUM_RISK")]
    Medium,
    #[serde(rename = "HIGH_RISK")]
    High,
}

/// CTR drops, in percent, that raise the fatigue risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueBands {
    pub medium_ctr_drop_pct: f64,
    pub high_ctr_drop_pct: f64,
}

impl Default for FatigueBands {
    fn default() -> Self {
        Self {
            medium_ctr_drop_pct: 10.0,
            high_ctr_drop_pct: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueAnalysis {
    /// Percent change of CTR, last 7 days against the 7 before.
    pub ctr_change: f64,
    pub risk: FatigueRisk,
}

/// A falling CTR is read as audience fatigue. A smaller CTR drop still
/// counts as medium risk when ROAS is declining too.
pub fn fatigue(ctr_change: f64, trend: PerformanceTrend, bands: &FatigueBands) -> FatigueAnalysis {
    let drop = -ctr_change;
    let risk = if drop >= bands.high_ctr_drop_pct {
        FatigueRisk::High
    } else if drop >= bands.medium_ctr_drop_pct
        || (drop > 0.0 && trend == PerformanceTrend::Declining)
    {
        FatigueRisk::Medium
    } else {
        FatigueRisk::Low
    };
    FatigueAnalysis { ctr_change, risk }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    BelowAccountAverage,
    BelowTarget,
    DecliningTrend,
    HighVolatility,
    NegativeScaling,
    CreativeFatigue,
    LowConfidence,
}

pub struct RiskInputs<'a> {
    pub benchmark: &'a BenchmarkComparison,
    pub trend: PerformanceTrend,
    pub volatility: &'a VolatilitySummary,
    pub scaling: ScalingCategory,
    pub fatigue: FatigueRisk,
    pub confidence: StatisticalConfidence,
}

pub fn risk_flags(inputs: &RiskInputs<'_>) -> Vec<RiskFlag> {
    let checks = [
        (
            RiskFlag::BelowAccountAverage,
            inputs.benchmark.roas_index_vs_account < UNDERPERFORMING_INDEX,
        ),
        (RiskFlag::BelowTarget, inputs.benchmark.efficiency_index < 1.0),
        (
            RiskFlag::DecliningTrend,
            inputs.trend == PerformanceTrend::Declining,
        ),
        (
            RiskFlag::HighVolatility,
            inputs.trend == PerformanceTrend::Volatile
                || inputs.volatility.coefficient_of_variation > VOLATILE_CV,
        ),
        (
            RiskFlag::NegativeScaling,
            inputs.scaling == ScalingCategory::NegativeScaling,
        ),
        (RiskFlag::CreativeFatigue, inputs.fatigue == FatigueRisk::High),
        (
            RiskFlag::LowConfidence,
            inputs.confidence == StatisticalConfidence::LowConfidence,
        ),
    ];

    checks
        .into_iter()
        .filter_map(|(flag, raised)| raised.then_some(flag))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    ScaleUp,
    Maintain,
    Optimize,
    RefreshCreative,
    ReduceSpend,
    GatherData,
}

pub fn recommend(
    health: &HealthScore,
    scaling: ScalingCategory,
    fatigue: FatigueRisk,
    confidence: StatisticalConfidence,
) -> RecommendedAction {
    match (health.label, scaling) {
        _ if confidence == StatisticalConfidence::LowConfidence => RecommendedAction::GatherData,
        _ if fatigue == FatigueRisk::High => RecommendedAction::RefreshCreative,
        (HealthLabel::Warning, ScalingCategory::NegativeScaling) => RecommendedAction::ReduceSpend,
        (HealthLabel::Excellent, ScalingCategory::PositiveScaling) => RecommendedAction::ScaleUp,
        (HealthLabel::Warning | HealthLabel::Monitor, _) => RecommendedAction::Optimize,
        _ => RecommendedAction::Maintain,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPacing {
    pub revenue: f64,
    pub revenue_target: f64,
    pub revenue_pct_of_target: f64,
    pub roas: f64,
    pub roas_target: f64,
    pub roas_pct_of_target: f64,
}

/// Current-window revenue and ROAS against targets. `monthly_targets` holds
/// one revenue target per calendar month, January first; a missing or
/// non-positive entry falls back to 110% of actual revenue.
pub fn pacing(
    current: &PeriodAggregate,
    month: u32,
    monthly_targets: &[f64],
    roas_target: f64,
) -> TargetPacing {
    let revenue = current.totals.revenue;
    let revenue_target = month
        .checked_sub(1)
        .and_then(|index| monthly_targets.get(index as usize))
        .copied()
        .filter(|target| *target > 0.0)
        .unwrap_or(revenue * DEFAULT_REVENUE_STRETCH);
    let roas = current.kpis.roas;

    TargetPacing {
        revenue,
        revenue_target,
        revenue_pct_of_target: safe_div(revenue, revenue_target) * 100.0,
        roas,
        roas_target,
        roas_pct_of_target: safe_div(roas, roas_target) * 100.0,
    }
}
