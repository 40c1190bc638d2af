//! Period-over-period change with metric polarity.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::kpi::{safe_div, PeriodAggregate};

/// Relative change in percent; `0.0` when there is no previous value.
pub fn pct_change(current: f64, previous: f64) -> f64 {
    safe_div(current - previous, previous) * 100.0
}

/// Change between two shares, in percentage points.
pub fn pp_change(current_pct: f64, previous_pct: f64) -> f64 {
    current_pct - previous_pct
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Spend,
    Revenue,
    Impressions,
    Clicks,
    Purchases,
    Roas,
    Ctr,
    Cpa,
    Cpc,
    Cpm,
    ConversionRate,
    Aov,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Spend,
        Metric::Revenue,
        Metric::Impressions,
        Metric::Clicks,
        Metric::Purchases,
        Metric::Roas,
        Metric::Ctr,
        Metric::Cpa,
        Metric::Cpc,
        Metric::Cpm,
        Metric::ConversionRate,
        Metric::Aov,
    ];

    pub fn polarity(&self) -> Polarity {
        match self {
            Metric::Spend | Metric::Cpa | Metric::Cpc | Metric::Cpm => Polarity::LowerIsBetter,
            _ => Polarity::HigherIsBetter,
        }
    }

    pub fn value(&self, period: &PeriodAggregate) -> f64 {
        let totals = &period.totals;
        let kpis = &period.kpis;
        match self {
            Metric::Spend => totals.spend,
            Metric::Revenue => totals.revenue,
            Metric::Impressions => totals.impressions as f64,
            Metric::Clicks => totals.clicks as f64,
            Metric::Purchases => totals.purchases as f64,
            Metric::Roas => kpis.roas,
            Metric::Ctr => kpis.ctr,
            Metric::Cpa => kpis.cpa,
            Metric::Cpc => kpis.cpc,
            Metric::Cpm => kpis.cpm,
            Metric::ConversionRate => kpis.conversion_rate,
            Metric::Aov => kpis.aov,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::Revenue => "revenue",
            Metric::Impressions => "impressions",
            Metric::Clicks => "clicks",
            Metric::Purchases => "purchases",
            Metric::Roas => "roas",
            Metric::Ctr => "ctr",
            Metric::Cpa => "cpa",
            Metric::Cpc => "cpc",
            Metric::Cpm => "cpm",
            Metric::ConversionRate => "conversionRate",
            Metric::Aov => "aov",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Favorable,
    Unfavorable,
}

impl Polarity {
    /// A zero change is never worse, so it counts as favorable.
    pub fn classify(&self, change: f64) -> Direction {
        let worse = match self {
            Polarity::HigherIsBetter => change < 0.0,
            Polarity::LowerIsBetter => change > 0.0,
        };
        if worse {
            Direction::Unfavorable
        } else {
            Direction::Favorable
        }
    }

    /// Flips a change so that positive always means better.
    pub fn orient(&self, change: f64) -> f64 {
        match self {
            Polarity::HigherIsBetter => change,
            Polarity::LowerIsBetter => -change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Percent,
    PercentagePoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricChange {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    pub change_kind: ChangeKind,
    pub direction: Direction,
}

impl MetricChange {
    pub fn relative(current: f64, previous: f64, polarity: Polarity) -> Self {
        let change = pct_change(current, previous);
        Self {
            current,
            previous,
            change,
            change_kind: ChangeKind::Percent,
            direction: polarity.classify(change),
        }
    }

    /// Share-of-total movement, in percentage points.
    pub fn share(current_pct: f64, previous_pct: f64, polarity: Polarity) -> Self {
        let change = pp_change(current_pct, previous_pct);
        Self {
            current: current_pct,
            previous: previous_pct,
            change,
            change_kind: ChangeKind::PercentagePoints,
            direction: polarity.classify(change),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub current: PeriodAggregate,
    pub previous: PeriodAggregate,
    pub metrics: BTreeMap<Metric, MetricChange>,
}

impl ComparisonResult {
    pub fn change(&self, metric: Metric) -> MetricChange {
        self.metrics
            .get(&metric)
            .copied()
            .unwrap_or_else(|| metric_change(metric, &self.current, &self.previous))
    }
}

pub fn metric_change(
    metric: Metric,
    current: &PeriodAggregate,
    previous: &PeriodAggregate,
) -> MetricChange {
    MetricChange::relative(metric.value(current), metric.value(previous), metric.polarity())
}

pub fn compare(current: PeriodAggregate, previous: PeriodAggregate) -> ComparisonResult {
    let metrics = Metric::ALL
        .iter()
        .map(|metric| (*metric, metric_change(*metric, &current, &previous)))
        .collect();
    ComparisonResult {
        current,
        previous,
        metrics,
    }
}
