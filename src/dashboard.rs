//! Builds the dashboard payload for one section or a whole dashboard.
//!
//! A section is fetched once over the span covering every resolved window
//! and then aggregated in memory per window.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use futures::future::try_join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{self, GroupSort};
use crate::context::RequestContext;
use crate::delta::{self, ComparisonResult, Metric, MetricChange, Polarity};
use crate::error::EngineResult;
use crate::insight::{
    self, BenchmarkComparison, FatigueAnalysis, RecommendedAction, RiskFlag, RiskInputs,
    StatisticalConfidence, TargetPacing,
};
use crate::kpi::{self, DerivedKpis, PeriodAggregate};
use crate::models::{
    DailyMetricRecord, Dimension, DimensionFilter, MetricTotals, TrailingWindowPoint,
};
use crate::rolling;
use crate::score::{
    self, FunnelAnalysis, FunnelScores, FunnelStage, HealthScore, ScalingAnalysis, ScoringConfig,
    TrendAnalysis, VolatilitySummary,
};
use crate::source::{fetch_with_budget, MetricSource};
use crate::window::{self, ComparisonType, Preset, ResolvedWindows, WindowRequest, WindowSet};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub window: WindowRequest,
    pub filter: DimensionFilter,
    pub group_by: Option<Dimension>,
    pub group_sort: GroupSort,
    pub group_limit: usize,
    /// Declared funnel stage of the entity, if any.
    pub funnel_stage: Option<FunnelStage>,
}

impl DashboardRequest {
    pub fn new(window: WindowRequest) -> Self {
        Self {
            window,
            filter: DimensionFilter::all(),
            group_by: None,
            group_sort: GroupSort::default(),
            group_limit: 10,
            funnel_stage: None,
        }
    }

    pub fn with_filter(mut self, filter: DimensionFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    #[serde(flatten)]
    pub selected: MetricChange,
    #[serde(rename = "trailing7d")]
    pub trailing_7d: MetricChange,
    #[serde(rename = "trailing30d")]
    pub trailing_30d: MetricChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOfTotal {
    pub key: String,
    pub revenue_share: MetricChange,
    pub spend_share: MetricChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRow {
    pub key: String,
    pub totals: MetricTotals,
    pub kpis: DerivedKpis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionScores {
    pub health: HealthScore,
    pub scaling: ScalingAnalysis,
    pub trend: TrendAnalysis,
    pub volatility: VolatilitySummary,
    pub funnel: Option<FunnelAnalysis>,
    pub benchmark: BenchmarkComparison,
    pub statistical_confidence: StatisticalConfidence,
    pub fatigue: FatigueAnalysis,
    pub risk_flags: Vec<RiskFlag>,
    pub recommended_action: RecommendedAction,
    /// Selected current window against revenue and ROAS targets.
    pub pacing: TargetPacing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSection {
    pub client_id: String,
    pub request_id: Uuid,
    pub preset: Preset,
    pub comparison_type: ComparisonType,
    pub filter: BTreeMap<Dimension, String>,
    pub windows: ResolvedWindows,
    pub current: PeriodAggregate,
    pub previous: PeriodAggregate,
    /// Trailing-30d aggregate the section is scored on.
    #[serde(rename = "trailing30d")]
    pub trailing_30d: PeriodAggregate,
    pub metrics: BTreeMap<Metric, MetricSummary>,
    pub share_of_total: Vec<ShareOfTotal>,
    pub breakdown: Vec<BreakdownRow>,
    pub timeseries: Vec<TrailingWindowPoint>,
    pub scores: SectionScores,
}

impl DashboardSection {
    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.get(&metric)
    }

    pub fn label(&self) -> String {
        if self.filter.is_empty() {
            return "all platforms".to_string();
        }
        self.filter
            .iter()
            .map(|(dimension, value)| format!("{dimension}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub overall: DashboardSection,
    pub platforms: Vec<DashboardSection>,
}

/// Resolves windows, fetches once, and assembles one section.
#[tracing::instrument(
    skip_all,
    fields(client_id = %ctx.client_id, request_id = %ctx.request_id, preset = %request.window.preset)
)]
pub async fn build_section(
    source: &dyn MetricSource,
    ctx: &RequestContext,
    request: &DashboardRequest,
    config: &ScoringConfig,
    benchmark: Option<&PeriodAggregate>,
) -> EngineResult<DashboardSection> {
    let windows = window::resolve(&request.window, ctx.today)?;
    let records = fetch_with_budget(source, ctx, &windows.covering(), &request.filter).await?;
    let section = assemble(ctx, &windows, request, &records, config, benchmark);

    tracing::info!(
        rows = records.len(),
        health = section.scores.health.score,
        "dashboard section built"
    );
    Ok(section)
}

/// Overall section plus one section per platform. Platform sections are
/// scored against the overall trailing-30d aggregate and built concurrently.
pub async fn build_dashboard(
    source: &dyn MetricSource,
    ctx: &RequestContext,
    request: &DashboardRequest,
    platforms: &[String],
    config: &ScoringConfig,
) -> EngineResult<Dashboard> {
    let overall = build_section(source, ctx, request, config, None).await?;
    let benchmark = overall.trailing_30d;

    let platform_requests: Vec<DashboardRequest> = platforms
        .iter()
        .map(|platform| {
            request
                .clone()
                .with_filter(request.filter.clone().with(Dimension::Platform, platform.as_str()))
        })
        .collect();

    let sections = try_join_all(platform_requests.iter().map(|platform_request| {
        build_section(source, ctx, platform_request, config, Some(&benchmark))
    }))
    .await?;

    Ok(Dashboard {
        overall,
        platforms: sections,
    })
}

/// Pure assembly over already-fetched records.
pub fn assemble(
    ctx: &RequestContext,
    windows: &ResolvedWindows,
    request: &DashboardRequest,
    records: &[DailyMetricRecord],
    config: &ScoringConfig,
    benchmark: Option<&PeriodAggregate>,
) -> DashboardSection {
    let filter = &request.filter;
    let comparison_type = windows.comparison_type;

    let selected = compare_set(records, &windows.selected(), comparison_type, filter);
    let trailing_7d = compare_set(records, &windows.trailing_7d, comparison_type, filter);
    let trailing_30d = compare_set(records, &windows.trailing_30d, comparison_type, filter);

    let metrics = Metric::ALL
        .iter()
        .map(|metric| {
            let summary = MetricSummary {
                selected: selected.change(*metric),
                trailing_7d: trailing_7d.change(*metric),
                trailing_30d: trailing_30d.change(*metric),
            };
            (*metric, summary)
        })
        .collect();

    let current_daily = aggregate::daily_totals(records, &windows.current, filter);
    let timeseries = rolling::trailing_points(&roas_series(&current_daily));

    // Fatigue always looks at the last 7 days against the 7 before.
    let recent = compare_set(
        records,
        &windows.trailing_7d,
        ComparisonType::PreviousPeriod,
        filter,
    );
    let history = aggregate::daily_totals(records, &windows.trailing_30d.current, filter);
    let scores = score_section(
        &trailing_30d.current,
        &history,
        SectionSignals {
            ctr_change: recent.change(Metric::Ctr).change,
            selected: &selected.current,
            month: windows.current.start.month(),
        },
        request,
        config,
        benchmark,
    );

    let breakdown = request
        .group_by
        .map(|dimension| {
            aggregate::aggregate_by(
                records,
                &windows.current,
                filter,
                dimension,
                request.group_sort,
                request.group_limit,
            )
            .into_iter()
            .map(|group| BreakdownRow {
                key: group.key,
                kpis: DerivedKpis::from_totals(&group.totals),
                totals: group.totals,
            })
            .collect()
        })
        .unwrap_or_default();

    DashboardSection {
        client_id: ctx.client_id.clone(),
        request_id: ctx.request_id,
        preset: windows.preset,
        comparison_type,
        filter: filter.pairs().iter().cloned().collect(),
        windows: *windows,
        current: selected.current,
        previous: selected.previous,
        trailing_30d: trailing_30d.current,
        metrics,
        share_of_total: share_of_total(records, windows, filter),
        breakdown,
        timeseries,
        scores,
    }
}

fn compare_set(
    records: &[DailyMetricRecord],
    set: &WindowSet,
    comparison_type: ComparisonType,
    filter: &DimensionFilter,
) -> ComparisonResult {
    let current = aggregate::aggregate_period(records, &set.current, filter);
    let previous = aggregate::aggregate_period(records, &set.comparison(comparison_type), filter);
    delta::compare(current, previous)
}

fn roas_series(daily: &[(NaiveDate, MetricTotals)]) -> Vec<(NaiveDate, f64)> {
    daily
        .iter()
        .map(|(date, totals)| (*date, kpi::roas(totals)))
        .collect()
}

/// Inputs to scoring that come from outside the trailing-30d history.
struct SectionSignals<'a> {
    /// Percent change of CTR over the last 7 days.
    ctr_change: f64,
    /// Aggregate of the selected current window.
    selected: &'a PeriodAggregate,
    /// Calendar month of the selected window's start.
    month: u32,
}

fn score_section(
    current: &PeriodAggregate,
    history: &[(NaiveDate, MetricTotals)],
    signals: SectionSignals<'_>,
    request: &DashboardRequest,
    config: &ScoringConfig,
    benchmark: Option<&PeriodAggregate>,
) -> SectionScores {
    let daily_roas: Vec<f64> = roas_series(history).into_iter().map(|(_, roas)| roas).collect();
    let daily_totals: Vec<MetricTotals> = history.iter().map(|(_, totals)| *totals).collect();
    let active_days = daily_totals.iter().filter(|day| day.spend > 0.0).count();

    // Measured against the account average when one is available.
    let mut scoring = config.clone();
    if let Some(benchmark) = benchmark.filter(|benchmark| benchmark.kpis.roas > 0.0) {
        scoring.benchmark_roas = benchmark.kpis.roas;
    }
    // Without an account aggregate the section is the account.
    let account_roas = benchmark.map_or(current.kpis.roas, |benchmark| benchmark.kpis.roas);

    let health = score::health_score(current.kpis.roas, &daily_roas, &scoring);
    let scaling = score::scaling(&daily_totals);
    let trend = score::performance_trend(&daily_roas, &scoring.trend_bands);
    let volatility = score::volatility(&daily_roas);
    let comparison = insight::benchmark(current.kpis.roas, account_roas, scoring.target_roas);
    let statistical_confidence = insight::confidence(
        &current.totals,
        active_days,
        &scoring.confidence_bands,
    );
    let fatigue = insight::fatigue(signals.ctr_change, trend.trend, &scoring.fatigue_bands);
    let risk_flags = insight::risk_flags(&RiskInputs {
        benchmark: &comparison,
        trend: trend.trend,
        volatility: &volatility,
        scaling: scaling.category,
        fatigue: fatigue.risk,
        confidence: statistical_confidence,
    });
    let recommended_action = insight::recommend(
        &health,
        scaling.category,
        fatigue.risk,
        statistical_confidence,
    );
    let pacing = insight::pacing(
        signals.selected,
        signals.month,
        &scoring.monthly_revenue_targets,
        scoring.target_roas,
    );

    SectionScores {
        health,
        scaling,
        trend,
        volatility,
        funnel: benchmark.map(|benchmark| {
            score::funnel(FunnelScores::against(current, benchmark), request.funnel_stage)
        }),
        benchmark: comparison,
        statistical_confidence,
        fatigue,
        risk_flags,
        recommended_action,
        pacing,
    }
}

/// Each platform's share of revenue and spend in the current window, with
/// the movement against the comparison window in percentage points.
fn share_of_total(
    records: &[DailyMetricRecord],
    windows: &ResolvedWindows,
    filter: &DimensionFilter,
) -> Vec<ShareOfTotal> {
    let comparison = windows.comparison();
    let current_total = aggregate::aggregate(records, &windows.current, filter);
    let previous_total = aggregate::aggregate(records, &comparison, filter);

    let groups = aggregate::aggregate_by(
        records,
        &windows.current,
        filter,
        Dimension::Platform,
        GroupSort::default(),
        usize::MAX,
    );

    groups
        .into_iter()
        .map(|group| {
            let platform_filter = filter.clone().with(Dimension::Platform, group.key.as_str());
            let previous = aggregate::aggregate(records, &comparison, &platform_filter);

            ShareOfTotal {
                revenue_share: MetricChange::share(
                    kpi::safe_div(group.totals.revenue, current_total.revenue) * 100.0,
                    kpi::safe_div(previous.revenue, previous_total.revenue) * 100.0,
                    Polarity::HigherIsBetter,
                ),
                spend_share: MetricChange::share(
                    kpi::safe_div(group.totals.spend, current_total.spend) * 100.0,
                    kpi::safe_div(previous.spend, previous_total.spend) * 100.0,
                    Polarity::LowerIsBetter,
                ),
                key: group.key,
            }
        })
        .collect()
}
