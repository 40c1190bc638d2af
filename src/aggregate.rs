//! Summing daily records into per-window totals.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::kpi::{self, PeriodAggregate};
use crate::models::{DailyMetricRecord, Dimension, DimensionFilter, MetricTotals};
use crate::window::DateWindow;

/// Group key for records that do not carry the grouped dimension.
pub const MISSING_KEY: &str = "(none)";

pub fn aggregate(
    records: &[DailyMetricRecord],
    window: &DateWindow,
    filter: &DimensionFilter,
) -> MetricTotals {
    let mut totals = MetricTotals::default();
    for record in matching(records, window, filter) {
        totals.add_record(record);
    }
    totals
}

pub fn aggregate_period(
    records: &[DailyMetricRecord],
    window: &DateWindow,
    filter: &DimensionFilter,
) -> PeriodAggregate {
    PeriodAggregate::new(*window, aggregate(records, window, filter))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Spend,
    Revenue,
    Impressions,
    Clicks,
    Purchases,
    Roas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for GroupSort {
    fn default() -> Self {
        Self {
            field: SortField::Spend,
            descending: true,
        }
    }
}

impl SortField {
    fn value(&self, totals: &MetricTotals) -> f64 {
        match self {
            SortField::Spend => totals.spend,
            SortField::Revenue => totals.revenue,
            SortField::Impressions => totals.impressions as f64,
            SortField::Clicks => totals.clicks as f64,
            SortField::Purchases => totals.purchases as f64,
            SortField::Roas => kpi::roas(totals),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spend" => Ok(SortField::Spend),
            "revenue" => Ok(SortField::Revenue),
            "impressions" => Ok(SortField::Impressions),
            "clicks" => Ok(SortField::Clicks),
            "purchases" => Ok(SortField::Purchases),
            "roas" => Ok(SortField::Roas),
            _ => Err(format!("unknown sort field: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedTotals {
    pub key: String,
    pub totals: MetricTotals,
}

/// One aggregate per distinct value of `dimension`, sorted and capped.
pub fn aggregate_by(
    records: &[DailyMetricRecord],
    window: &DateWindow,
    filter: &DimensionFilter,
    dimension: Dimension,
    sort: GroupSort,
    limit: usize,
) -> Vec<GroupedTotals> {
    let mut groups: HashMap<String, MetricTotals> = HashMap::new();

    for record in matching(records, window, filter) {
        let key = record.dimension(dimension).unwrap_or(MISSING_KEY);
        groups.entry(key.to_string()).or_default().add_record(record);
    }

    let mut values: Vec<GroupedTotals> = groups
        .into_iter()
        .map(|(key, totals)| GroupedTotals { key, totals })
        .collect();

    values.sort_by(|a, b| {
        let ordering = sort
            .field
            .value(&a.totals)
            .partial_cmp(&sort.field.value(&b.totals))
            .unwrap_or(Ordering::Equal);
        let ordering = if sort.descending {
            ordering.reverse()
        } else {
            ordering
        };
        ordering.then_with(|| a.key.cmp(&b.key))
    });
    values.truncate(limit);
    values
}

/// Per-day totals for dates that have at least one matching record.
pub fn daily_totals(
    records: &[DailyMetricRecord],
    window: &DateWindow,
    filter: &DimensionFilter,
) -> Vec<(NaiveDate, MetricTotals)> {
    let mut days: BTreeMap<NaiveDate, MetricTotals> = BTreeMap::new();
    for record in matching(records, window, filter) {
        days.entry(record.date).or_default().add_record(record);
    }
    days.into_iter().collect()
}

fn matching<'a>(
    records: &'a [DailyMetricRecord],
    window: &'a DateWindow,
    filter: &'a DimensionFilter,
) -> impl Iterator<Item = &'a DailyMetricRecord> + 'a {
    records
        .iter()
        .filter(move |record| window.contains(record.date) && filter.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn record(day: u32, platform: &str, campaign: &str, spend: f64, revenue: f64) -> DailyMetricRecord {
        let mut record = DailyMetricRecord::new(d(day), platform);
        record.campaign = Some(campaign.to_string());
        record.spend = spend;
        record.revenue = revenue;
        record.clicks = 10;
        record
    }

    fn sample() -> Vec<DailyMetricRecord> {
        vec![
            record(1, "Facebook", "Spring", 100.0, 400.0),
            record(3, "Facebook", "Winter", 50.0, 100.0),
            record(3, "Google", "Brand", 80.0, 640.0),
            record(8, "Facebook", "Spring", 70.0, 210.0),
            record(9, "Google", "Brand", 10.0, 10.0),
        ]
    }

    #[test]
    fn sums_only_records_inside_window() {
        let window = DateWindow::half_open(d(1), d(8));
        let totals = aggregate(&sample(), &window, &DimensionFilter::all());
        assert_eq!(totals.spend, 230.0);
        assert_eq!(totals.revenue, 1140.0);
        assert_eq!(totals.clicks, 30);
    }

    #[test]
    fn filter_narrows_to_platform() {
        let window = DateWindow::inclusive(d(1), d(8));
        let filter = DimensionFilter::all().with(Dimension::Platform, "Facebook");
        let totals = aggregate(&sample(), &window, &filter);
        assert_eq!(totals.spend, 220.0);
    }

    #[test]
    fn absent_dimension_value_aggregates_to_zero() {
        let window = DateWindow::half_open(d(1), d(31));
        let filter = DimensionFilter::all().with(Dimension::Platform, "Email");
        let period = aggregate_period(&sample(), &window, &filter);
        assert_eq!(period.totals, MetricTotals::default());
        assert_eq!(period.kpis.roas, 0.0);
    }

    #[test]
    fn grouping_respects_sort_and_cap() {
        let window = DateWindow::half_open(d(1), d(31));
        let groups = aggregate_by(
            &sample(),
            &window,
            &DimensionFilter::all(),
            Dimension::Campaign,
            GroupSort::default(),
            2,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "Spring");
        assert_eq!(groups[0].totals.spend, 170.0);
        assert_eq!(groups[1].key, "Brand");

        let by_roas = aggregate_by(
            &sample(),
            &window,
            &DimensionFilter::all(),
            Dimension::Campaign,
            GroupSort {
                field: SortField::Roas,
                descending: false,
            },
            10,
        );
        assert_eq!(by_roas[0].key, "Winter");
    }

    #[test]
    fn missing_dimension_groups_under_placeholder() {
        let window = DateWindow::half_open(d(1), d(31));
        let groups = aggregate_by(
            &sample(),
            &window,
            &DimensionFilter::all(),
            Dimension::Country,
            GroupSort::default(),
            10,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, MISSING_KEY);
    }

    #[test]
    fn daily_totals_skip_gaps_in_order() {
        let window = DateWindow::half_open(d(1), d(31));
        let days = daily_totals(&sample(), &window, &DimensionFilter::all());
        let dates: Vec<NaiveDate> = days.iter().map(|(date, _)| *date).collect();
        assert_eq!(dates, vec![d(1), d(3), d(8), d(9)]);
        assert_eq!(days[1].1.spend, 130.0);
    }
}
