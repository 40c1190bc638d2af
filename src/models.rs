use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of metrics for one combination of dimension keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRecord {
    pub date: NaiveDate,
    pub platform: String,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub ad: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub purchases: u64,
}

impl DailyMetricRecord {
    pub fn new(date: NaiveDate, platform: impl Into<String>) -> Self {
        Self {
            date,
            platform: platform.into(),
            campaign: None,
            ad: None,
            country: None,
            spend: 0.0,
            revenue: 0.0,
            impressions: 0,
            clicks: 0,
            purchases: 0,
        }
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Platform => Some(self.platform.as_str()),
            Dimension::Campaign => self.campaign.as_deref(),
            Dimension::Ad => self.ad.as_deref(),
            Dimension::Country => self.country.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Platform,
    Campaign,
    Ad,
    Country,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Platform => "platform",
            Dimension::Campaign => "campaign",
            Dimension::Ad => "ad",
            Dimension::Country => "country",
        };
        f.write_str(name)
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "platform" => Ok(Dimension::Platform),
            "campaign" => Ok(Dimension::Campaign),
            "ad" => Ok(Dimension::Ad),
            "country" => Ok(Dimension::Country),
            _ => Err(format!("unknown dimension: {s}")),
        }
    }
}

/// Conjunction of `dimension = value` pairs. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    pairs: Vec<(Dimension, String)>,
}

impl DimensionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        self.pairs.retain(|(existing, _)| *existing != dimension);
        self.pairs.push((dimension, value.into()));
        self
    }

    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(existing, _)| *existing == dimension)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> &[(Dimension, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn matches(&self, record: &DailyMetricRecord) -> bool {
        self.pairs
            .iter()
            .all(|(dimension, value)| record.dimension(*dimension) == Some(value.as_str()))
    }
}

/// Summed raw counters for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub spend: f64,
    pub revenue: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: u64,
}

impl MetricTotals {
    pub fn add_record(&mut self, record: &DailyMetricRecord) {
        self.spend += record.spend;
        self.revenue += record.revenue;
        self.impressions += record.impressions;
        self.clicks += record.clicks;
        self.purchases += record.purchases;
    }

    pub fn merge(&mut self, other: &MetricTotals) {
        self.spend += other.spend;
        self.revenue += other.revenue;
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.purchases += other.purchases;
    }
}

/// One entry of a smoothed timeseries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingWindowPoint {
    pub date: NaiveDate,
    pub raw_value: f64,
    pub avg_7d: f64,
    pub avg_30d: f64,
}
