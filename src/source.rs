//! The seam between the engine and wherever daily rows live.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::context::RequestContext;
use crate::error::SourceError;
use crate::models::{DailyMetricRecord, DimensionFilter};
use crate::window::DateWindow;

#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Rows for `ctx.client_id` inside `window` that match `filter`.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        window: &DateWindow,
        filter: &DimensionFilter,
    ) -> Result<Vec<DailyMetricRecord>, SourceError>;
}

/// Calls the source under the context's time budget.
pub async fn fetch_with_budget(
    source: &dyn MetricSource,
    ctx: &RequestContext,
    window: &DateWindow,
    filter: &DimensionFilter,
) -> Result<Vec<DailyMetricRecord>, SourceError> {
    tracing::debug!(
        client_id = %ctx.client_id,
        request_id = %ctx.request_id,
        %window,
        "fetching daily metrics"
    );

    match tokio::time::timeout(ctx.query_timeout, source.fetch(ctx, window, filter)).await {
        Ok(Ok(records)) => {
            tracing::debug!(request_id = %ctx.request_id, rows = records.len(), "fetched");
            Ok(records)
        }
        Ok(Err(err)) => {
            tracing::warn!(request_id = %ctx.request_id, error = %err, "metric source failed");
            Err(err)
        }
        Err(_) => {
            let budget_ms = ctx.query_timeout.as_millis() as u64;
            tracing::warn!(request_id = %ctx.request_id, budget_ms, "metric source timed out");
            Err(SourceError::Timeout(budget_ms))
        }
    }
}

/// Rows held in memory, keyed by client.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<(String, DailyMetricRecord)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client_id: impl Into<String>, record: DailyMetricRecord) {
        self.rows.push((client_id.into(), record));
    }

    pub fn extend(
        &mut self,
        client_id: &str,
        records: impl IntoIterator<Item = DailyMetricRecord>,
    ) {
        for record in records {
            self.insert(client_id, record);
        }
    }
}

#[async_trait]
impl MetricSource for MemorySource {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        window: &DateWindow,
        filter: &DimensionFilter,
    ) -> Result<Vec<DailyMetricRecord>, SourceError> {
        Ok(self
            .rows
            .iter()
            .filter(|(client_id, record)| {
                *client_id == ctx.client_id && window.contains(record.date) && filter.matches(record)
            })
            .map(|(_, record)| record.clone())
            .collect())
    }
}

// csv cannot deserialize through `#[serde(flatten)]`, so the columns are
// spelled out here.
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(default)]
    client_id: Option<String>,
    date: NaiveDate,
    platform: String,
    #[serde(default)]
    campaign: Option<String>,
    #[serde(default)]
    ad: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    spend: Option<f64>,
    #[serde(default)]
    revenue: Option<f64>,
    #[serde(default)]
    impressions: Option<u64>,
    #[serde(default)]
    clicks: Option<u64>,
    #[serde(default)]
    purchases: Option<u64>,
}

impl CsvRow {
    fn into_parts(self) -> (Option<String>, DailyMetricRecord) {
        let record = DailyMetricRecord {
            date: self.date,
            platform: self.platform,
            campaign: self.campaign,
            ad: self.ad,
            country: self.country,
            spend: self.spend.unwrap_or_default(),
            revenue: self.revenue.unwrap_or_default(),
            impressions: self.impressions.unwrap_or_default(),
            clicks: self.clicks.unwrap_or_default(),
            purchases: self.purchases.unwrap_or_default(),
        };
        (self.client_id, record)
    }
}

/// Reads a CSV export on every fetch.
///
/// An export without a `client_id` column is visible to every client. When
/// the column is present, rows are returned only to the client they name and
/// rows with a blank cell are returned to nobody.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parsed contents of a CSV export.
#[derive(Debug, Clone, Default)]
pub struct CsvExport {
    /// Whether the header row names a `client_id` column.
    pub has_client_column: bool,
    pub rows: Vec<(Option<String>, DailyMetricRecord)>,
}

impl CsvExport {
    /// Records visible to `client_id`.
    pub fn visible_to<'a>(
        &'a self,
        client_id: &'a str,
    ) -> impl Iterator<Item = &'a DailyMetricRecord> + 'a {
        self.rows
            .iter()
            .filter(move |(owner, _)| {
                !self.has_client_column || owner.as_deref() == Some(client_id)
            })
            .map(|(_, record)| record)
    }
}

pub fn read_csv_rows(path: &Path) -> Result<CsvExport, SourceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let has_client_column = reader
        .headers()?
        .iter()
        .any(|header| header.trim() == "client_id");

    let mut rows = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row: CsvRow = result?;
        rows.push(row.into_parts());
    }
    Ok(CsvExport {
        has_client_column,
        rows,
    })
}

#[async_trait]
impl MetricSource for CsvSource {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        window: &DateWindow,
        filter: &DimensionFilter,
    ) -> Result<Vec<DailyMetricRecord>, SourceError> {
        let path = self.path.clone();
        let export = tokio::task::spawn_blocking(move || read_csv_rows(&path))
            .await
            .map_err(|err| SourceError::Unavailable(err.to_string()))??;

        Ok(export
            .visible_to(&ctx.client_id)
            .filter(|record| window.contains(record.date) && filter.matches(record))
            .cloned()
            .collect())
    }
}
