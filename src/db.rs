use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::SourceError;
use crate::models::{DailyMetricRecord, Dimension, DimensionFilter};
use crate::source::{self, MetricSource};
use crate::window::DateWindow;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed source over `marketing.daily_metrics`.
#[derive(Debug, Clone)]
pub struct PgMetricSource {
    pool: PgPool,
}

impl PgMetricSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Platform => "platform",
        Dimension::Campaign => "campaign",
        Dimension::Ad => "ad",
        Dimension::Country => "country",
    }
}

/// SQL for one window and filter. The window always becomes a half-open
/// date predicate; `$1` is the client, `$2`/`$3` the bounds, filter values
/// follow in order.
pub fn build_query(filter: &DimensionFilter) -> String {
    let mut query = String::from(
        "SELECT metric_date, platform, NULLIF(campaign, '') AS campaign, \
         NULLIF(ad, '') AS ad, NULLIF(country, '') AS country, \
         COALESCE(spend, 0) AS spend, COALESCE(revenue, 0) AS revenue, \
         COALESCE(impressions, 0) AS impressions, COALESCE(clicks, 0) AS clicks, \
         COALESCE(purchases, 0) AS purchases \
         FROM marketing.daily_metrics \
         WHERE client_id = $1 AND metric_date >= $2 AND metric_date < $3",
    );

    for (index, (dimension, _)) in filter.pairs().iter().enumerate() {
        query.push_str(&format!(" AND {} = ${}", column(*dimension), index + 4));
    }
    query.push_str(" ORDER BY metric_date");
    query
}

#[async_trait]
impl MetricSource for PgMetricSource {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        window: &DateWindow,
        filter: &DimensionFilter,
    ) -> Result<Vec<DailyMetricRecord>, SourceError> {
        let query = build_query(filter);
        let mut rows = sqlx::query(&query)
            .bind(&ctx.client_id)
            .bind(window.start)
            .bind(window.exclusive_end());
        for (_, value) in filter.pairs() {
            rows = rows.bind(value);
        }

        let records = rows
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                SourceError::from_sqlx(&err, self.pool.options().get_acquire_timeout())
            })?;

        let mut metrics = Vec::with_capacity(records.len());
        for row in records {
            metrics.push(DailyMetricRecord {
                date: row.get("metric_date"),
                platform: row.get("platform"),
                campaign: row.get("campaign"),
                ad: row.get("ad"),
                country: row.get("country"),
                spend: row.get("spend"),
                revenue: row.get("revenue"),
                impressions: row.get::<i64, _>("impressions").max(0) as u64,
                clicks: row.get::<i64, _>("clicks").max(0) as u64,
                purchases: row.get::<i64, _>("purchases").max(0) as u64,
            });
        }

        Ok(metrics)
    }
}

async fn upsert(pool: &PgPool, client_id: &str, record: &DailyMetricRecord) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO marketing.daily_metrics
        (id, client_id, metric_date, platform, campaign, ad, country,
         spend, revenue, impressions, clicks, purchases)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (client_id, metric_date, platform, campaign, ad, country) DO UPDATE
        SET spend = EXCLUDED.spend, revenue = EXCLUDED.revenue,
            impressions = EXCLUDED.impressions, clicks = EXCLUDED.clicks,
            purchases = EXCLUDED.purchases
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(client_id)
    .bind(record.date)
    .bind(&record.platform)
    .bind(record.campaign.as_deref().unwrap_or(""))
    .bind(record.ad.as_deref().unwrap_or(""))
    .bind(record.country.as_deref().unwrap_or(""))
    .bind(record.spend)
    .bind(record.revenue)
    .bind(record.impressions as i64)
    .bind(record.clicks as i64)
    .bind(record.purchases as i64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Sixty days of two-platform history for `client_id` ending yesterday.
pub fn seed_records(today: NaiveDate) -> Vec<DailyMetricRecord> {
    let campaigns = [
        ("Facebook", "Prospecting - Broad", 180.0, 4.2),
        ("Facebook", "Retargeting - 30d", 90.0, 7.8),
        ("Google", "Brand Search", 60.0, 9.5),
        ("Google", "Shopping - All Products", 140.0, 5.1),
    ];

    let mut records = Vec::new();
    for offset in 1..=60i64 {
        let date = today - Duration::days(offset);
        // Deterministic weekly wave so trend and stability scores are non-trivial.
        let wave = 1.0 + 0.15 * ((offset % 7) as f64 - 3.0) / 3.0;
        for (index, (platform, campaign, base_spend, base_roas)) in campaigns.iter().enumerate() {
            let drift = 1.0 + (index as f64 - 1.5) * 0.002 * (60 - offset) as f64;
            let spend = base_spend * wave;
            let revenue = spend * base_roas * drift;
            let impressions = (spend * 95.0) as u64;
            let clicks = impressions / 80;
            let mut record = DailyMetricRecord::new(date, *platform);
            record.campaign = Some(campaign.to_string());
            record.country = Some("US".to_string());
            record.spend = (spend * 100.0).round() / 100.0;
            record.revenue = (revenue * 100.0).round() / 100.0;
            record.impressions = impressions;
            record.clicks = clicks;
            record.purchases = (revenue / 85.0).round() as u64;
            records.push(record);
        }
    }
    records
}

pub async fn seed(pool: &PgPool, client_id: &str, today: NaiveDate) -> anyhow::Result<usize> {
    let records = seed_records(today);
    for record in &records {
        upsert(pool, client_id, record).await?;
    }
    tracing::info!(client_id, rows = records.len(), "seeded daily metrics");
    Ok(records.len())
}

/// Loads a CSV export. Rows without a `client_id` (missing column or blank
/// cell) are assigned to `default_client`.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &Path,
    default_client: &str,
) -> anyhow::Result<usize> {
    let export = source::read_csv_rows(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    let mut written = 0usize;

    for (client_id, record) in export.rows {
        let client_id = client_id.as_deref().unwrap_or(default_client);
        if upsert(pool, client_id, &record).await? > 0 {
            written += 1;
        }
    }

    tracing::info!(rows = written, path = %csv_path.display(), "imported daily metrics");
    Ok(written)
}
