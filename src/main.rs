use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use campaign_pulse::aggregate::{GroupSort, SortField};
use campaign_pulse::config::EngineConfig;
use campaign_pulse::dashboard::{self, DashboardRequest};
use campaign_pulse::score::FunnelStage;
use campaign_pulse::source::{CsvSource, MetricSource};
use campaign_pulse::{
    db, logging, report, window, ComparisonType, Dimension, DimensionFilter, Preset,
    RequestContext, WindowRequest,
};

#[derive(Parser)]
#[command(name = "campaign-pulse")]
#[command(about = "Comparative marketing metrics over date windows", long_about = None)]
struct Cli {
    /// JSON file with engine tunables
    #[arg(long, global = true, env = "CAMPAIGN_PULSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb {
        #[command(flatten)]
        database: DbArgs,
    },
    /// Load sixty days of realistic sample metrics
    Seed {
        #[command(flatten)]
        database: DbArgs,
        #[arg(long, env = "CLIENT_ID")]
        client: String,
    },
    /// Import daily metrics from a CSV file
    Import {
        #[command(flatten)]
        database: DbArgs,
        #[arg(long)]
        csv: PathBuf,
        /// Client for rows without a client_id column
        #[arg(long, env = "CLIENT_ID")]
        client: String,
    },
    /// Print the resolved date windows as JSON
    Windows {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Build dashboard sections and print them as JSON
    Dashboard {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a markdown report for the dashboard
    Report {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, default_value = "last7")]
    preset: Preset,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long, default_value = "previous-period")]
    comparison: ComparisonType,
    /// Reference date; windows end the day before. Defaults to today (UTC).
    #[arg(long)]
    today: Option<NaiveDate>,
}

impl RangeArgs {
    fn request(&self) -> WindowRequest {
        WindowRequest {
            preset: self.preset,
            start: self.start,
            end: self.end,
            comparison: self.comparison,
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long, env = "CLIENT_ID")]
    client: String,
    /// Read rows from a CSV export instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    campaign: Option<String>,
    #[arg(long)]
    ad: Option<String>,
    #[arg(long)]
    country: Option<String>,
    /// Break the current window down by this dimension
    #[arg(long)]
    group_by: Option<Dimension>,
    #[arg(long, default_value = "spend")]
    sort: SortField,
    #[arg(long)]
    ascending: bool,
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Declared funnel stage (TOFU, MOFU, BOFU)
    #[arg(long)]
    funnel_stage: Option<FunnelStage>,
}

impl ScopeArgs {
    fn filter(&self) -> DimensionFilter {
        let mut filter = DimensionFilter::all();
        for (dimension, value) in [
            (Dimension::Platform, &self.platform),
            (Dimension::Campaign, &self.campaign),
            (Dimension::Ad, &self.ad),
            (Dimension::Country, &self.country),
        ] {
            if let Some(value) = value {
                filter = filter.with(dimension, value.as_str());
            }
        }
        filter
    }

    fn dashboard_request(&self, window: WindowRequest) -> DashboardRequest {
        let mut request = DashboardRequest::new(window).with_filter(self.filter());
        request.group_by = self.group_by;
        request.group_sort = GroupSort {
            field: self.sort,
            descending: !self.ascending,
        };
        request.group_limit = self.limit;
        request.funnel_stage = self.funnel_stage;
        request
    }

    async fn source(&self) -> anyhow::Result<Arc<dyn MetricSource>> {
        if let Some(path) = &self.csv {
            tracing::info!(path = %path.display(), "reading metrics from csv");
            return Ok(Arc::new(CsvSource::new(path)));
        }
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL or --csv is required")?;
        let pool = connect(database_url).await?;
        Ok(Arc::new(db::PgMetricSource::new(pool)))
    }
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn build(
    range: &RangeArgs,
    scope: &ScopeArgs,
    config: &EngineConfig,
) -> anyhow::Result<dashboard::Dashboard> {
    let source = scope.source().await?;
    let ctx = RequestContext::new(scope.client.as_str(), range.today(), config.query_timeout());
    let request = scope.dashboard_request(range.request());

    // A platform-filtered request gets no per-platform fan-out.
    let platforms: &[String] = if request.filter.value(Dimension::Platform).is_some() {
        &[]
    } else {
        &config.platforms
    };

    dashboard::build_dashboard(source.as_ref(), &ctx, &request, platforms, &config.scoring)
        .await
        .context("failed to build dashboard")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_from_env()?;
    let cli = Cli::parse();
    let config =
        EngineConfig::load(cli.config.as_deref()).context("failed to load engine config")?;

    match cli.command {
        Commands::InitDb { database } => {
            let pool = connect(&database.database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { database, client } => {
            let pool = connect(&database.database_url).await?;
            let inserted = db::seed(&pool, &client, Utc::now().date_naive()).await?;
            println!("Seeded {inserted} daily rows for {client}.");
        }
        Commands::Import {
            database,
            csv,
            client,
        } => {
            let pool = connect(&database.database_url).await?;
            let inserted = db::import_csv(&pool, &csv, &client).await?;
            println!("Imported {inserted} daily rows from {}.", csv.display());
        }
        Commands::Windows { range } => {
            let windows = window::resolve(&range.request(), range.today())?;
            println!("{}", serde_json::to_string_pretty(&windows)?);
        }
        Commands::Dashboard { range, scope, out } => {
            let dashboard = build(&range, &scope, &config).await?;
            let json = serde_json::to_string_pretty(&dashboard)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Dashboard written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Report { range, scope, out } => {
            let dashboard = build(&range, &scope, &config).await?;
            std::fs::write(&out, report::build_report(&dashboard))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
