//! Time-windowed comparative metrics for marketing dashboards.
//!
//! The flow for one request is: [`window::resolve`] a preset into windows,
//! fetch rows through a [`source::MetricSource`], [`aggregate`] them per
//! window, derive [`kpi`] ratios, [`delta::compare`] periods, smooth daily
//! series with [`rolling`], and finish with the composite [`score`]s and
//! the [`insight`] readouts built on them.
//! [`dashboard`] wires those steps together.

pub mod aggregate;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod db;
pub mod delta;
pub mod error;
pub mod insight;
pub mod kpi;
pub mod logging;
pub mod models;
pub mod report;
pub mod rolling;
pub mod score;
pub mod source;
pub mod window;

pub use context::RequestContext;
pub use error::{EngineError, EngineResult, SourceError};
pub use models::{DailyMetricRecord, Dimension, DimensionFilter, MetricTotals};
pub use window::{ComparisonType, DateWindow, Preset, ResolvedWindows, WindowRequest};
