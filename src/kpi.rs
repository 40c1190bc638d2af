//! Ratio KPIs derived from summed totals.
//!
//! Every ratio resolves to `0.0` when its denominator is zero so that
//! `NaN`/`Infinity` never reach the output.

use serde::Serialize;

use crate::models::MetricTotals;
use crate::window::DateWindow;

/// Division that yields `0.0` instead of a non-finite value.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn roas(totals: &MetricTotals) -> f64 {
    safe_div(totals.revenue, totals.spend)
}

pub fn ctr(totals: &MetricTotals) -> f64 {
    safe_div(totals.clicks as f64, totals.impressions as f64) * 100.0
}

pub fn cpa(totals: &MetricTotals) -> f64 {
    safe_div(totals.spend, totals.purchases as f64)
}

pub fn cpc(totals: &MetricTotals) -> f64 {
    safe_div(totals.spend, totals.clicks as f64)
}

pub fn cpm(totals: &MetricTotals) -> f64 {
    safe_div(totals.spend, totals.impressions as f64) * 1000.0
}

pub fn conversion_rate(totals: &MetricTotals) -> f64 {
    safe_div(totals.purchases as f64, totals.clicks as f64) * 100.0
}

pub fn aov(totals: &MetricTotals) -> f64 {
    safe_div(totals.revenue, totals.purchases as f64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedKpis {
    pub roas: f64,
    pub ctr: f64,
    pub cpa: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub conversion_rate: f64,
    pub aov: f64,
}

impl DerivedKpis {
    pub fn from_totals(totals: &MetricTotals) -> Self {
        Self {
            roas: roas(totals),
            ctr: ctr(totals),
            cpa: cpa(totals),
            cpc: cpc(totals),
            cpm: cpm(totals),
            conversion_rate: conversion_rate(totals),
            aov: aov(totals),
        }
    }
}

/// Totals for one window plus the ratios derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAggregate {
    pub window: DateWindow,
    pub totals: MetricTotals,
    pub kpis: DerivedKpis,
}

impl PeriodAggregate {
    pub fn new(window: DateWindow, totals: MetricTotals) -> Self {
        Self {
            window,
            totals,
            kpis: DerivedKpis::from_totals(&totals),
        }
    }
}
