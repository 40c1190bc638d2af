use std::fmt::Write;

use crate::dashboard::{Dashboard, DashboardSection};
use crate::delta::{ChangeKind, Direction, Metric, MetricChange};

const HEADLINE_METRICS: [Metric; 6] = [
    Metric::Spend,
    Metric::Revenue,
    Metric::Roas,
    Metric::Cpa,
    Metric::Ctr,
    Metric::ConversionRate,
];

fn format_change(change: &MetricChange) -> String {
    let arrow = if change.change >= 0.0 { "↑" } else { "↓" };
    let unit = match change.change_kind {
        ChangeKind::Percent => "%",
        ChangeKind::PercentagePoints => " pp",
    };
    let marker = match change.direction {
        Direction::Favorable => "",
        Direction::Unfavorable => " ⚠",
    };
    format!("{arrow} {:.1}{unit}{marker}", change.change.abs())
}

fn write_section(output: &mut String, section: &DashboardSection) {
    let _ = writeln!(output, "## {}", section.label());
    let _ = writeln!(
        output,
        "Current {} vs {} {}",
        section.windows.current,
        section.comparison_type,
        section.windows.comparison()
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "| metric | current | previous | change | 7d | 30d |");
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for metric in HEADLINE_METRICS {
        if let Some(summary) = section.metric(metric) {
            let _ = writeln!(
                output,
                "| {} | {:.2} | {:.2} | {} | {} | {} |",
                metric,
                summary.selected.current,
                summary.selected.previous,
                format_change(&summary.selected),
                format_change(&summary.trailing_7d),
                format_change(&summary.trailing_30d)
            );
        }
    }

    let scores = &section.scores;
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "- Health: {}/100 ({})",
        scores.health.score, scores.health.label
    );
    for factor in scores.health.breakdown.iter() {
        let _ = writeln!(
            output,
            "  - {} ({} pts): {:.0}",
            factor.name, factor.weight, factor.score
        );
    }
    let _ = writeln!(
        output,
        "- Scaling: {:?} (efficiency {:+.2})",
        scores.scaling.category, scores.scaling.scaling_efficiency
    );
    let _ = writeln!(output, "- Trend: {:?}", scores.trend.trend);
    let _ = writeln!(
        output,
        "- Volatility: σ {:.2}, best day {:.2}x, worst day {:.2}x, CV {:.2}",
        scores.volatility.roas_volatility,
        scores.volatility.best_day_roas,
        scores.volatility.worst_day_roas,
        scores.volatility.coefficient_of_variation
    );
    let _ = writeln!(
        output,
        "- Benchmark: ROAS index {:.0} vs account {:.2}x, efficiency index {:.2}",
        scores.benchmark.roas_index_vs_account,
        scores.benchmark.account_roas,
        scores.benchmark.efficiency_index
    );
    let _ = writeln!(
        output,
        "- Confidence: {:?}, fatigue {:?} (CTR {:+.1}%)",
        scores.statistical_confidence, scores.fatigue.risk, scores.fatigue.ctr_change
    );
    let _ = writeln!(
        output,
        "- Pacing: revenue {:.0}% of {:.2}, ROAS {:.0}% of {:.2}x",
        scores.pacing.revenue_pct_of_target,
        scores.pacing.revenue_target,
        scores.pacing.roas_pct_of_target,
        scores.pacing.roas_target
    );
    let _ = writeln!(output, "- Recommended action: {:?}", scores.recommended_action);
    if !scores.risk_flags.is_empty() {
        let flags: Vec<String> = scores
            .risk_flags
            .iter()
            .map(|flag| format!("{flag:?}"))
            .collect();
        let _ = writeln!(output, "- Risk flags: {}", flags.join(", "));
    }
    if let Some(funnel) = &scores.funnel {
        let _ = writeln!(
            output,
            "- Funnel: TOFU {:.1}, MOFU {:.1}, BOFU {:.1} (inferred {:?}{})",
            funnel.scores.tofu,
            funnel.scores.mofu,
            funnel.scores.bofu,
            funnel.inferred_stage,
            if funnel.is_misclassified {
                ", misclassified"
            } else {
                ""
            }
        );
    }

    if !section.share_of_total.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Share of revenue:");
        for share in section.share_of_total.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({})",
                share.key,
                share.revenue_share.current,
                format_change(&share.revenue_share)
            );
        }
    }

    if !section.breakdown.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Top rows:");
        for row in section.breakdown.iter() {
            let _ = writeln!(
                output,
                "- {}: spend {:.2}, revenue {:.2}, ROAS {:.2}x",
                row.key, row.totals.spend, row.totals.revenue, row.kpis.roas
            );
        }
    }
    let _ = writeln!(output);
}

pub fn build_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();
    let overall = &dashboard.overall;

    let _ = writeln!(output, "# Marketing Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} preset, data before {})",
        overall.client_id, overall.preset, overall.windows.today
    );
    let _ = writeln!(output);

    write_section(&mut output, overall);
    for section in dashboard.platforms.iter() {
        write_section(&mut output, section);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Polarity;

    #[test]
    fn changes_render_with_unit_and_warning() {
        let spend = MetricChange::relative(120.0, 100.0, Polarity::LowerIsBetter);
        assert_eq!(format_change(&spend), "↑ 20.0% ⚠");

        let share = MetricChange::share(30.0, 32.5, Polarity::HigherIsBetter);
        assert_eq!(format_change(&share), "↓ 2.5 pp ⚠");

        let roas = MetricChange::relative(5.5, 5.0, Polarity::HigherIsBetter);
        assert_eq!(format_change(&roas), "↑ 10.0%");
    }
}
