//! Date window resolution.
//!
//! Turns a preset such as `last7` or `mtd` into concrete current, comparison
//! and trailing windows relative to a reference date. Every window ends
//! strictly before the reference date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Yesterday,
    Last7,
    Last30,
    Mtd,
    Ytd,
    Custom,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Yesterday => "yesterday",
            Preset::Last7 => "last7",
            Preset::Last30 => "last30",
            Preset::Mtd => "mtd",
            Preset::Ytd => "ytd",
            Preset::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yesterday" => Ok(Preset::Yesterday),
            "last7" | "7d" => Ok(Preset::Last7),
            "last30" | "30d" => Ok(Preset::Last30),
            "mtd" => Ok(Preset::Mtd),
            "ytd" => Ok(Preset::Ytd),
            "custom" => Ok(Preset::Custom),
            _ => Err(format!("unknown preset: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonType {
    #[default]
    PreviousPeriod,
    PreviousYear,
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonType::PreviousPeriod => f.write_str("previous-period"),
            ComparisonType::PreviousYear => f.write_str("previous-year"),
        }
    }
}

impl FromStr for ComparisonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "previous-period" | "period" => Ok(ComparisonType::PreviousPeriod),
            "previous-year" | "year" | "yoy" => Ok(ComparisonType::PreviousYear),
            _ => Err(format!("unknown comparison type: {s}")),
        }
    }
}

/// A span of calendar days.
///
/// Half-open `[start, end)` by default. Custom ranges keep the caller's
/// inclusive end and set `end_inclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub end_inclusive: bool,
}

impl DateWindow {
    pub fn half_open(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            end_inclusive: false,
        }
    }

    pub fn inclusive(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            end_inclusive: true,
        }
    }

    /// First date after the window.
    pub fn exclusive_end(&self) -> NaiveDate {
        if self.end_inclusive {
            self.end + Duration::days(1)
        } else {
            self.end
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.exclusive_end()
    }

    pub fn len_days(&self) -> i64 {
        (self.exclusive_end() - self.start).num_days().max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len_days() == 0
    }

    /// Same number of days, starting on the same calendar date `years`
    /// back (Feb 29 clamps to Feb 28).
    pub fn shift_back_years(&self, years: u32) -> Self {
        let start = minus_months(self.start, 12 * years);
        let exclusive_end = start + Duration::days(self.len_days());
        if self.end_inclusive {
            Self::inclusive(start, exclusive_end - Duration::days(1))
        } else {
            Self::half_open(start, exclusive_end)
        }
    }

    /// Both bounds moved to the same calendar dates `years` back, so the
    /// length follows the calendar.
    fn calendar_years_back(&self, years: u32) -> Self {
        Self {
            start: minus_months(self.start, 12 * years),
            end: minus_months(self.end, 12 * years),
            end_inclusive: self.end_inclusive,
        }
    }

    /// Smallest half-open window covering both.
    pub fn union(&self, other: &DateWindow) -> DateWindow {
        DateWindow::half_open(
            self.start.min(other.start),
            self.exclusive_end().max(other.exclusive_end()),
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let close = if self.end_inclusive { ']' } else { ')' };
        write!(f, "[{}, {}{}", self.start, self.end, close)
    }
}

/// A window together with its two comparison candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSet {
    pub current: DateWindow,
    pub previous_period: DateWindow,
    pub previous_year: DateWindow,
}

impl WindowSet {
    pub fn comparison(&self, kind: ComparisonType) -> DateWindow {
        match kind {
            ComparisonType::PreviousPeriod => self.previous_period,
            ComparisonType::PreviousYear => self.previous_year,
        }
    }

    fn trailing(today: NaiveDate, days: i64) -> Self {
        let current = DateWindow::half_open(today - Duration::days(days), today);
        Self {
            current,
            previous_period: preceding_block(&current),
            previous_year: current.shift_back_years(1),
        }
    }

    fn covering(&self) -> DateWindow {
        self.current
            .union(&self.previous_period)
            .union(&self.previous_year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWindows {
    pub preset: Preset,
    pub comparison_type: ComparisonType,
    pub today: NaiveDate,
    pub current: DateWindow,
    pub comparison_period: DateWindow,
    pub comparison_year: DateWindow,
    #[serde(rename = "trailing7d")]
    pub trailing_7d: WindowSet,
    #[serde(rename = "trailing30d")]
    pub trailing_30d: WindowSet,
}

impl ResolvedWindows {
    /// The comparison window picked by the request's comparison type.
    pub fn comparison(&self) -> DateWindow {
        self.selected().comparison(self.comparison_type)
    }

    pub fn selected(&self) -> WindowSet {
        WindowSet {
            current: self.current,
            previous_period: self.comparison_period,
            previous_year: self.comparison_year,
        }
    }

    /// One half-open window spanning every resolved window, used to fetch
    /// from the source in a single call.
    pub fn covering(&self) -> DateWindow {
        self.selected()
            .covering()
            .union(&self.trailing_7d.covering())
            .union(&self.trailing_30d.covering())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    pub preset: Preset,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub comparison: ComparisonType,
}

impl WindowRequest {
    pub fn preset(preset: Preset, comparison: ComparisonType) -> Self {
        Self {
            preset,
            start: None,
            end: None,
            comparison,
        }
    }

    pub fn custom(start: NaiveDate, end: NaiveDate, comparison: ComparisonType) -> Self {
        Self {
            preset: Preset::Custom,
            start: Some(start),
            end: Some(end),
            comparison,
        }
    }
}

pub fn resolve(request: &WindowRequest, today: NaiveDate) -> EngineResult<ResolvedWindows> {
    let (current, comparison_period) = match request.preset {
        Preset::Yesterday => {
            let current = DateWindow::half_open(today - Duration::days(1), today);
            (current, preceding_block(&current))
        }
        Preset::Last7 => {
            let current = DateWindow::half_open(today - Duration::days(7), today);
            (current, preceding_block(&current))
        }
        Preset::Last30 => {
            let current = DateWindow::half_open(today - Duration::days(30), today);
            (current, preceding_block(&current))
        }
        Preset::Mtd => {
            let month_start = today.with_day(1).unwrap_or(today);
            let current = DateWindow::half_open(month_start, today);
            let previous = DateWindow::half_open(minus_months(month_start, 1), minus_months(today, 1));
            (current, previous)
        }
        Preset::Ytd => {
            let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            let current = DateWindow::half_open(year_start, today);
            (current, current.calendar_years_back(1))
        }
        Preset::Custom => {
            let (start, end) = match (request.start, request.end) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    return Err(EngineError::InvalidRange(
                        "custom preset requires both start and end dates".to_string(),
                    ))
                }
            };
            if end < start {
                return Err(EngineError::InvalidRange(format!(
                    "end date {end} is before start date {start}"
                )));
            }
            let current = DateWindow::inclusive(start, end);
            (current, preceding_block(&current))
        }
    };

    Ok(ResolvedWindows {
        preset: request.preset,
        comparison_type: request.comparison,
        today,
        current,
        comparison_period,
        comparison_year: match request.preset {
            Preset::Ytd => comparison_period,
            _ => current.shift_back_years(1),
        },
        trailing_7d: WindowSet::trailing(today, 7),
        trailing_30d: WindowSet::trailing(today, 30),
    })
}

/// Equal-length block ending where `window` starts, same boundary style.
fn preceding_block(window: &DateWindow) -> DateWindow {
    let days = Duration::days(window.len_days());
    if window.end_inclusive {
        DateWindow::inclusive(window.start - days, window.start - Duration::days(1))
    } else {
        DateWindow::half_open(window.start - days, window.start)
    }
}

/// Calendar month subtraction, clamped to the last valid day of the month.
fn minus_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn resolve_preset(preset: Preset, today: NaiveDate) -> ResolvedWindows {
        resolve(
            &WindowRequest::preset(preset, ComparisonType::PreviousPeriod),
            today,
        )
        .unwrap()
    }

    #[test]
    fn last7_against_mid_january() {
        let windows = resolve_preset(Preset::Last7, d(2024, 1, 15));
        assert_eq!(windows.current, DateWindow::half_open(d(2024, 1, 8), d(2024, 1, 15)));
        assert_eq!(
            windows.comparison_period,
            DateWindow::half_open(d(2024, 1, 1), d(2024, 1, 8))
        );
        assert_eq!(
            windows.comparison_year,
            DateWindow::half_open(d(2023, 1, 8), d(2023, 1, 15))
        );
    }

    #[test]
    fn yesterday_is_one_day() {
        let windows = resolve_preset(Preset::Yesterday, d(2024, 3, 1));
        assert_eq!(windows.current, DateWindow::half_open(d(2024, 2, 29), d(2024, 3, 1)));
        assert_eq!(
            windows.comparison_period,
            DateWindow::half_open(d(2024, 2, 28), d(2024, 2, 29))
        );
        assert!(!windows.current.contains(d(2024, 3, 1)));
    }

    #[test]
    fn comparison_length_matches_for_fixed_presets() {
        let today = d(2024, 3, 31);
        for preset in [Preset::Yesterday, Preset::Last7, Preset::Last30] {
            let windows = resolve_preset(preset, today);
            assert_eq!(windows.current.len_days(), windows.comparison_period.len_days());
            assert_eq!(windows.current.len_days(), windows.comparison_year.len_days());
        }

        let custom = resolve(
            &WindowRequest::custom(d(2024, 2, 10), d(2024, 2, 20), ComparisonType::PreviousPeriod),
            today,
        )
        .unwrap();
        assert_eq!(custom.current.len_days(), custom.comparison_period.len_days());
    }

    #[test]
    fn mtd_compares_elapsed_days_of_prior_month() {
        let windows = resolve_preset(Preset::Mtd, d(2024, 3, 15));
        assert_eq!(windows.current, DateWindow::half_open(d(2024, 3, 1), d(2024, 3, 15)));
        assert_eq!(
            windows.comparison_period,
            DateWindow::half_open(d(2024, 2, 1), d(2024, 2, 15))
        );
        assert_eq!(
            windows.comparison_year,
            DateWindow::half_open(d(2023, 3, 1), d(2023, 3, 15))
        );
    }

    #[test]
    fn mtd_late_in_month_is_not_padded() {
        let windows = resolve_preset(Preset::Mtd, d(2024, 3, 31));
        assert_eq!(windows.current.len_days(), 30);
        assert_eq!(
            windows.comparison_period,
            DateWindow::half_open(d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_ne!(windows.current.len_days(), windows.comparison_period.len_days());
    }

    #[test]
    fn mtd_on_first_of_month_is_empty() {
        let windows = resolve_preset(Preset::Mtd, d(2024, 5, 1));
        assert!(windows.current.is_empty());
        assert!(windows.comparison_period.is_empty());
    }

    #[test]
    fn ytd_compares_elapsed_span_of_prior_year() {
        let windows = resolve_preset(Preset::Ytd, d(2024, 4, 10));
        assert_eq!(windows.current, DateWindow::half_open(d(2024, 1, 1), d(2024, 4, 10)));
        assert_eq!(
            windows.comparison_period,
            DateWindow::half_open(d(2023, 1, 1), d(2023, 4, 10))
        );
    }

    #[test]
    fn custom_range_is_inclusive() {
        let windows = resolve(
            &WindowRequest::custom(d(2024, 1, 10), d(2024, 1, 16), ComparisonType::PreviousYear),
            d(2024, 2, 1),
        )
        .unwrap();

        assert_eq!(windows.current.len_days(), 7);
        assert!(windows.current.contains(d(2024, 1, 16)));
        assert_eq!(
            windows.comparison_period,
            DateWindow::inclusive(d(2024, 1, 3), d(2024, 1, 9))
        );
        assert_eq!(
            windows.comparison(),
            DateWindow::inclusive(d(2023, 1, 10), d(2023, 1, 16))
        );
    }

    #[test]
    fn custom_without_dates_is_invalid() {
        let request = WindowRequest {
            preset: Preset::Custom,
            start: Some(d(2024, 1, 1)),
            end: None,
            comparison: ComparisonType::PreviousPeriod,
        };
        assert!(matches!(
            resolve(&request, d(2024, 2, 1)),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn reversed_custom_range_is_invalid() {
        let request = WindowRequest::custom(d(2024, 1, 9), d(2024, 1, 1), ComparisonType::PreviousPeriod);
        assert!(resolve(&request, d(2024, 2, 1)).is_err());
    }

    #[test]
    fn trailing_windows_ignore_preset() {
        let today = d(2024, 1, 15);
        let ytd = resolve_preset(Preset::Ytd, today);
        let yesterday = resolve_preset(Preset::Yesterday, today);
        assert_eq!(ytd.trailing_7d, yesterday.trailing_7d);
        assert_eq!(
            ytd.trailing_30d.current,
            DateWindow::half_open(d(2023, 12, 16), today)
        );
        assert_eq!(
            ytd.trailing_30d.previous_period,
            DateWindow::half_open(d(2023, 11, 16), d(2023, 12, 16))
        );
    }

    #[test]
    fn leap_day_shifts_to_last_day_of_february() {
        let windows = resolve_preset(Preset::Yesterday, d(2024, 3, 1));
        assert_eq!(windows.comparison_year.start, d(2023, 2, 28));
    }

    #[test]
    fn previous_year_keeps_length_across_leap_day() {
        let cases = [
            (Preset::Yesterday, d(2025, 3, 1)),
            (Preset::Last7, d(2024, 3, 5)),
            (Preset::Last7, d(2025, 3, 5)),
            (Preset::Last30, d(2024, 3, 10)),
        ];
        for (preset, today) in cases {
            let windows = resolve_preset(preset, today);
            assert_eq!(
                windows.comparison_year.len_days(),
                windows.current.len_days(),
                "{preset} at {today}"
            );
        }

        let yesterday = resolve_preset(Preset::Yesterday, d(2025, 3, 1));
        assert_eq!(
            yesterday.comparison_year,
            DateWindow::half_open(d(2024, 2, 28), d(2024, 2, 29))
        );

        let custom = resolve(
            &WindowRequest::custom(d(2025, 2, 27), d(2025, 3, 2), ComparisonType::PreviousYear),
            d(2025, 4, 1),
        )
        .unwrap();
        assert_eq!(
            custom.comparison(),
            DateWindow::inclusive(d(2024, 2, 27), d(2024, 3, 1))
        );
    }

    #[test]
    fn ytd_previous_year_follows_the_calendar() {
        let windows = resolve_preset(Preset::Ytd, d(2024, 3, 5));
        assert_eq!(
            windows.comparison_year,
            DateWindow::half_open(d(2023, 1, 1), d(2023, 3, 5))
        );
        assert_eq!(windows.comparison_year, windows.comparison_period);
    }

    #[test]
    fn covering_window_spans_all_windows() {
        let windows = resolve_preset(Preset::Last7, d(2024, 1, 15));
        let covering = windows.covering();
        assert_eq!(covering.start, d(2022, 12, 16));
        assert_eq!(covering.exclusive_end(), d(2024, 1, 15));
    }

    #[test]
    fn presets_parse_aliases() {
        assert_eq!("7d".parse::<Preset>().unwrap(), Preset::Last7);
        assert_eq!("MTD".parse::<Preset>().unwrap(), Preset::Mtd);
        assert_eq!(
            "previous-year".parse::<ComparisonType>().unwrap(),
            ComparisonType::PreviousYear
        );
        assert!("quarter".parse::<Preset>().is_err());
    }
}
