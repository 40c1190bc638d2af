//! Trailing moving averages over daily series.

use chrono::NaiveDate;

use crate::models::TrailingWindowPoint;

/// Trailing mean of up to `window` points ending at each index.
///
/// The window shrinks at the start of the series instead of padding, so the
/// first value is always the raw value itself. A window of zero behaves like
/// a window of one.
pub fn rolling_average(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..series.len())
        .map(|index| {
            let slice = &series[(index + 1).saturating_sub(window)..=index];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Raw value plus 7- and 30-day trailing averages for each dated point.
pub fn trailing_points(series: &[(NaiveDate, f64)]) -> Vec<TrailingWindowPoint> {
    let values: Vec<f64> = series.iter().map(|(_, value)| *value).collect();
    let avg_7d = rolling_average(&values, 7);
    let avg_30d = rolling_average(&values, 30);

    series
        .iter()
        .enumerate()
        .map(|(index, (date, value))| TrailingWindowPoint {
            date: *date,
            raw_value: *value,
            avg_7d: avg_7d[index],
            avg_30d: avg_30d[index],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_is_raw_for_any_window() {
        let series = [3.5, 1.0, 8.0];
        for window in [0, 1, 2, 7, 30] {
            assert_eq!(rolling_average(&series, window)[0], 3.5);
        }
    }

    #[test]
    fn seven_day_window_over_daily_roas() {
        let series = [4.0, 5.0, 6.0, 3.0, 2.0, 8.0, 9.0, 10.0];
        let averages = rolling_average(&series, 7);

        assert_eq!(averages.len(), series.len());
        assert_eq!(averages[0], 4.0);
        assert_eq!(averages[1], 4.5);
        assert!((averages[6] - 37.0 / 7.0).abs() < 1e-9);
        assert!((averages[7] - 43.0 / 7.0).abs() < 1e-9);
        assert!((averages[6] - 5.29).abs() < 0.01);
        assert!((averages[7] - 6.14).abs() < 0.01);
    }

    #[test]
    fn large_values_do_not_leak_into_later_windows() {
        let series = [1e17, 3.0, 3.0, 3.0];
        assert_eq!(rolling_average(&series, 1), vec![1e17, 3.0, 3.0, 3.0]);
        assert_eq!(rolling_average(&series, 2)[3], 3.0);
    }

    #[test]
    fn empty_series_stays_empty() {
        assert!(rolling_average(&[], 7).is_empty());
    }

    #[test]
    fn trailing_points_carry_both_windows() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series: Vec<(NaiveDate, f64)> = (0..10)
            .map(|offset| (start + chrono::Duration::days(offset), offset as f64))
            .collect();
        let points = trailing_points(&series);

        assert_eq!(points[9].raw_value, 9.0);
        assert!((points[9].avg_7d - 6.0).abs() < 1e-9);
        assert!((points[9].avg_30d - 4.5).abs() < 1e-9);
        assert_eq!(points[0].avg_30d, 0.0);
    }
}
