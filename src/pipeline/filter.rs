//! Drops rows with extreme target values

use crate::data::schema::TOTAL_TRAFFIC;
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use tracing::info;

/// `q`-quantile of the non-NaN values with linear interpolation between order statistics
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Keep the rows whose target is at most the segment-local `q`-quantile
pub fn filter_target_quantile(table: HourlyTable, q: f64) -> Result<HourlyTable> {
    let target = table.column(TOTAL_TRAFFIC)?;
    let threshold = quantile(target.iter().copied(), q).ok_or_else(|| {
        ForecastError::DataError(format!("cannot take the {} quantile of an empty target", q))
    })?;

    let mask: Vec<bool> = target.iter().map(|&v| v <= threshold).collect();
    let before = table.height();
    let filtered = table.filter_rows(&mask)?;

    info!(before, after = filtered.height(), threshold, "target quantile filter");
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_quantile_interpolates() {
        let values = (1..=5).map(f64::from);
        assert_relative_eq!(quantile(values.clone(), 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(values.clone(), 0.9).unwrap(), 4.6);
        assert_relative_eq!(quantile(values, 1.0).unwrap(), 5.0);
        assert!(quantile(vec![f64::NAN], 0.5).is_none());
    }

    #[test]
    fn test_no_row_above_threshold_remains() {
        let n = 200;
        let start = NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let index = (0..n).map(|i| start + Duration::hours(i)).collect();
        let target: Vec<f64> = (0..n).map(|i| (i * 7 % 113) as f64).collect();
        let threshold = quantile(target.iter().copied(), 0.99).unwrap();

        let table = HourlyTable::from_columns(index, vec![(TOTAL_TRAFFIC.to_string(), target)]).unwrap();
        let filtered = filter_target_quantile(table, 0.99).unwrap();

        assert!(filtered.height() < n as usize);
        assert!(filtered.column(TOTAL_TRAFFIC).unwrap().iter().all(|&v| v <= threshold));
    }

    #[test]
    fn test_requires_target() {
        let table = HourlyTable::new(Vec::new());
        assert!(filter_target_quantile(table, 0.99).is_err());
    }
}
