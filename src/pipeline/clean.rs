//! Outlier trimming and missing-value imputation

use super::config::ImputerConfig;
use super::Mode;
use crate::data::schema::{
    AIR_PRESSURE, AIR_TEMPERATURE, IRRADIANCE, RELATIVE_HUMIDITY, SUNSHINE_DURATION, TOTAL_TRAFFIC, WIND_DIRECTION,
    WIND_GUST, WIND_SPEED,
};
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use crate::imputation::{Imputer, KNNImputer};
use tracing::{debug, info};

/// Marker some station exports use for a missing reading
pub const SENTINEL: f64 = 99999.0;

/// Physically plausible range of one weather column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainBound {
    pub column: &'static str,
    /// Inclusive lower bound
    pub min: Option<f64>,
    /// Exclusive upper bound
    pub max_exclusive: f64,
}

impl DomainBound {
    /// Whether `value` lies inside the bound; `NaN` is never inside
    pub fn contains(&self, value: f64) -> bool {
        value < self.max_exclusive && self.min.map_or(true, |min| value >= min)
    }
}

pub const DOMAIN_BOUNDS: [DomainBound; 7] = [
    DomainBound { column: IRRADIANCE, min: None, max_exclusive: 1000.0 },
    DomainBound { column: SUNSHINE_DURATION, min: None, max_exclusive: 10.01 },
    DomainBound { column: AIR_TEMPERATURE, min: None, max_exclusive: 50.0 },
    DomainBound { column: AIR_PRESSURE, min: None, max_exclusive: 1050.0 },
    DomainBound { column: WIND_GUST, min: None, max_exclusive: 65.0 },
    DomainBound { column: WIND_DIRECTION, min: None, max_exclusive: 361.0 },
    DomainBound { column: WIND_SPEED, min: Some(0.0), max_exclusive: 1000.0 },
];

/// Bound declared for `column`, if any
pub fn domain_bound(column: &str) -> Option<&'static DomainBound> {
    DOMAIN_BOUNDS.iter().find(|b| b.column == column)
}

/// Replace out-of-range readings and sentinels with `NaN`
///
/// Sentinels become `NaN` in every column, the target included. Bounds only
/// apply to the weather columns in [`DOMAIN_BOUNDS`]; absent ones are skipped.
pub fn trim_outliers(mut table: HourlyTable) -> HourlyTable {
    let names: Vec<String> = table.column_names().to_vec();
    for name in names.iter() {
        let bound = domain_bound(name);
        if let Ok(column) = table.column_mut(name) {
            let mut trimmed = 0usize;
            column.mapv_inplace(|v| {
                let out_of_range = v == SENTINEL || bound.map_or(false, |b| !v.is_nan() && !b.contains(v));
                if out_of_range {
                    trimmed += 1;
                    f64::NAN
                } else {
                    v
                }
            });
            if trimmed > 0 {
                debug!(column = %name, trimmed, "outliers replaced with NaN");
            }
        }
    }
    table
}

/// Fail if any observed value lies outside its declared bound
pub fn check_domain(table: &HourlyTable) -> Result<()> {
    for bound in DOMAIN_BOUNDS.iter() {
        let Ok(column) = table.column(bound.column) else {
            continue;
        };
        if let Some(&value) = column.iter().find(|v| !v.is_nan() && !bound.contains(**v)) {
            return Err(ForecastError::DomainRangeError {
                column: bound.column.to_string(),
                value,
                min: bound.min.unwrap_or(f64::NEG_INFINITY),
                max: bound.max_exclusive,
            });
        }
    }
    Ok(())
}

fn log_nan_counts(table: &HourlyTable, stage: &str) {
    for (column, missing) in table.nan_counts() {
        debug!(stage, column = %column, missing, "missing values");
    }
    info!(stage, missing = table.total_nan_count(), rows = table.height(), "missing values total");
}

/// Trim, then fill every missing weather value with a KNN estimate
///
/// The imputer is fit on `table` alone. The target is withheld from the
/// imputer input and re-attached unchanged.
pub fn impute_missing(table: HourlyTable, mode: Mode, config: &ImputerConfig) -> Result<HourlyTable> {
    let mut table = trim_outliers(table);

    let target = table.drop_column_if_present(TOTAL_TRAFFIC);
    if mode == Mode::Training && target.is_none() {
        return Err(ForecastError::SchemaError(format!(
            "training table lacks target column {}",
            TOTAL_TRAFFIC
        )));
    }
    table.drop_column_if_present(RELATIVE_HUMIDITY);

    log_nan_counts(&table, "before imputation");
    check_domain(&table)?;

    let names: Vec<String> = table.column_names().to_vec();
    if let Some((column, _)) = table.iter_columns().find(|(_, c)| c.iter().all(|v| v.is_nan())) {
        return Err(ForecastError::DataError(format!(
            "column '{}' has no observed values to impute from",
            column
        )));
    }

    if !names.is_empty() && table.total_nan_count() > 0 {
        let matrix = table.to_array2(&names)?;
        let mut imputer = KNNImputer::new(config.n_neighbors).with_weights(config.weights);
        let filled = imputer.fit_transform(&matrix)?;
        table.assign_from_array2(&names, &filled)?;
    }

    log_nan_counts(&table, "after imputation");

    if let Some(target) = target {
        table.with_column(TOTAL_TRAFFIC, target)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn index(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2022, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    fn table(columns: Vec<(&str, Vec<f64>)>) -> HourlyTable {
        let n = columns[0].1.len();
        HourlyTable::from_columns(index(n), columns.into_iter().map(|(c, v)| (c.to_string(), v)).collect()).unwrap()
    }

    #[test]
    fn test_bounds_table() {
        assert_eq!(DOMAIN_BOUNDS.len(), 7);
        let speed = domain_bound(WIND_SPEED).unwrap();
        assert!(!speed.contains(-0.1));
        assert!(speed.contains(0.0));
        let sunshine = domain_bound(SUNSHINE_DURATION).unwrap();
        assert!(sunshine.contains(10.0));
        assert!(!sunshine.contains(10.01));
        assert!(!sunshine.contains(f64::NAN));
        assert!(domain_bound(TOTAL_TRAFFIC).is_none());
    }

    #[test]
    fn test_trim_replaces_out_of_range_and_sentinel() {
        let trimmed = trim_outliers(table(vec![
            (AIR_TEMPERATURE, vec![12.0, 55.0, SENTINEL]),
            (WIND_SPEED, vec![-1.0, 3.0, 4.0]),
            ("Lufttrykk_ekstra", vec![SENTINEL, 1.0, 2.0]),
        ]));

        let temp = trimmed.column(AIR_TEMPERATURE).unwrap();
        assert_eq!(temp[0], 12.0);
        assert!(temp[1].is_nan() && temp[2].is_nan());
        assert!(trimmed.column(WIND_SPEED).unwrap()[0].is_nan());
        assert!(trimmed.column("Lufttrykk_ekstra").unwrap()[0].is_nan());
        assert!(check_domain(&trimmed).is_ok());
    }

    #[test]
    fn test_trim_is_noop_on_valid_data() {
        let valid = table(vec![
            (AIR_TEMPERATURE, vec![-5.0, 0.0, 20.0]),
            (WIND_DIRECTION, vec![0.0, 180.0, 360.0]),
        ]);
        let once = trim_outliers(valid.clone());
        let twice = trim_outliers(once.clone());
        assert_eq!(once.column(AIR_TEMPERATURE).unwrap(), valid.column(AIR_TEMPERATURE).unwrap());
        assert_eq!(once.column(WIND_DIRECTION).unwrap(), twice.column(WIND_DIRECTION).unwrap());
    }

    #[test]
    fn test_trim_marks_sentinel_target_missing() {
        let trimmed = trim_outliers(table(vec![(TOTAL_TRAFFIC, vec![SENTINEL, 3.0, 5000.0])]));
        let target = trimmed.column(TOTAL_TRAFFIC).unwrap();
        assert!(target[0].is_nan());
        assert_eq!(target[1], 3.0);
        // no domain bound on the target
        assert_eq!(target[2], 5000.0);
    }

    #[test]
    fn test_check_domain_reports_violation() {
        let bad = table(vec![(AIR_PRESSURE, vec![1000.0, 1060.0])]);
        match check_domain(&bad) {
            Err(ForecastError::DomainRangeError { column, value, .. }) => {
                assert_eq!(column, AIR_PRESSURE);
                assert_eq!(value, 1060.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_impute_fills_gaps_within_bounds() {
        let cleaned = impute_missing(
            table(vec![
                (AIR_TEMPERATURE, vec![10.0, f64::NAN, 12.0, 70.0, 11.0]),
                (AIR_PRESSURE, vec![1000.0, 1001.0, f64::NAN, 1003.0, 1002.0]),
                (RELATIVE_HUMIDITY, vec![f64::NAN; 5]),
                (TOTAL_TRAFFIC, vec![1.0, f64::NAN, 3.0, 4.0, 5.0]),
            ]),
            Mode::Training,
            &ImputerConfig::default(),
        )
        .unwrap();

        assert!(!cleaned.has_column(RELATIVE_HUMIDITY));
        let temp = cleaned.column(AIR_TEMPERATURE).unwrap();
        assert!(temp.iter().all(|v| (10.0..=12.0).contains(v)));
        assert!(cleaned.column(AIR_PRESSURE).unwrap().iter().all(|v| !v.is_nan()));
        // target is not imputed
        assert!(cleaned.column(TOTAL_TRAFFIC).unwrap()[1].is_nan());
        assert_eq!(cleaned.column_names().last().map(String::as_str), Some(TOTAL_TRAFFIC));
    }

    #[test]
    fn test_training_mode_requires_target() {
        let no_target = table(vec![(AIR_TEMPERATURE, vec![1.0, 2.0])]);
        assert!(matches!(
            impute_missing(no_target.clone(), Mode::Training, &ImputerConfig::default()),
            Err(ForecastError::SchemaError(_))
        ));
        assert!(impute_missing(no_target, Mode::Inference, &ImputerConfig::default()).is_ok());
    }

    #[test]
    fn test_all_missing_column_is_data_error() {
        let empty = table(vec![
            (AIR_TEMPERATURE, vec![1.0, 2.0]),
            (WIND_GUST, vec![f64::NAN, 99.0]),
        ]);
        let err = impute_missing(empty, Mode::Inference, &ImputerConfig::default()).unwrap_err();
        assert!(err.to_string().contains(WIND_GUST));
    }
}
