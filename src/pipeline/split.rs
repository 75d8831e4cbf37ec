//! Chronological train/validation/test partitioning
//!
//! Rows are assigned by position only; nothing is shuffled, so every validation
//! and test row is later in time than every training row.

use super::config::SplitConfig;
use crate::data::schema::TOTAL_TRAFFIC;
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// One of the three chronological segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Train,
    Validation,
    Test,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Train, Segment::Validation, Segment::Test];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Train => "train",
            Segment::Validation => "validation",
            Segment::Test => "test",
        };
        f.write_str(name)
    }
}

/// One value per segment
#[derive(Debug, Clone, PartialEq)]
pub struct Segments<T> {
    pub train: T,
    pub validation: T,
    pub test: T,
}

impl<T> Segments<T> {
    pub fn get(&self, segment: Segment) -> &T {
        match segment {
            Segment::Train => &self.train,
            Segment::Validation => &self.validation,
            Segment::Test => &self.test,
        }
    }

    /// Apply `f` to every segment, stopping at the first error
    pub fn try_map<U>(self, mut f: impl FnMut(Segment, T) -> Result<U>) -> Result<Segments<U>> {
        Ok(Segments {
            train: f(Segment::Train, self.train)?,
            validation: f(Segment::Validation, self.validation)?,
            test: f(Segment::Test, self.test)?,
        })
    }
}

/// Row counts of each segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

/// `ceil(n * fraction)`, tolerant of representation error in `fraction`
fn ceil_share(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction) - 1e-9).ceil().max(0.0) as usize
}

/// Segment sizes for `n` rows
///
/// The held-out share is `ceil((1 - train_fraction) * n)`; of that, the test
/// segment takes `ceil((1 - validation_fraction_of_rest) * rest)`.
pub fn split_sizes(n: usize, config: &SplitConfig) -> Result<SplitSizes> {
    if n < 3 {
        return Err(ForecastError::DataError(format!("cannot split {} rows into three segments", n)));
    }
    let rest = ceil_share(n, 1.0 - config.train_fraction);
    let test = ceil_share(rest, 1.0 - config.validation_fraction_of_rest);
    let sizes = SplitSizes {
        train: n - rest,
        validation: rest - test,
        test,
    };
    if sizes.train == 0 || sizes.validation == 0 || sizes.test == 0 {
        return Err(ForecastError::DataError(format!(
            "{} rows leave an empty segment ({} / {} / {})",
            n, sizes.train, sizes.validation, sizes.test
        )));
    }
    Ok(sizes)
}

/// Split a merged table into contiguous chronological segments
pub fn split_table(table: &HourlyTable, config: &SplitConfig) -> Result<Segments<HourlyTable>> {
    let sizes = split_sizes(table.height(), config)?;
    let val_end = sizes.train + sizes.validation;

    info!(
        train = sizes.train,
        validation = sizes.validation,
        test = sizes.test,
        "split merged table"
    );

    Ok(Segments {
        train: table.slice_rows(0, sizes.train),
        validation: table.slice_rows(sizes.train, val_end),
        test: table.slice_rows(val_end, table.height()),
    })
}

/// Raw feature/target matrices of every segment next to the segment tables
#[derive(Debug, Clone)]
pub struct SplitMatrices {
    pub feature_names: Vec<String>,
    pub x: Segments<Array2<f64>>,
    pub y: Segments<Array1<f64>>,
    pub tables: Segments<HourlyTable>,
}

/// Split and also extract the target and the remaining columns as matrices
pub fn split_matrices(table: &HourlyTable, config: &SplitConfig) -> Result<SplitMatrices> {
    let feature_names: Vec<String> = table
        .column_names()
        .iter()
        .filter(|n| n.as_str() != TOTAL_TRAFFIC)
        .cloned()
        .collect();
    let tables = split_table(table, config)?;

    let x = Segments {
        train: tables.train.to_array2(&feature_names)?,
        validation: tables.validation.to_array2(&feature_names)?,
        test: tables.test.to_array2(&feature_names)?,
    };
    let y = Segments {
        train: tables.train.column(TOTAL_TRAFFIC)?.clone(),
        validation: tables.validation.column(TOTAL_TRAFFIC)?.clone(),
        test: tables.test.column(TOTAL_TRAFFIC)?.clone(),
    };

    Ok(SplitMatrices {
        feature_names,
        x,
        y,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn hourly(n: usize) -> HourlyTable {
        let start: NaiveDateTime = NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let index = (0..n).map(|i| start + Duration::hours(i as i64)).collect();
        HourlyTable::from_columns(
            index,
            vec![
                ("Lufttemperatur".to_string(), (0..n).map(|i| i as f64).collect()),
                (TOTAL_TRAFFIC.to_string(), (0..n).map(|i| 2.0 * i as f64).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sizes_follow_ceiling_arithmetic() {
        let config = SplitConfig::default();
        assert_eq!(split_sizes(100, &config).unwrap(), SplitSizes { train: 70, validation: 15, test: 15 });
        assert_eq!(split_sizes(10, &config).unwrap(), SplitSizes { train: 7, validation: 1, test: 2 });
        assert_eq!(split_sizes(11, &config).unwrap(), SplitSizes { train: 7, validation: 2, test: 2 });
    }

    #[test]
    fn test_too_few_rows() {
        assert!(split_sizes(2, &SplitConfig::default()).is_err());
        assert!(split_sizes(3, &SplitConfig::default()).is_err());
        assert!(split_sizes(4, &SplitConfig::default()).is_ok());
    }

    #[test]
    fn test_segments_are_contiguous_and_ordered() {
        let table = hourly(200);
        let segments = split_table(&table, &SplitConfig::default()).unwrap();

        let total = segments.train.height() + segments.validation.height() + segments.test.height();
        assert_eq!(total, 200);
        assert!(segments.train.index().last() < segments.validation.index().first());
        assert!(segments.validation.index().last() < segments.test.index().first());

        let rejoined: Vec<NaiveDateTime> = Segment::ALL
            .iter()
            .flat_map(|s| segments.get(*s).index().to_vec())
            .collect();
        assert_eq!(rejoined, table.index());
    }

    #[test]
    fn test_matrices_exclude_target() {
        let split = split_matrices(&hourly(20), &SplitConfig::default()).unwrap();
        assert_eq!(split.feature_names, vec!["Lufttemperatur".to_string()]);
        assert_eq!(split.x.train.dim(), (14, 1));
        assert_eq!(split.y.test.len(), 3);
        assert_eq!(split.y.train[3], 6.0);
    }
}
