//! Hourly, timestamp-indexed table of named `f64` columns
//!
//! Missing values are stored as `NaN`. Conversion to and from polars happens
//! only at the I/O boundary; the cleaning pipeline works on ndarray columns.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the timestamp column when a table is exported
pub const INDEX_COLUMN: &str = "DateFormatted";

/// Timestamp format used for exported tables
pub const INDEX_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp-indexed table of named numeric columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyTable {
    index: Vec<NaiveDateTime>,
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
}

/// Descriptive statistics for one column (NaN-skipping)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Truncate a timestamp to the start of its hour
pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

impl HourlyTable {
    /// Create a table with an index and no columns
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Create a table from an index and named column vectors
    pub fn from_columns(index: Vec<NaiveDateTime>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut table = Self::new(index);
        for (name, values) in columns {
            if table.has_column(&name) {
                return Err(ForecastError::SchemaError(format!("duplicate column '{}'", name)));
            }
            table.with_column(&name, Array1::from_vec(values))?;
        }
        Ok(table)
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.index.len()
    }

    /// Number of columns (the index is not counted)
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Borrow a column by name
    pub fn column(&self, name: &str) -> Result<&Array1<f64>> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| ForecastError::SchemaError(format!("missing column '{}'", name)))
    }

    /// Mutably borrow a column by name
    pub fn column_mut(&mut self, name: &str) -> Result<&mut Array1<f64>> {
        match self.position(name) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(ForecastError::SchemaError(format!("missing column '{}'", name))),
        }
    }

    /// Iterate over `(name, values)` pairs in column order
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Array1<f64>)> {
        self.names.iter().map(|n| n.as_str()).zip(self.columns.iter())
    }

    /// Insert a column, replacing any existing column with the same name
    pub fn with_column(&mut self, name: &str, values: Array1<f64>) -> Result<()> {
        if values.len() != self.height() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} rows for column '{}'", self.height(), name),
                actual: format!("{} rows", values.len()),
            });
        }
        match self.position(name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Remove a column and return its values
    pub fn drop_column(&mut self, name: &str) -> Result<Array1<f64>> {
        let i = self
            .position(name)
            .ok_or_else(|| ForecastError::SchemaError(format!("cannot drop missing column '{}'", name)))?;
        self.names.remove(i);
        Ok(self.columns.remove(i))
    }

    /// Remove several columns; every one of them must exist
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<()> {
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(ForecastError::SchemaError(format!("cannot drop missing column '{}'", missing)));
        }
        for name in names {
            self.drop_column(name)?;
        }
        Ok(())
    }

    /// Remove a column if it exists
    pub fn drop_column_if_present(&mut self, name: &str) -> Option<Array1<f64>> {
        self.drop_column(name).ok()
    }

    /// Keep the rows where `mask` is true
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.height() {
            return Err(ForecastError::ShapeError {
                expected: format!("mask of length {}", self.height()),
                actual: format!("length {}", mask.len()),
            });
        }
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(i, _)| i)
            .collect();
        Ok(self.take_rows(&keep))
    }

    /// Rows `start..end` as a new table
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.height());
        let start = start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.take_rows(&rows)
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&i| c[i]).collect())
                .collect(),
        }
    }

    /// Rows whose date lies in `start..=end`
    pub fn rows_between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let rows: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, ts)| ts.date() >= start && ts.date() <= end)
            .map(|(i, _)| i)
            .collect();
        self.take_rows(&rows)
    }

    /// New table containing the named columns in the given order
    pub fn select_columns(&self, names: &[String]) -> Result<Self> {
        let mut out = Self::new(self.index.clone());
        for name in names {
            out.with_column(name, self.column(name)?.clone())?;
        }
        Ok(out)
    }

    /// Extract named columns into a row-major matrix
    pub fn to_array2(&self, names: &[String]) -> Result<Array2<f64>> {
        let cols: Vec<&Array1<f64>> = names
            .iter()
            .map(|n| self.column(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((self.height(), cols.len()), |(r, c)| cols[c][r]))
    }

    /// Replace the named columns with the columns of `matrix`, in order
    pub fn assign_from_array2(&mut self, names: &[String], matrix: &Array2<f64>) -> Result<()> {
        if matrix.nrows() != self.height() || matrix.ncols() != names.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("({}, {})", self.height(), names.len()),
                actual: format!("({}, {})", matrix.nrows(), matrix.ncols()),
            });
        }
        for (j, name) in names.iter().enumerate() {
            self.with_column(name, matrix.column(j).to_owned())?;
        }
        Ok(())
    }

    /// Sort rows by timestamp (stable)
    pub fn sort_by_index(&mut self) {
        let mut order: Vec<usize> = (0..self.height()).collect();
        order.sort_by_key(|&i| self.index[i]);
        *self = self.take_rows(&order);
    }

    fn row_lookup(&self) -> Result<BTreeMap<NaiveDateTime, usize>> {
        let mut lookup = BTreeMap::new();
        for (i, ts) in self.index.iter().enumerate() {
            if lookup.insert(*ts, i).is_some() {
                return Err(ForecastError::DataError(format!("duplicate timestamp {}", ts)));
            }
        }
        Ok(lookup)
    }

    /// Outer join on the timestamp index; the result is sorted by timestamp
    pub fn outer_join(&self, other: &HourlyTable) -> Result<Self> {
        if let Some(clash) = other.names.iter().find(|n| self.has_column(n)) {
            return Err(ForecastError::SchemaError(format!(
                "column '{}' present in both joined tables",
                clash
            )));
        }

        let left = self.row_lookup()?;
        let right = other.row_lookup()?;

        let mut keys: Vec<NaiveDateTime> = left.keys().chain(right.keys()).copied().collect();
        keys.sort();
        keys.dedup();

        let pick = |lookup: &BTreeMap<NaiveDateTime, usize>, column: &Array1<f64>| -> Array1<f64> {
            keys.iter()
                .map(|ts| lookup.get(ts).map_or(f64::NAN, |&i| column[i]))
                .collect()
        };

        let mut joined = Self::new(keys.clone());
        for (name, column) in self.iter_columns() {
            joined.with_column(name, pick(&left, column))?;
        }
        for (name, column) in other.iter_columns() {
            joined.with_column(name, pick(&right, column))?;
        }
        Ok(joined)
    }

    /// Stack tables vertically; columns are unioned and absent cells are `NaN`
    pub fn concat(tables: Vec<HourlyTable>) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            for name in &table.names {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        let index: Vec<NaiveDateTime> = tables.iter().flat_map(|t| t.index.iter().copied()).collect();
        let mut out = Self::new(index);
        for name in &names {
            let values: Array1<f64> = tables
                .iter()
                .flat_map(|t| match t.column(name) {
                    Ok(c) => c.to_vec(),
                    Err(_) => vec![f64::NAN; t.height()],
                })
                .collect();
            out.with_column(name, values)?;
        }
        out.sort_by_index();
        Ok(out)
    }

    /// Round every finite value to `decimals` decimal places
    pub fn round_values(&mut self, decimals: i32) {
        let factor = 10f64.powi(decimals);
        for column in &mut self.columns {
            column.mapv_inplace(|v| {
                let scaled = v * factor;
                if scaled.is_finite() && scaled.abs() < 1e15 {
                    scaled.round() / factor
                } else {
                    v
                }
            });
        }
    }

    /// Number of `NaN` cells per column
    pub fn nan_counts(&self) -> Vec<(String, usize)> {
        self.iter_columns()
            .map(|(name, c)| (name.to_string(), c.iter().filter(|v| v.is_nan()).count()))
            .collect()
    }

    /// Total number of `NaN` cells
    pub fn total_nan_count(&self) -> usize {
        self.nan_counts().iter().map(|(_, n)| n).sum()
    }

    /// Per-column descriptive statistics
    pub fn summary(&self) -> Vec<ColumnSummary> {
        self.iter_columns()
            .map(|(name, column)| {
                let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                let count = observed.len();
                let mean = if count > 0 {
                    observed.iter().sum::<f64>() / count as f64
                } else {
                    f64::NAN
                };
                let std = if count > 1 {
                    (observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
                } else {
                    f64::NAN
                };
                ColumnSummary {
                    name: name.to_string(),
                    count,
                    missing: column.len() - count,
                    mean,
                    std,
                    min: observed.iter().copied().fold(f64::NAN, f64::min),
                    max: observed.iter().copied().fold(f64::NAN, f64::max),
                }
            })
            .collect()
    }

    /// Mean of a column per calendar year, skipping `NaN`
    pub fn yearly_mean(&self, name: &str) -> Result<BTreeMap<i32, f64>> {
        let column = self.column(name)?;
        let mut acc: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for (ts, &v) in self.index.iter().zip(column.iter()) {
            if v.is_nan() {
                continue;
            }
            let entry = acc.entry(ts.year()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
        Ok(acc
            .into_iter()
            .map(|(year, (sum, n))| (year, sum / n as f64))
            .collect())
    }

    /// Convert to a polars DataFrame with the index as a formatted string column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.width() + 1);
        let stamps: Vec<String> = self
            .index
            .iter()
            .map(|ts| ts.format(INDEX_FORMAT).to_string())
            .collect();
        columns.push(Column::new(INDEX_COLUMN.into(), stamps));
        for (name, values) in self.iter_columns() {
            columns.push(Column::new(name.into(), values.to_vec()));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Build a table from a DataFrame whose `index_column` holds formatted timestamps
    pub fn from_dataframe(df: &DataFrame, index_column: &str) -> Result<Self> {
        let stamps = df
            .column(index_column)
            .map_err(|_| ForecastError::SchemaError(format!("missing index column '{}'", index_column)))?
            .str()?;

        let index: Vec<NaiveDateTime> = stamps
            .into_iter()
            .map(|s| {
                let s = s.ok_or_else(|| ForecastError::DataError("null timestamp".to_string()))?;
                Ok(NaiveDateTime::parse_from_str(s, INDEX_FORMAT)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut table = Self::new(index);
        for name in df.get_column_names() {
            if name.as_str() == index_column {
                continue;
            }
            let values: Array1<f64> = df
                .column(name.as_str())?
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            table.with_column(name.as_str(), values)?;
        }
        Ok(table)
    }

    /// Write the table as CSV, index first
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = std::fs::File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }
}
