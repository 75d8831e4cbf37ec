//! Merges the per-source hourly tables into one table and derives the target

use crate::data::schema::{COUNT_TOWARDS_DANMARKSPLASS, COUNT_TOWARDS_FLORIDA, TOTAL_TRAFFIC};
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

/// Decimal places kept after merging; removes artifacts of hourly averaging
const MERGE_DECIMALS: i32 = 10;

/// Output of [`merge_frames`]
#[derive(Debug, Clone)]
pub struct MergedTables {
    /// Rows with a known target, raw counts replaced by the target
    pub training: HourlyTable,
    /// Rows of the reserved year without the raw counts or a target
    pub future: HourlyTable,
}

/// Outer-join `frames` on their timestamps and derive [`TOTAL_TRAFFIC`]
pub fn merge_frames(frames: Vec<HourlyTable>, future_year: i32) -> Result<MergedTables> {
    let mut frames = frames.into_iter();
    let mut merged = frames
        .next()
        .ok_or_else(|| ForecastError::DataError("no tables to merge".to_string()))?;
    // also rejects duplicate timestamps in the first table
    merged = merged.outer_join(&HourlyTable::new(Vec::new()))?;
    for frame in frames {
        merged = merged.outer_join(&frame)?;
    }
    merged.round_values(MERGE_DECIMALS);
    debug!(rows = merged.height(), columns = merged.width(), "tables joined");

    for column in [COUNT_TOWARDS_FLORIDA, COUNT_TOWARDS_DANMARKSPLASS] {
        if !merged.has_column(column) {
            return Err(ForecastError::SchemaError(format!("merged table lacks count column {}", column)));
        }
    }

    let (start, end) = year_bounds(future_year)?;
    let mut future = merged.rows_between(start, end);
    future.drop_columns(&[COUNT_TOWARDS_FLORIDA, COUNT_TOWARDS_DANMARKSPLASS])?;

    let towards_florida = merged.drop_column(COUNT_TOWARDS_FLORIDA)?;
    let towards_danmarksplass = merged.drop_column(COUNT_TOWARDS_DANMARKSPLASS)?;
    // NaN in either direction leaves the total missing
    let total = &towards_florida + &towards_danmarksplass;
    merged.with_column(TOTAL_TRAFFIC, total)?;

    let mask: Vec<bool> = merged.column(TOTAL_TRAFFIC)?.iter().map(|v| !v.is_nan()).collect();
    let training = merged.filter_rows(&mask)?;

    info!(
        merged_rows = merged.height(),
        training_rows = training.height(),
        future_rows = future.height(),
        "merge complete"
    );

    Ok(MergedTables { training, future })
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    match (start, end) {
        (Some(s), Some(e)) => Ok((s, e)),
        _ => Err(ForecastError::ConfigError(format!("invalid future year {}", year))),
    }
}
