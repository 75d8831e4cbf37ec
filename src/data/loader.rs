//! Readers for the weather station and traffic counter CSV exports

use super::schema::{
    pivoted_count_column, TRAFFIC_FROM, TRAFFIC_LANE, TRAFFIC_TOTAL_LANES, TRAFFIC_VOLUME,
    WEATHER_DATE, WEATHER_TIME,
};
use super::table::{floor_to_hour, HourlyTable};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name fragment identifying weather station exports
pub const WEATHER_FILE_MARKER: &str = "Florida";
/// File name fragment identifying the traffic counter export
pub const TRAFFIC_FILE_MARKER: &str = "trafikkdata";

const WEATHER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d%H:%M";
const TRAFFIC_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M%z";
const SCHEMA_INFERENCE_ROWS: usize = 1000;

/// The two source tables found in a data directory
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub weather: HourlyTable,
    pub traffic: HourlyTable,
}

impl SourceTables {
    /// Source tables in merge order
    pub fn into_frames(self) -> Vec<HourlyTable> {
        vec![self.weather, self.traffic]
    }
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ForecastError::SchemaError(format!("input file has no '{}' column", name)))
}

fn float_values(column: &Column) -> Result<Vec<f64>> {
    Ok(column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Read one weather export and resample it to hourly means
pub fn load_weather_file(path: &Path) -> Result<HourlyTable> {
    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(SCHEMA_INFERENCE_ROWS))
        .into_reader_with_file_handle(file)
        .finish()?;

    let table = weather_from_dataframe(&df)?;
    debug!(file = %path.display(), rows = table.height(), "loaded weather file");
    Ok(table)
}

/// Resample a raw weather frame to one row per hour
pub fn weather_from_dataframe(df: &DataFrame) -> Result<HourlyTable> {
    let dates = require_column(df, WEATHER_DATE)?.cast(&DataType::String)?;
    let times = require_column(df, WEATHER_TIME)?.cast(&DataType::String)?;

    let value_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .filter(|n| n != WEATHER_DATE && n != WEATHER_TIME)
        .collect();
    let values: Vec<Vec<f64>> = value_names
        .iter()
        .map(|n| float_values(require_column(df, n)?))
        .collect::<Result<Vec<_>>>()?;

    // per hour: running (sum, count) for each value column
    let mut hours: BTreeMap<NaiveDateTime, Vec<(f64, usize)>> = BTreeMap::new();
    for (row, (date, time)) in dates.str()?.into_iter().zip(times.str()?.into_iter()).enumerate() {
        let (date, time) = match (date, time) {
            (Some(d), Some(t)) => (d.trim(), t.trim()),
            // export footers carry free text in the date column only
            _ => continue,
        };
        let stamp = NaiveDateTime::parse_from_str(&format!("{}{}", date, time), WEATHER_TIMESTAMP_FORMAT)
            .map_err(|e| ForecastError::DataError(format!("row {}: bad weather timestamp '{} {}': {}", row, date, time, e)))?;

        let acc = hours
            .entry(floor_to_hour(stamp))
            .or_insert_with(|| vec![(0.0, 0); value_names.len()]);
        for (slot, column) in acc.iter_mut().zip(values.iter()) {
            let v = column[row];
            if !v.is_nan() {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    let (first, last) = match (hours.keys().next(), hours.keys().next_back()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return HourlyTable::from_columns(Vec::new(), value_names.into_iter().map(|n| (n, Vec::new())).collect()),
    };

    let mut index = Vec::new();
    let mut stamp = first;
    while stamp <= last {
        index.push(stamp);
        stamp += Duration::hours(1);
    }

    let columns = value_names
        .into_iter()
        .enumerate()
        .map(|(j, name)| {
            let column = index
                .iter()
                .map(|ts| match hours.get(ts) {
                    Some(acc) if acc[j].1 > 0 => acc[j].0 / acc[j].1 as f64,
                    _ => f64::NAN,
                })
                .collect();
            (name, column)
        })
        .collect();

    HourlyTable::from_columns(index, columns)
}

/// Read the traffic counter export and pivot the per-direction totals into columns
pub fn load_traffic_file(path: &Path) -> Result<HourlyTable> {
    let text = std::fs::read_to_string(path)?;
    let normalized = text.replace('|', ";");

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(SCHEMA_INFERENCE_ROWS))
        .with_parse_options(CsvParseOptions::default().with_separator(b';'))
        .into_reader_with_file_handle(Cursor::new(normalized.into_bytes()))
        .finish()?;

    let table = traffic_from_dataframe(&df)?;
    debug!(file = %path.display(), rows = table.height(), "loaded traffic file");
    Ok(table)
}

/// Pivot a raw traffic frame into one count column per direction
pub fn traffic_from_dataframe(df: &DataFrame) -> Result<HourlyTable> {
    let starts = require_column(df, TRAFFIC_FROM)?.cast(&DataType::String)?;
    let lanes = require_column(df, TRAFFIC_LANE)?.cast(&DataType::String)?;
    let volumes = float_values(require_column(df, TRAFFIC_VOLUME)?)?;

    let mut pivot: BTreeMap<NaiveDateTime, [f64; 2]> = BTreeMap::new();
    for (row, (start, lane)) in starts.str()?.into_iter().zip(lanes.str()?.into_iter()).enumerate() {
        let slot = match lane.and_then(|l| TRAFFIC_TOTAL_LANES.iter().position(|t| *t == l.trim())) {
            Some(slot) => slot,
            None => continue,
        };
        let start = start.ok_or_else(|| ForecastError::DataError(format!("row {}: missing '{}'", row, TRAFFIC_FROM)))?;
        let stamp = DateTime::parse_from_str(start.trim(), TRAFFIC_TIMESTAMP_FORMAT)
            .map_err(|e| ForecastError::DataError(format!("row {}: bad traffic timestamp '{}': {}", row, start, e)))?
            .naive_local();

        pivot.entry(stamp).or_insert([f64::NAN; 2])[slot] = volumes[row];
    }

    let index: Vec<NaiveDateTime> = pivot.keys().copied().collect();
    let columns = TRAFFIC_TOTAL_LANES
        .iter()
        .enumerate()
        .map(|(slot, lane)| (pivoted_count_column(lane), pivot.values().map(|v| v[slot]).collect()))
        .collect();

    HourlyTable::from_columns(index, columns)
}

fn file_name_contains(path: &Path, marker: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.contains(marker))
}

/// Scan a data directory for weather and traffic exports
pub fn load_directory(dir: &Path) -> Result<SourceTables> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut weather_tables = Vec::new();
    let mut traffic_path: Option<PathBuf> = None;

    for path in paths {
        if file_name_contains(&path, WEATHER_FILE_MARKER) {
            weather_tables.push(load_weather_file(&path)?);
        } else if file_name_contains(&path, TRAFFIC_FILE_MARKER) {
            if let Some(previous) = traffic_path.replace(path.clone()) {
                warn!(ignored = %previous.display(), used = %path.display(), "multiple traffic files found");
            }
        }
    }

    if weather_tables.is_empty() {
        return Err(ForecastError::SchemaError(format!(
            "no weather file containing '{}' in {}",
            WEATHER_FILE_MARKER,
            dir.display()
        )));
    }
    let traffic_path = traffic_path.ok_or_else(|| {
        ForecastError::SchemaError(format!(
            "no traffic file containing '{}' in {}",
            TRAFFIC_FILE_MARKER,
            dir.display()
        ))
    })?;

    let n_files = weather_tables.len();
    let weather = HourlyTable::concat(weather_tables)?;
    let traffic = load_traffic_file(&traffic_path)?;
    info!(
        weather_files = n_files,
        weather_rows = weather.height(),
        traffic_rows = traffic.height(),
        "loaded data directory"
    );

    Ok(SourceTables { weather, traffic })
}
