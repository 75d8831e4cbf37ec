//! Calendar and weather features derived from the timestamp and raw readings

use super::Mode;
use crate::data::schema::{
    AIR_PRESSURE, HOUR, MONTH, PUBLIC_HOLIDAY, RAINING, RUSH_HOUR, SLEEPTIME, SUMMER, TOTAL_TRAFFIC, WEEKDAY_COLUMNS,
    WEEKEND, WINTER, WIND_DIRECTION, WIND_DIRECTION_RADIANS, WIND_DIRECTION_X, WIND_DIRECTION_Y,
};
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::Array1;
use tracing::debug;

/// Public holidays as (month, day); the year is ignored
pub const PUBLIC_HOLIDAYS: [(u32, u32); 11] = [
    (12, 24),
    (12, 25),
    (1, 1),
    // easter
    (4, 6),
    (4, 7),
    (4, 8),
    (4, 9),
    (4, 10),
    (5, 1),
    (5, 17),
    (5, 18),
];

/// Pressure at or below which it is assumed to rain (hPa)
pub const RAIN_PRESSURE_THRESHOLD: f64 = 996.0;

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

pub fn is_public_holiday(ts: &NaiveDateTime) -> bool {
    PUBLIC_HOLIDAYS.contains(&(ts.month(), ts.day()))
}

pub fn is_rush_hour(hour: u32) -> bool {
    (7..=9).contains(&hour) || (15..=17).contains(&hour)
}

pub fn is_sleeptime(hour: u32) -> bool {
    hour >= 22 || hour < 6
}

pub fn is_summer(month: u32) -> bool {
    month > 5 && month < 8
}

pub fn is_winter(month: u32) -> bool {
    month >= 10 || month <= 2
}

/// Unit-circle position of a direction in degrees
pub fn circular_encoding(degrees: f64) -> (f64, f64) {
    let radians = degrees.to_radians();
    (radians.cos(), radians.sin())
}

/// Add every engineered feature to `table`
///
/// In training mode rows without a target are dropped.
pub fn engineer_features(table: HourlyTable, mode: Mode) -> Result<HourlyTable> {
    for required in [AIR_PRESSURE, WIND_DIRECTION] {
        if !table.has_column(required) {
            return Err(ForecastError::SchemaError(format!(
                "feature engineering needs column {}",
                required
            )));
        }
    }

    let mut table = table;
    let index: Vec<NaiveDateTime> = table.index().to_vec();
    let from_index = |f: fn(&NaiveDateTime) -> f64| -> Array1<f64> { index.iter().map(f).collect() };

    table.with_column(HOUR, from_index(|ts| ts.hour() as f64))?;
    for (day, name) in WEEKDAY_COLUMNS.iter().enumerate() {
        let indicator: Array1<f64> = index
            .iter()
            .map(|ts| flag(ts.weekday().num_days_from_monday() as usize == day))
            .collect();
        table.with_column(name, indicator)?;
    }
    table.with_column(MONTH, from_index(|ts| ts.month() as f64))?;
    table.with_column(WEEKEND, from_index(|ts| flag(ts.weekday().num_days_from_monday() >= 5)))?;
    table.with_column(PUBLIC_HOLIDAY, from_index(|ts| flag(is_public_holiday(ts))))?;

    let raining = table.column(AIR_PRESSURE)?.mapv(|p| flag(p <= RAIN_PRESSURE_THRESHOLD));
    table.with_column(RAINING, raining)?;

    table.with_column(SUMMER, from_index(|ts| flag(is_summer(ts.month()))))?;
    table.with_column(WINTER, from_index(|ts| flag(is_winter(ts.month()))))?;
    table.with_column(RUSH_HOUR, from_index(|ts| flag(is_rush_hour(ts.hour()))))?;
    table.with_column(SLEEPTIME, from_index(|ts| flag(is_sleeptime(ts.hour()))))?;

    let radians = table.column(WIND_DIRECTION)?.mapv(f64::to_radians);
    table.with_column(WIND_DIRECTION_X, radians.mapv(f64::cos))?;
    table.with_column(WIND_DIRECTION_Y, radians.mapv(f64::sin))?;
    table.with_column(WIND_DIRECTION_RADIANS, radians)?;

    if mode == Mode::Training {
        let before = table.height();
        let mask: Vec<bool> = table.column(TOTAL_TRAFFIC)?.iter().map(|v| !v.is_nan()).collect();
        table = table.filter_rows(&mask)?;
        debug!(dropped = before - table.height(), "rows without target dropped");
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(h, 0, 0)).unwrap()
    }

    fn raw(index: Vec<NaiveDateTime>, pressure: Vec<f64>, direction: Vec<f64>, target: Option<Vec<f64>>) -> HourlyTable {
        let mut columns = vec![
            (AIR_PRESSURE.to_string(), pressure),
            (WIND_DIRECTION.to_string(), direction),
        ];
        if let Some(t) = target {
            columns.push((TOTAL_TRAFFIC.to_string(), t));
        }
        HourlyTable::from_columns(index, columns).unwrap()
    }

    #[test]
    fn test_circular_encoding_of_cardinal_directions() {
        let expected = [(0.0, (1.0, 0.0)), (90.0, (0.0, 1.0)), (180.0, (-1.0, 0.0)), (270.0, (0.0, -1.0))];
        for (degrees, (x, y)) in expected {
            let (cx, cy) = circular_encoding(degrees);
            assert_abs_diff_eq!(cx, x, epsilon = 1e-12);
            assert_abs_diff_eq!(cy, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_public_holidays() {
        assert!(is_public_holiday(&at(2024, 12, 25, 10)));
        assert!(is_public_holiday(&at(2024, 1, 1, 0)));
        assert!(is_public_holiday(&at(2019, 5, 17, 12)));
        assert!(!is_public_holiday(&at(2024, 6, 15, 10)));
    }

    #[test]
    fn test_calendar_flags() {
        assert!(is_rush_hour(7) && is_rush_hour(17));
        assert!(!is_rush_hour(10) && !is_rush_hour(18));
        assert!(is_sleeptime(22) && is_sleeptime(5));
        assert!(!is_sleeptime(6));
        assert!(is_summer(6) && is_summer(7) && !is_summer(8));
        assert!(is_winter(10) && is_winter(2) && !is_winter(3));
    }

    #[test]
    fn test_engineered_columns() {
        // 2024-12-25 is a Wednesday
        let table = raw(
            vec![at(2024, 12, 25, 8), at(2024, 6, 15, 23)],
            vec![990.0, 1010.0],
            vec![90.0, 180.0],
            Some(vec![5.0, 7.0]),
        );
        let out = engineer_features(table, Mode::Training).unwrap();

        assert_eq!(out.column(HOUR).unwrap().to_vec(), vec![8.0, 23.0]);
        assert_eq!(out.column("d_Wednesday").unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.column("d_Saturday").unwrap().to_vec(), vec![0.0, 1.0]);
        assert_eq!(out.column(WEEKEND).unwrap().to_vec(), vec![0.0, 1.0]);
        assert_eq!(out.column(PUBLIC_HOLIDAY).unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.column(RAINING).unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.column(SUMMER).unwrap().to_vec(), vec![0.0, 1.0]);
        assert_eq!(out.column(WINTER).unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.column(RUSH_HOUR).unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.column(SLEEPTIME).unwrap().to_vec(), vec![0.0, 1.0]);
        assert_abs_diff_eq!(out.column(WIND_DIRECTION_Y).unwrap()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.column(WIND_DIRECTION_X).unwrap()[1], -1.0, epsilon = 1e-12);
        for day in WEEKDAY_COLUMNS {
            assert!(out.has_column(day), "missing {}", day);
        }
    }

    #[test]
    fn test_training_mode_drops_missing_target_inference_keeps() {
        let index = vec![at(2022, 3, 1, 0), at(2022, 3, 1, 1)];
        let with_gap = raw(index.clone(), vec![1000.0; 2], vec![0.0; 2], Some(vec![1.0, f64::NAN]));

        assert_eq!(engineer_features(with_gap.clone(), Mode::Training).unwrap().height(), 1);
        assert_eq!(engineer_features(with_gap, Mode::Inference).unwrap().height(), 2);

        let no_target = raw(index, vec![1000.0; 2], vec![0.0; 2], None);
        assert_eq!(engineer_features(no_target, Mode::Inference).unwrap().height(), 2);
    }

    #[test]
    fn test_missing_wind_direction_is_schema_error() {
        let table = HourlyTable::from_columns(
            vec![at(2022, 1, 1, 0)],
            vec![(AIR_PRESSURE.to_string(), vec![1000.0])],
        )
        .unwrap();
        assert!(matches!(
            engineer_features(table, Mode::Inference),
            Err(ForecastError::SchemaError(_))
        ));
    }
}
