//! Removes raw columns superseded by engineered features

use crate::data::schema::{WIND_DIRECTION, WIND_DIRECTION_RADIANS, WIND_SPEED};
use crate::data::HourlyTable;
use crate::error::Result;

/// Columns dropped before matrices are assembled
pub const PRUNED_COLUMNS: [&str; 3] = [WIND_DIRECTION, WIND_DIRECTION_RADIANS, WIND_SPEED];

/// Drop [`PRUNED_COLUMNS`]; any of them missing is a schema error
pub fn prune_columns(mut table: HourlyTable) -> Result<HourlyTable> {
    table.drop_columns(&PRUNED_COLUMNS)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use chrono::NaiveDate;

    fn table(names: &[&str]) -> HourlyTable {
        let ts = NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        HourlyTable::from_columns(vec![ts], names.iter().map(|n| (n.to_string(), vec![1.0])).collect()).unwrap()
    }

    #[test]
    fn test_prunes_superseded_columns() {
        let pruned = prune_columns(table(&[WIND_DIRECTION, WIND_DIRECTION_RADIANS, WIND_SPEED, "Vindretning_x"])).unwrap();
        assert_eq!(pruned.column_names(), &["Vindretning_x".to_string()]);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let result = prune_columns(table(&[WIND_DIRECTION, WIND_SPEED]));
        assert!(matches!(result, Err(ForecastError::SchemaError(_))));
    }
}
