//! Prediction of the reserved future period

use crate::data::schema::{OUTPUT_DATE, OUTPUT_HOUR, OUTPUT_PREDICTION};
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use crate::pipeline::{process_segment, Mode, PipelineConfig};
use crate::training::FittedModel;
use chrono::{NaiveDate, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Predicted cycle count for one hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturePrediction {
    pub date: NaiveDate,
    pub hour: u32,
    pub prediction: i64,
}

/// Clean the future table in inference mode and predict every row
///
/// Predictions are rounded to whole cyclists.
pub fn predict_future(model: &FittedModel, future: HourlyTable, config: &PipelineConfig) -> Result<Vec<FuturePrediction>> {
    if future.is_empty() {
        return Ok(Vec::new());
    }

    let table = process_segment(future, Mode::Inference, config)?;
    let predicted = model.predict_table(&table)?;

    let predictions: Vec<FuturePrediction> = table
        .index()
        .iter()
        .zip(predicted.iter())
        .map(|(ts, &p)| {
            if !p.is_finite() {
                return Err(ForecastError::ComputationError(format!("non-finite prediction at {}", ts)));
            }
            Ok(FuturePrediction {
                date: ts.date(),
                hour: ts.hour(),
                prediction: p.round() as i64,
            })
        })
        .collect::<Result<_>>()?;

    info!(rows = predictions.len(), model = %model.config, "future period predicted");
    Ok(predictions)
}

/// Build the `Dato`, `Tid`, `Prediksjon` output frame
pub fn predictions_to_dataframe(predictions: &[FuturePrediction]) -> Result<DataFrame> {
    let dates: Vec<String> = predictions.iter().map(|p| p.date.format("%Y-%m-%d").to_string()).collect();
    let hours: Vec<u32> = predictions.iter().map(|p| p.hour).collect();
    let values: Vec<i64> = predictions.iter().map(|p| p.prediction).collect();

    Ok(DataFrame::new(vec![
        Column::new(OUTPUT_DATE.into(), dates),
        Column::new(OUTPUT_HOUR.into(), hours),
        Column::new(OUTPUT_PREDICTION.into(), values),
    ])?)
}

/// Write predictions as CSV
pub fn write_predictions(predictions: &[FuturePrediction], path: &Path) -> Result<()> {
    let mut df = predictions_to_dataframe(predictions)?;
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!(path = %path.display(), rows = predictions.len(), "predictions written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(day: u32, hour: u32, value: i64) -> FuturePrediction {
        FuturePrediction {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            hour,
            prediction: value,
        }
    }

    #[test]
    fn test_output_frame_columns() {
        let df = predictions_to_dataframe(&[prediction(1, 0, 12), prediction(1, 1, 7)]).unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec![OUTPUT_DATE, OUTPUT_HOUR, OUTPUT_PREDICTION]);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_write_predictions_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        write_predictions(&[prediction(2, 8, 42)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Dato,Tid,Prediksjon"));
        assert_eq!(lines.next(), Some("2023-01-02,8,42"));
    }
}
