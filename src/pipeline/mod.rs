//! Cleaning, feature and training pipeline
//!
//! Each chronological segment is processed on its own by [`process_segment`]:
//! trimming and KNN imputation, feature engineering, the target quantile filter
//! (training mode only) and column pruning. No fitted state crosses segments.

pub mod clean;
pub mod config;
pub mod features;
pub mod filter;
pub mod merge;
pub mod prune;
pub mod report;
pub mod split;

pub use clean::{check_domain, impute_missing, trim_outliers, DomainBound, DOMAIN_BOUNDS, SENTINEL};
pub use config::{ImputerConfig, PipelineConfig, SplitConfig};
pub use features::engineer_features;
pub use filter::{filter_target_quantile, quantile};
pub use merge::{merge_frames, MergedTables};
pub use prune::{prune_columns, PRUNED_COLUMNS};
pub use split::{split_matrices, split_sizes, split_table, Segment, Segments, SplitMatrices, SplitSizes};

use crate::data::load_directory;
use crate::data::schema::TOTAL_TRAFFIC;
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use crate::inference::{predict_future, write_predictions, FuturePrediction};
use crate::training::{BestModelReport, BestModelTrainer, EvalSegment, HarnessReport, ModelHarness};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, warn};

/// Cleaned training segment
pub const TRAINING_DATA_FILE: &str = "main_training_data.csv";
/// Future-period predictions
pub const PREDICTIONS_FILE: &str = "predictions.csv";
/// Ranked harness results
pub const HARNESS_REPORT_FILE: &str = "harness_report.json";

/// Whether a table carries a target to train on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Target required; rows without it and extreme targets are dropped
    Training,
    /// Target optional and ignored; every row is kept
    Inference,
}

/// Feature matrix and target of one segment
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Extract `feature_names` (in that order) and the target from `table`
    pub fn from_table(table: &HourlyTable, feature_names: &[String]) -> Result<Self> {
        Ok(Self {
            x: table.to_array2(feature_names)?,
            y: table.column(TOTAL_TRAFFIC)?.clone(),
            feature_names: feature_names.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Every column of `table` except the target, in table order
pub fn feature_columns(table: &HourlyTable) -> Vec<String> {
    table
        .column_names()
        .iter()
        .filter(|n| n.as_str() != TOTAL_TRAFFIC)
        .cloned()
        .collect()
}

/// Run the per-segment cleaning and feature pipeline
pub fn process_segment(table: HourlyTable, mode: Mode, config: &PipelineConfig) -> Result<HourlyTable> {
    let table = impute_missing(table, mode, &config.imputer)?;
    let table = engineer_features(table, mode)?;
    let table = match mode {
        Mode::Training => filter_target_quantile(table, config.target_quantile)?,
        Mode::Inference => table,
    };
    prune_columns(table)
}

/// Build matrices for every segment in the training segment's column order
///
/// The validation and test segments must carry exactly the same feature set.
pub fn assemble_datasets(tables: &Segments<HourlyTable>) -> Result<Segments<Dataset>> {
    let names = feature_columns(&tables.train);
    let expected: BTreeSet<&String> = names.iter().collect();

    for segment in [Segment::Validation, Segment::Test] {
        let other = feature_columns(tables.get(segment));
        let actual: BTreeSet<&String> = other.iter().collect();
        if actual != expected {
            return Err(ForecastError::SchemaError(format!(
                "{} features {:?} differ from training features {:?}",
                segment, other, names
            )));
        }
    }

    Ok(Segments {
        train: Dataset::from_table(&tables.train, &names)?,
        validation: Dataset::from_table(&tables.validation, &names)?,
        test: Dataset::from_table(&tables.test, &names)?,
    })
}

/// Everything a pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Rows per segment after processing
    pub segment_rows: SplitSizes,
    pub feature_names: Vec<String>,
    /// Mean target per year of the training segment before cleaning
    pub yearly_means: BTreeMap<i32, f64>,
    /// Empty unless the harness ran
    pub harness: Vec<HarnessReport>,
    pub best: BestModelReport,
    /// Present in final mode
    pub predictions: Option<Vec<FuturePrediction>>,
    /// Files written, in order
    pub written: Vec<PathBuf>,
}

/// Load, clean, train and optionally predict, as configured
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;
    std::fs::create_dir_all(&config.out_dir)?;
    let mut written = Vec::new();

    let sources = load_directory(&config.data_dir)?;
    let merged = merge_frames(sources.into_frames(), config.future_year)?;
    report::log_summary(&merged.training, "merged");

    let segments = split_table(&merged.training, &config.split)?;
    let yearly_means = report::yearly_target_means(&segments.train)?;
    let processed = segments.try_map(|segment, table| {
        info!(segment = %segment, rows = table.height(), "processing segment");
        let out = process_segment(table, Mode::Training, config)?;
        report::log_summary(&out, &format!("{} processed", segment));
        Ok(out)
    })?;

    let training_csv = config.out_dir.join(TRAINING_DATA_FILE);
    processed.train.write_csv(&training_csv)?;
    written.push(training_csv);

    let datasets = assemble_datasets(&processed)?;
    let segment_rows = SplitSizes {
        train: datasets.train.len(),
        validation: datasets.validation.len(),
        test: datasets.test.len(),
    };

    let harness = if config.train_many {
        let reports = ModelHarness::new(
            &datasets.train.x,
            &datasets.train.y,
            &datasets.validation.x,
            &datasets.validation.y,
        )?
        .run_search(config.random_state);
        let path = config.out_dir.join(HARNESS_REPORT_FILE);
        HarnessReport::save_all(&reports, &path)?;
        written.push(path);
        reports
    } else {
        Vec::new()
    };

    let (eval, segment) = if config.final_run {
        (&datasets.test, EvalSegment::Test)
    } else {
        (&datasets.validation, EvalSegment::Validation)
    };
    let (fitted, best) = BestModelTrainer::new(config.best_model.clone()).train(&datasets.train, eval, segment)?;

    if let Some(path) = &config.save_model {
        fitted.save(path)?;
        info!(path = %path.display(), "model saved");
        written.push(path.clone());
    }

    let predictions = if config.final_run {
        if merged.future.is_empty() {
            warn!(year = config.future_year, "no rows in the future period");
        }
        let predictions = predict_future(&fitted, merged.future, config)?;
        let path = config.out_dir.join(PREDICTIONS_FILE);
        write_predictions(&predictions, &path)?;
        written.push(path);
        Some(predictions)
    } else {
        None
    };

    Ok(PipelineOutcome {
        segment_rows,
        feature_names: datasets.train.feature_names.clone(),
        yearly_means,
        harness,
        best,
        predictions,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn table(names: &[&str], rows: usize) -> HourlyTable {
        let start: NaiveDateTime = NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let index = (0..rows).map(|i| start + Duration::hours(i as i64)).collect();
        HourlyTable::from_columns(
            index,
            names.iter().map(|n| (n.to_string(), vec![1.0; rows])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_assemble_reorders_to_training_order() {
        let tables = Segments {
            train: table(&["a", "b", TOTAL_TRAFFIC], 4),
            validation: table(&["b", TOTAL_TRAFFIC, "a"], 2),
            test: table(&["a", "b", TOTAL_TRAFFIC], 2),
        };
        let datasets = assemble_datasets(&tables).unwrap();
        assert_eq!(datasets.validation.feature_names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(datasets.train.x.dim(), (4, 2));
        assert_eq!(datasets.test.len(), 2);
    }

    #[test]
    fn test_sentinel_target_rows_are_dropped_in_training() {
        use crate::data::schema::{AIR_PRESSURE, AIR_TEMPERATURE, WIND_DIRECTION, WIND_SPEED};

        let mut weather = table(&[AIR_TEMPERATURE, AIR_PRESSURE, WIND_DIRECTION, WIND_SPEED], 100);
        let target: Vec<f64> = (0..100)
            .map(|i| if i == 10 || i == 20 { SENTINEL } else { i as f64 })
            .collect();
        weather.with_column(TOTAL_TRAFFIC, Array1::from(target)).unwrap();
        weather.column_mut(AIR_PRESSURE).unwrap().fill(1000.0);

        let processed = process_segment(weather, Mode::Training, &PipelineConfig::default()).unwrap();

        let target = processed.column(TOTAL_TRAFFIC).unwrap();
        assert!(target.iter().all(|v| !v.is_nan() && *v != SENTINEL));
        // 98 real targets, then the 0.99 quantile drops the largest
        assert_eq!(processed.height(), 97);
        assert!(target.iter().all(|v| *v <= 98.0));
    }

    #[test]
    fn test_assemble_rejects_different_feature_sets() {
        let tables = Segments {
            train: table(&["a", "b", TOTAL_TRAFFIC], 4),
            validation: table(&["a", TOTAL_TRAFFIC], 2),
            test: table(&["a", "b", TOTAL_TRAFFIC], 2),
        };
        assert!(matches!(assemble_datasets(&tables), Err(ForecastError::SchemaError(_))));
    }
}
