//! Model-selection harness
//!
//! Fits every configuration of a stage on the training segment and scores it on
//! the validation segment. A configuration that fails is recorded and skipped.

use super::catalog::{ModelConfig, SearchStage};
use super::engine::TrainedModel;
use super::models::ModelMetrics;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Score of one successfully evaluated configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessResult {
    pub label: String,
    pub config: ModelConfig,
    pub metrics: ModelMetrics,
}

/// A configuration whose fit or predict failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessFailure {
    pub label: String,
    pub config: ModelConfig,
    pub error: String,
}

/// Ranked outcome of one search stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub stage: SearchStage,
    /// Sorted by ascending validation RMSE
    pub results: Vec<HarnessResult>,
    pub failures: Vec<HarnessFailure>,
}

impl HarnessReport {
    /// Lowest-RMSE configuration, if any succeeded
    pub fn best(&self) -> Option<&HarnessResult> {
        self.results.first()
    }

    /// Save a set of stage reports as pretty JSON
    pub fn save_all(reports: &[HarnessReport], path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(reports)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load stage reports written by [`HarnessReport::save_all`]
    pub fn load_all(path: &Path) -> Result<Vec<HarnessReport>> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Evaluates model configurations against a fixed train/validation split
pub struct ModelHarness<'a> {
    x_train: &'a Array2<f64>,
    y_train: &'a Array1<f64>,
    x_val: &'a Array2<f64>,
    y_val: &'a Array1<f64>,
    parallel: bool,
}

impl<'a> ModelHarness<'a> {
    pub fn new(
        x_train: &'a Array2<f64>,
        y_train: &'a Array1<f64>,
        x_val: &'a Array2<f64>,
        y_val: &'a Array1<f64>,
    ) -> Result<Self> {
        if x_train.nrows() != y_train.len() || x_val.nrows() != y_val.len() {
            return Err(ForecastError::ShapeError {
                expected: "matching feature and target row counts".to_string(),
                actual: format!(
                    "train {}x{} / {}, validation {}x{} / {}",
                    x_train.nrows(),
                    x_train.ncols(),
                    y_train.len(),
                    x_val.nrows(),
                    x_val.ncols(),
                    y_val.len()
                ),
            });
        }
        if x_train.ncols() != x_val.ncols() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} validation features", x_train.ncols()),
                actual: format!("{} validation features", x_val.ncols()),
            });
        }
        if y_val.is_empty() {
            return Err(ForecastError::DataError("validation segment is empty".to_string()));
        }

        Ok(Self {
            x_train,
            y_train,
            x_val,
            y_val,
            parallel: true,
        })
    }

    /// Evaluate configurations one at a time instead of in parallel
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn evaluate_one(&self, config: &ModelConfig) -> std::result::Result<HarnessResult, HarnessFailure> {
        let start = Instant::now();
        let outcome = TrainedModel::fit(config, self.x_train, self.y_train)
            .and_then(|model| model.predict(self.x_val));

        match outcome {
            Ok(pred) if pred.iter().all(|p| p.is_finite()) => {
                let metrics = ModelMetrics::compute_regression(self.y_val, &pred)
                    .with_training_time(start.elapsed().as_secs_f64())
                    .with_n_features(self.x_train.ncols());
                info!(model = %config, rmse = metrics.rmse, secs = metrics.training_time_secs, "evaluated");
                Ok(HarnessResult {
                    label: config.label(),
                    config: config.clone(),
                    metrics,
                })
            }
            Ok(_) => {
                warn!(model = %config, "non-finite predictions");
                Err(HarnessFailure {
                    label: config.label(),
                    config: config.clone(),
                    error: "predictions contain NaN or infinite values".to_string(),
                })
            }
            Err(e) => {
                warn!(model = %config, error = %e, "configuration failed");
                Err(HarnessFailure {
                    label: config.label(),
                    config: config.clone(),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Evaluate `configs` and rank them by validation RMSE
    pub fn evaluate(&self, stage: SearchStage, configs: &[ModelConfig]) -> HarnessReport {
        info!(stage = %stage, configs = configs.len(), "starting harness stage");

        let outcomes: Vec<std::result::Result<HarnessResult, HarnessFailure>> = if self.parallel {
            configs.par_iter().map(|c| self.evaluate_one(c)).collect()
        } else {
            configs.iter().map(|c| self.evaluate_one(c)).collect()
        };

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(r) => results.push(r),
                Err(f) => failures.push(f),
            }
        }
        // stable sort keeps catalog order among equal scores
        results.sort_by(|a, b| a.metrics.rmse.partial_cmp(&b.metrics.rmse).unwrap_or(Ordering::Equal));

        HarnessReport { stage, results, failures }
    }

    /// Evaluate the configurations of a predefined stage
    pub fn run_stage(&self, stage: SearchStage, random_state: u64) -> HarnessReport {
        self.evaluate(stage, &stage.configs(random_state))
    }

    /// Run every stage in order
    pub fn run_search(&self, random_state: u64) -> Vec<HarnessReport> {
        SearchStage::ALL
            .iter()
            .map(|stage| self.run_stage(*stage, random_state))
            .collect()
    }
}
