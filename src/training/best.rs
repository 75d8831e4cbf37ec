//! Fits the selected configuration and evaluates it on a held-out segment

use super::catalog::ModelConfig;
use super::engine::TrainedModel;
use super::models::ModelMetrics;
use crate::data::schema::TOTAL_TRAFFIC;
use crate::data::HourlyTable;
use crate::error::{ForecastError, Result};
use crate::pipeline::Dataset;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Segment the best model is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalSegment {
    Validation,
    /// Only used for the final run
    Test,
}

/// Importance of one feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Outcome of fitting and scoring the best configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestModelReport {
    pub label: String,
    pub segment: EvalSegment,
    pub metrics: ModelMetrics,
    /// Descending by importance; empty for models without importances
    pub importances: Vec<FeatureImportance>,
}

/// A fitted model together with the feature names it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub config: ModelConfig,
    pub model: TrainedModel,
    pub feature_names: Vec<String>,
}

impl FittedModel {
    /// Fit `config` on a dataset
    pub fn fit(config: &ModelConfig, train: &Dataset) -> Result<Self> {
        let model = TrainedModel::fit(config, &train.x, &train.y)?;
        Ok(Self {
            config: config.clone(),
            model,
            feature_names: train.feature_names.clone(),
        })
    }

    /// Predict a dataset whose columns are already in training order
    pub fn predict_dataset(&self, data: &Dataset) -> Result<Array1<f64>> {
        if data.feature_names != self.feature_names {
            return Err(ForecastError::PredictionSchemaError {
                expected: self.feature_names.clone(),
                actual: data.feature_names.clone(),
            });
        }
        self.model.predict(&data.x)
    }

    /// Predict every row of a processed table
    ///
    /// The table's columns (the target excluded) must equal the training
    /// features as a set; they are reordered to training order.
    pub fn predict_table(&self, table: &HourlyTable) -> Result<Array1<f64>> {
        let actual: BTreeSet<&str> = table
            .column_names()
            .iter()
            .map(|s| s.as_str())
            .filter(|s| *s != TOTAL_TRAFFIC)
            .collect();
        let expected: BTreeSet<&str> = self.feature_names.iter().map(|s| s.as_str()).collect();

        if actual != expected {
            return Err(ForecastError::PredictionSchemaError {
                expected: self.feature_names.clone(),
                actual: actual.into_iter().map(String::from).collect(),
            });
        }

        let x = table.to_array2(&self.feature_names)?;
        self.model.predict(&x)
    }

    /// Importances paired with feature names, most important first
    pub fn ranked_importances(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = match self.model.feature_importances() {
            Some(values) => self
                .feature_names
                .iter()
                .zip(values.iter())
                .map(|(feature, &importance)| FeatureImportance {
                    feature: feature.clone(),
                    importance,
                })
                .collect(),
            None => Vec::new(),
        };
        ranked.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(Ordering::Equal));
        ranked
    }

    /// Save the fitted model as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a fitted model saved with [`FittedModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Trains the chosen configuration and scores it
#[derive(Debug, Clone)]
pub struct BestModelTrainer {
    config: ModelConfig,
}

impl Default for BestModelTrainer {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl BestModelTrainer {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fit on `train`, score on `eval`
    pub fn train(&self, train: &Dataset, eval: &Dataset, segment: EvalSegment) -> Result<(FittedModel, BestModelReport)> {
        if eval.is_empty() {
            return Err(ForecastError::DataError(format!("{:?} segment is empty", segment)));
        }

        let start = Instant::now();
        let fitted = FittedModel::fit(&self.config, train)?;
        let predictions = fitted.predict_dataset(eval)?;
        let metrics = ModelMetrics::compute_regression(&eval.y, &predictions)
            .with_training_time(start.elapsed().as_secs_f64())
            .with_n_features(train.feature_names.len());

        info!(
            model = %self.config,
            segment = ?segment,
            mse = metrics.mse,
            rmse = metrics.rmse,
            "best model evaluated"
        );

        let report = BestModelReport {
            label: self.config.label(),
            segment,
            metrics,
            importances: fitted.ranked_importances(),
        };
        Ok((fitted, report))
    }
}
