//! Pipeline configuration

use crate::error::{ForecastError, Result};
use crate::imputation::KnnWeights;
use crate::training::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the nearest-neighbor imputer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputerConfig {
    /// Number of donors averaged per missing value
    pub n_neighbors: usize,

    /// Weighting of the donors
    pub weights: KnnWeights,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 20,
            weights: KnnWeights::Distance,
        }
    }
}

/// Positional split fractions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of rows in the training segment
    pub train_fraction: f64,

    /// Share of the remaining rows that goes to validation; the rest is test
    pub validation_fraction_of_rest: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            validation_fraction_of_rest: 0.5,
        }
    }
}

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the weather and traffic exports
    pub data_dir: PathBuf,

    /// Directory the CSV and JSON outputs are written to
    pub out_dir: PathBuf,

    /// Run the model-selection harness before training the best model
    pub train_many: bool,

    /// Score on the test segment and predict the future period
    pub final_run: bool,

    /// Seed for every randomized model
    pub random_state: u64,

    pub imputer: ImputerConfig,

    /// Rows whose target exceeds this segment-local quantile are dropped
    pub target_quantile: f64,

    pub split: SplitConfig,

    /// Calendar year reserved for future predictions
    pub future_year: i32,

    /// Configuration trained as the best model
    pub best_model: ModelConfig,

    /// Where to save the fitted best model, if anywhere
    pub save_model: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            out_dir: PathBuf::from("."),
            train_many: false,
            final_run: false,
            random_state: 2,
            imputer: ImputerConfig::default(),
            target_quantile: 0.99,
            split: SplitConfig::default(),
            future_year: 2023,
            best_model: ModelConfig::default(),
            save_model: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ForecastError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the input directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the output directory
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Builder method to enable the model-selection harness
    pub fn with_train_many(mut self, enabled: bool) -> Self {
        self.train_many = enabled;
        self
    }

    /// Builder method to enable final mode
    pub fn with_final_run(mut self, enabled: bool) -> Self {
        self.final_run = enabled;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_imputer(mut self, imputer: ImputerConfig) -> Self {
        self.imputer = imputer;
        self
    }

    pub fn with_target_quantile(mut self, q: f64) -> Self {
        self.target_quantile = q;
        self
    }

    pub fn with_future_year(mut self, year: i32) -> Self {
        self.future_year = year;
        self
    }

    pub fn with_best_model(mut self, config: ModelConfig) -> Self {
        self.best_model = config;
        self
    }

    /// Builder method to save the fitted best model
    pub fn with_save_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_model = Some(path.into());
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.imputer.n_neighbors == 0 {
            return Err(ForecastError::ConfigError("imputer.n_neighbors must be at least 1".to_string()));
        }
        if !(self.target_quantile > 0.0 && self.target_quantile <= 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "target_quantile must be in (0, 1], got {}",
                self.target_quantile
            )));
        }
        let SplitConfig { train_fraction, validation_fraction_of_rest } = self.split;
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "split.train_fraction must be in (0, 1), got {}",
                train_fraction
            )));
        }
        if !(validation_fraction_of_rest > 0.0 && validation_fraction_of_rest < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "split.validation_fraction_of_rest must be in (0, 1), got {}",
                validation_fraction_of_rest
            )));
        }
        self.best_model
            .validate()
            .map_err(|e| ForecastError::ConfigError(format!("best_model: {}", e)))
    }
}
