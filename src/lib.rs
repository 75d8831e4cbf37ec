//! bikeflow - Hourly bicycle traffic forecasting
//!
//! This crate turns weather station exports and bicycle counter exports into an
//! hourly regression problem and trains models on it:
//! - Loading and hourly resampling of the raw exports
//! - Merging, target derivation and a chronological split
//! - Outlier trimming and KNN imputation per segment
//! - Calendar and weather feature engineering
//! - A model-selection harness over several regression families
//! - Prediction of a reserved future year
//!
//! # Modules
//!
//! - [`data`] - Hourly tables, column vocabulary, raw file loaders
//! - [`pipeline`] - Merge, split, cleaning, features and the pipeline entry point
//! - [`imputation`] - KNN missing-value imputation
//! - [`training`] - Regression models, harness and best-model training
//! - [`inference`] - Future-period prediction
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and processing
pub mod data;
pub mod imputation;
pub mod pipeline;

// Models
pub mod training;
pub mod inference;

// Interface
pub mod cli;

pub use error::{ForecastError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{load_directory, HourlyTable};
    pub use crate::error::{ForecastError, Result};
    pub use crate::inference::{predict_future, FuturePrediction};
    pub use crate::pipeline::{process_segment, run_pipeline, Mode, PipelineConfig, PipelineOutcome};
    pub use crate::training::{FittedModel, ModelConfig, ModelHarness, SearchStage};
}
