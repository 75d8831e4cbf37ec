//! Error types for the bikeflow pipeline

use thiserror::Error;

/// Result type alias for bikeflow operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    /// An expected column or table is absent
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A value outside its physical range reached a stage that assumes trimmed input
    #[error("Domain range error: {column} = {value} is outside [{min}, {max})")]
    DomainRangeError {
        column: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Feature columns at prediction time differ from the ones the model was trained on
    #[error("Prediction schema mismatch: model expects {expected:?}, got {actual:?}")]
    PredictionSchemaError {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for ForecastError {
    fn from(err: chrono::ParseError) -> Self {
        ForecastError::DataError(format!("timestamp parse failure: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::SchemaError("missing column Lufttrykk".to_string());
        assert_eq!(err.to_string(), "Schema error: missing column Lufttrykk");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForecastError = io_err.into();
        assert!(matches!(err, ForecastError::IoError(_)));
    }

    #[test]
    fn test_prediction_schema_display_lists_columns() {
        let err = ForecastError::PredictionSchemaError {
            expected: vec!["hour".to_string()],
            actual: vec!["month".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("hour"));
        assert!(msg.contains("month"));
    }
}
