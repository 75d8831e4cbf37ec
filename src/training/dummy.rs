//! Constant baseline predicting the training mean

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DummyRegressor {
    mean: Option<f64>,
}

impl DummyRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let mean = y
            .mean()
            .ok_or_else(|| ForecastError::TrainingError("cannot fit a baseline on zero samples".to_string()))?;
        self.mean = Some(mean);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(ForecastError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_training_mean() {
        let mut model = DummyRegressor::new();
        model.fit(&array![[0.0], [1.0]], &array![2.0, 4.0]).unwrap();
        assert_eq!(model.predict(&array![[9.0], [9.0], [9.0]]).unwrap(), array![3.0, 3.0, 3.0]);
    }
}
