//! Training engine: builds, fits and queries any catalogued model

use super::catalog::ModelConfig;
use super::decision_tree::DecisionTree;
use super::dummy::DummyRegressor;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::KNNRegressor;
use super::linear_models::{ElasticNetRegression, LassoRegression};
use super::random_forest::RandomForest;
use super::svm::{KernelType, SVMConfig, SVMRegressor};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Dummy(DummyRegressor),
    Lasso(LassoRegression),
    ElasticNet(ElasticNetRegression),
    Svr(SVMRegressor),
    GradientBoosting(GradientBoostingRegressor),
    RandomForest(RandomForest),
    Knn(KNNRegressor),
    DecisionTree(DecisionTree),
}

impl TrainedModel {
    /// Build the model described by `config` and fit it
    pub fn fit(config: &ModelConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        config.validate()?;

        let model = match *config {
            ModelConfig::Dummy => {
                let mut model = DummyRegressor::new();
                model.fit(x, y)?;
                TrainedModel::Dummy(model)
            }
            ModelConfig::Lasso { alpha } => {
                let mut model = LassoRegression::new(alpha);
                model.fit(x, y)?;
                TrainedModel::Lasso(model)
            }
            ModelConfig::ElasticNet { alpha, l1_ratio } => {
                let mut model = ElasticNetRegression::new(alpha, l1_ratio);
                model.fit(x, y)?;
                TrainedModel::ElasticNet(model)
            }
            ModelConfig::Svr { c, epsilon, random_state } => {
                let config = SVMConfig {
                    c,
                    epsilon,
                    kernel: KernelType::RBF { gamma: None },
                    random_state,
                    ..Default::default()
                };
                let mut model = SVMRegressor::new(config);
                model.fit(x, y)?;
                TrainedModel::Svr(model)
            }
            ModelConfig::GradientBoosting { n_estimators, learning_rate, random_state } => {
                let config = GradientBoostingConfig {
                    n_estimators,
                    learning_rate,
                    random_state: Some(random_state),
                    ..Default::default()
                };
                let mut model = GradientBoostingRegressor::new(config);
                model.fit(x, y)?;
                TrainedModel::GradientBoosting(model)
            }
            ModelConfig::RandomForest { n_estimators, random_state } => {
                let mut model = RandomForest::new_regressor(n_estimators).with_random_state(random_state);
                model.fit(x, y)?;
                TrainedModel::RandomForest(model)
            }
            ModelConfig::Knn { n_neighbors } => {
                let mut model = KNNRegressor::with_k(n_neighbors);
                model.fit(x, y)?;
                TrainedModel::Knn(model)
            }
            ModelConfig::DecisionTree { max_depth } => {
                let mut model = DecisionTree::new_regressor().with_max_depth(max_depth);
                model.fit(x, y)?;
                TrainedModel::DecisionTree(model)
            }
        };

        Ok(model)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Dummy(m) => m.predict(x),
            TrainedModel::Lasso(m) => m.predict(x),
            TrainedModel::ElasticNet(m) => m.predict(x),
            TrainedModel::Svr(m) => m.predict(x),
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::Knn(m) => m.predict(x),
            TrainedModel::DecisionTree(m) => m.predict(x),
        }
    }

    /// Get feature importances (if available)
    ///
    /// Tree ensembles report impurity decrease; penalised linear models
    /// report absolute coefficients.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::DecisionTree(m) => m.feature_importances().cloned(),
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoosting(m) => Some(Array1::from_vec(m.feature_importances().to_vec())),
            TrainedModel::Lasso(m) => m.coefficients.as_ref().map(|c| c.mapv(f64::abs)),
            TrainedModel::ElasticNet(m) => m.coefficients.as_ref().map(|c| c.mapv(f64::abs)),
            TrainedModel::Dummy(_) | TrainedModel::Svr(_) | TrainedModel::Knn(_) => None,
        }
    }
}

/// Fit `config` on the training arrays and predict the evaluation arrays
pub fn fit_predict(
    config: &ModelConfig,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_eval: &Array2<f64>,
) -> Result<Array1<f64>> {
    TrainedModel::fit(config, x_train, y_train)?.predict(x_eval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::catalog::baseline_catalog;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 2)) % 17) as f64);
        let y = x.rows().into_iter().map(|r| 3.0 * r[0] - r[1] + 0.5 * r[2]).collect();
        (x, y)
    }

    #[test]
    fn test_every_baseline_config_fits() {
        let (x, y) = linear_data(120);
        for config in baseline_catalog(2) {
            let preds = fit_predict(&config, &x, &y, &x)
                .unwrap_or_else(|e| panic!("{} failed: {}", config, e));
            assert_eq!(preds.len(), 120, "{}", config);
            assert!(preds.iter().all(|p| p.is_finite()), "{}", config);
        }
    }

    #[test]
    fn test_forest_reports_importances() {
        let (x, y) = linear_data(60);
        let model = TrainedModel::fit(&ModelConfig::random_forest(10, 2), &x, &y).unwrap();
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 3);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_fitting() {
        let (x, y) = linear_data(10);
        assert!(TrainedModel::fit(&ModelConfig::Knn { n_neighbors: 0 }, &x, &y).is_err());
    }
}
