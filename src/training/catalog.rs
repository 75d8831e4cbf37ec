//! Declarative model configurations and the search stages built from them

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One regression family with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Predicts the training mean
    Dummy,
    Lasso { alpha: f64 },
    ElasticNet { alpha: f64, l1_ratio: f64 },
    /// RBF support vector regression
    Svr { c: f64, epsilon: f64, random_state: u64 },
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
        random_state: u64,
    },
    RandomForest { n_estimators: usize, random_state: u64 },
    Knn { n_neighbors: usize },
    DecisionTree { max_depth: usize },
}

impl ModelConfig {
    /// Random forest with the given size
    pub fn random_forest(n_estimators: usize, random_state: u64) -> Self {
        ModelConfig::RandomForest { n_estimators, random_state }
    }

    /// Short family name
    pub fn family(&self) -> &'static str {
        match self {
            ModelConfig::Dummy => "Dummy",
            ModelConfig::Lasso { .. } => "Lasso",
            ModelConfig::ElasticNet { .. } => "ElasticNet",
            ModelConfig::Svr { .. } => "SVR",
            ModelConfig::GradientBoosting { .. } => "GradientBoosting",
            ModelConfig::RandomForest { .. } => "RandomForest",
            ModelConfig::Knn { .. } => "KNN",
            ModelConfig::DecisionTree { .. } => "DecisionTree",
        }
    }

    /// Human-readable label including hyperparameters
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Reject hyperparameters no model can be built from
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| {
            Err(ForecastError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: reason.to_string(),
            })
        };
        match *self {
            ModelConfig::Lasso { alpha } | ModelConfig::ElasticNet { alpha, .. } if !(alpha >= 0.0) => {
                invalid("alpha", alpha.to_string(), "must be non-negative")
            }
            ModelConfig::ElasticNet { l1_ratio, .. } if !(0.0..=1.0).contains(&l1_ratio) => {
                invalid("l1_ratio", l1_ratio.to_string(), "must be in [0, 1]")
            }
            ModelConfig::Svr { c, .. } if !(c > 0.0) => invalid("c", c.to_string(), "must be positive"),
            ModelConfig::GradientBoosting { n_estimators: 0, .. } | ModelConfig::RandomForest { n_estimators: 0, .. } => {
                invalid("n_estimators", "0".to_string(), "must be at least 1")
            }
            ModelConfig::Knn { n_neighbors: 0 } => invalid("n_neighbors", "0".to_string(), "must be at least 1"),
            ModelConfig::DecisionTree { max_depth: 0 } => invalid("max_depth", "0".to_string(), "must be at least 1"),
            _ => Ok(()),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::random_forest(181, 2)
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelConfig::Dummy => write!(f, "Dummy(mean)"),
            ModelConfig::Lasso { alpha } => write!(f, "Lasso(alpha={})", alpha),
            ModelConfig::ElasticNet { alpha, l1_ratio } => {
                write!(f, "ElasticNet(alpha={}, l1_ratio={})", alpha, l1_ratio)
            }
            ModelConfig::Svr { c, epsilon, .. } => write!(f, "SVR(rbf, C={}, epsilon={})", c, epsilon),
            ModelConfig::GradientBoosting { n_estimators, learning_rate, .. } => write!(
                f,
                "GradientBoosting(n_estimators={}, learning_rate={})",
                n_estimators, learning_rate
            ),
            ModelConfig::RandomForest { n_estimators, .. } => {
                write!(f, "RandomForest(n_estimators={})", n_estimators)
            }
            ModelConfig::Knn { n_neighbors } => write!(f, "KNN(n_neighbors={})", n_neighbors),
            ModelConfig::DecisionTree { max_depth } => write!(f, "DecisionTree(max_depth={})", max_depth),
        }
    }
}

/// Which group of configurations the harness evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    /// One representative of every family
    Baseline,
    /// Coarse sweep over the forest size
    ForestSizeSweep,
    /// Finer sweep around the best coarse sizes
    ForestSizeRefinement,
}

impl SearchStage {
    pub const ALL: [SearchStage; 3] = [
        SearchStage::Baseline,
        SearchStage::ForestSizeSweep,
        SearchStage::ForestSizeRefinement,
    ];

    /// Configurations of this stage, seeded with `random_state`
    pub fn configs(&self, random_state: u64) -> Vec<ModelConfig> {
        match self {
            SearchStage::Baseline => baseline_catalog(random_state),
            SearchStage::ForestSizeSweep => forest_size_sweep(random_state),
            SearchStage::ForestSizeRefinement => forest_size_refinement(random_state),
        }
    }
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchStage::Baseline => "baseline",
            SearchStage::ForestSizeSweep => "forest size sweep",
            SearchStage::ForestSizeRefinement => "forest size refinement",
        };
        f.write_str(name)
    }
}

/// One configuration per family
pub fn baseline_catalog(random_state: u64) -> Vec<ModelConfig> {
    vec![
        ModelConfig::Dummy,
        ModelConfig::Lasso { alpha: 100.0 },
        ModelConfig::random_forest(100, random_state),
        ModelConfig::ElasticNet { alpha: 100.0, l1_ratio: 0.5 },
        ModelConfig::Svr {
            c: 1.0,
            epsilon: 0.1,
            random_state,
        },
        ModelConfig::GradientBoosting {
            n_estimators: 50,
            learning_rate: 0.1,
            random_state,
        },
        ModelConfig::random_forest(50, random_state),
        ModelConfig::random_forest(15, random_state),
        ModelConfig::random_forest(200, random_state),
        ModelConfig::Knn { n_neighbors: 5 },
        ModelConfig::Knn { n_neighbors: 50 },
        ModelConfig::Knn { n_neighbors: 100 },
        ModelConfig::DecisionTree { max_depth: 12 },
        ModelConfig::DecisionTree { max_depth: 50 },
        ModelConfig::DecisionTree { max_depth: 100 },
    ]
}

/// Forest sizes 1, 51, ..., 251
pub fn forest_size_sweep(random_state: u64) -> Vec<ModelConfig> {
    (1..=251).step_by(50).map(|n| ModelConfig::random_forest(n, random_state)).collect()
}

/// Forest sizes 151, 181, 211, 241
pub fn forest_size_refinement(random_state: u64) -> Vec<ModelConfig> {
    (151..=251).step_by(30).map(|n| ModelConfig::random_forest(n, random_state)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest_sizes(configs: &[ModelConfig]) -> Vec<usize> {
        configs
            .iter()
            .filter_map(|c| match c {
                ModelConfig::RandomForest { n_estimators, .. } => Some(*n_estimators),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_baseline_catalog_covers_every_family() {
        let catalog = baseline_catalog(2);
        assert_eq!(catalog.len(), 15);
        for family in ["Dummy", "Lasso", "ElasticNet", "SVR", "GradientBoosting", "RandomForest", "KNN", "DecisionTree"] {
            assert!(catalog.iter().any(|c| c.family() == family), "missing {}", family);
        }
    }

    #[test]
    fn test_forest_stages() {
        assert_eq!(forest_size_sweep(2).len(), 6);
        assert_eq!(forest_sizes(&forest_size_sweep(2)), vec![1, 51, 101, 151, 201, 251]);
        assert_eq!(forest_sizes(&forest_size_refinement(2)), vec![151, 181, 211, 241]);
    }

    #[test]
    fn test_default_best_model() {
        assert_eq!(ModelConfig::default(), ModelConfig::RandomForest { n_estimators: 181, random_state: 2 });
        assert_eq!(ModelConfig::default().label(), "RandomForest(n_estimators=181)");
    }

    #[test]
    fn test_config_json_is_tagged() {
        let json = serde_json::to_string(&ModelConfig::Knn { n_neighbors: 5 }).unwrap();
        assert_eq!(json, r#"{"family":"knn","n_neighbors":5}"#);
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelConfig::Knn { n_neighbors: 5 });
    }

    #[test]
    fn test_validate() {
        assert!(ModelConfig::Knn { n_neighbors: 0 }.validate().is_err());
        assert!(ModelConfig::ElasticNet { alpha: 1.0, l1_ratio: 1.5 }.validate().is_err());
        assert!(ModelConfig::default().validate().is_ok());
    }
}
