//! Model training module
//!
//! Provides the regression families the model-selection harness compares:
//! - Mean baseline
//! - Lasso and ElasticNet
//! - RBF support vector regression
//! - Gradient boosting
//! - Decision trees and random forests
//! - K-Nearest Neighbors

mod engine;
mod models;
pub mod best;
pub mod catalog;
pub mod decision_tree;
pub mod dummy;
pub mod gradient_boosting;
pub mod harness;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use best::{BestModelReport, BestModelTrainer, EvalSegment, FeatureImportance, FittedModel};
pub use catalog::{baseline_catalog, forest_size_refinement, forest_size_sweep, ModelConfig, SearchStage};
pub use decision_tree::{DecisionTree, TreeNode};
pub use dummy::DummyRegressor;
pub use engine::{fit_predict, TrainedModel};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use harness::{HarnessFailure, HarnessReport, HarnessResult, ModelHarness};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{ElasticNetRegression, LassoRegression};
pub use models::ModelMetrics;
pub use random_forest::RandomForest;
pub use svm::{KernelType, SVMConfig, SVMRegressor};
