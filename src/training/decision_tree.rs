//! Regression tree
//!
//! Splits minimise the summed squared error of the children. Every feature keeps
//! its sample indices presorted, so a node scans each feature once with running
//! sums and hands stable partitions of the sorted lists to its children.

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Nodes at least this large scan their features in parallel
const PARALLEL_SPLIT_MIN_SAMPLES: usize = 2048;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Candidate split found by scanning one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    /// Number of sorted samples going left
    position: usize,
    threshold: f64,
    /// Reduction of the summed squared error
    gain: f64,
}

/// Regression tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl DecisionTree {
    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ForecastError::TrainingError("cannot fit a tree on zero samples".to_string()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ForecastError::TrainingError("training data contains NaN or infinite values".to_string()));
        }

        self.n_features = n_features;

        let sorted: Vec<Vec<usize>> = (0..n_features)
            .into_par_iter()
            .map(|f| {
                let mut idx: Vec<usize> = (0..n_samples).collect();
                idx.sort_by(|&a, &b| x[[a, f]].partial_cmp(&x[[b, f]]).unwrap_or(Ordering::Equal));
                idx
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut goes_left = vec![false; n_samples];
        let samples: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &samples, sorted, 0, &mut importances, &mut goes_left));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        samples: &[usize],
        sorted: Vec<Vec<usize>>,
        depth: usize,
        importances: &mut [f64],
        goes_left: &mut [bool],
    ) -> TreeNode {
        let n_samples = samples.len();
        let (sum, sq_sum) = samples
            .iter()
            .fold((0.0, 0.0), |(s, q), &i| (s + y[i], q + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let impurity = (sq_sum / n_samples as f64 - mean * mean).max(0.0);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        let leaf = TreeNode::Leaf { value: mean, n_samples };
        if should_stop || self.n_features == 0 {
            return leaf;
        }

        let best = match self.find_best_split(x, y, &sorted, sum) {
            Some(b) => b,
            None => return leaf,
        };

        importances[best.feature_idx] += best.gain;

        let chosen = &sorted[best.feature_idx];
        for &i in &chosen[..best.position] {
            goes_left[i] = true;
        }
        for &i in &chosen[best.position..] {
            goes_left[i] = false;
        }

        let mut left_sorted = Vec::with_capacity(sorted.len());
        let mut right_sorted = Vec::with_capacity(sorted.len());
        for list in sorted {
            let (l, r): (Vec<usize>, Vec<usize>) = list.into_iter().partition(|&i| goes_left[i]);
            left_sorted.push(l);
            right_sorted.push(r);
        }
        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.iter().copied().partition(|&i| goes_left[i]);

        let left = Box::new(self.build_tree(x, y, &left_samples, left_sorted, depth + 1, importances, goes_left));
        let right = Box::new(self.build_tree(x, y, &right_samples, right_sorted, depth + 1, importances, goes_left));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, sorted: &[Vec<usize>], total_sum: f64) -> Option<SplitCandidate> {
        let scan = |feature_idx: usize| self.scan_feature(x, y, &sorted[feature_idx], feature_idx, total_sum);

        let n_samples = sorted.first().map_or(0, |s| s.len());
        let candidates: Vec<Option<SplitCandidate>> = if n_samples >= PARALLEL_SPLIT_MIN_SAMPLES {
            (0..sorted.len()).into_par_iter().map(scan).collect()
        } else {
            (0..sorted.len()).map(scan).collect()
        };

        // lowest feature index wins ties
        candidates.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    fn scan_feature(&self, x: &Array2<f64>, y: &Array1<f64>, order: &[usize], feature_idx: usize, total_sum: f64) -> Option<SplitCandidate> {
        let n = order.len();
        let min_leaf = self.min_samples_leaf;
        let parent_score = total_sum * total_sum / n as f64;

        let mut left_sum = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for pos in 1..n {
            left_sum += y[order[pos - 1]];
            let lo = x[[order[pos - 1], feature_idx]];
            let hi = x[[order[pos], feature_idx]];
            if hi <= lo || pos < min_leaf || n - pos < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
            let gain = score - parent_score;
            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate { feature_idx, position: pos, threshold, gain });
            }
        }

        best
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ForecastError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ForecastError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.outer_iter().map(|row| Self::predict_sample(root, row)).collect())
    }

    fn predict_sample(mut node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + Self::node_depth(left).max(Self::node_depth(right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert!((p - a).abs() < 1e-9);
        }
    }

    #[test]
    fn test_step_function_single_split() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
        let pred = tree.predict(&array![[2.5], [9.0]]).unwrap();
        assert_eq!(pred[0], 5.0);
        assert_eq!(pred[1], 20.0);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_rejects_nan() {
        let x = array![[1.0], [f64::NAN]];
        let y = array![0.0, 1.0];
        let mut tree = DecisionTree::new_regressor();
        assert!(tree.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_regressor();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(ForecastError::ModelNotFitted)));
    }
}
