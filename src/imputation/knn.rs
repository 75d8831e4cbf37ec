//! KNN-based imputation

use crate::error::{ForecastError, Result};
use crate::imputation::{is_missing, Imputer};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered float for priority queue
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap by distance (we want to pop largest distances)
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// How neighbor values are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeights {
    /// Plain average of the neighbors
    Uniform,
    /// Inverse-distance weighted average
    #[default]
    Distance,
}

/// KNN-based imputer
///
/// Donors for a column are the fitted rows that observe that column. The
/// distance is the NaN-aware Euclidean distance over the coordinates both rows
/// observe, scaled up by the fraction of coordinates present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    /// Number of neighbors
    n_neighbors: usize,
    /// Weights for averaging
    weights: KnnWeights,
    /// Rows seen at fit time, missing values included
    fit_data: Option<Array2<f64>>,
    /// NaN-skipping feature means for fallback
    feature_means: Option<Array1<f64>>,
}

impl KNNImputer {
    /// Create new KNN imputer
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights: KnnWeights::Distance,
            fit_data: None,
            feature_means: None,
        }
    }

    /// Set weighting scheme
    pub fn with_weights(mut self, weights: KnnWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Distance between two samples over the coordinates both observe
    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let mut count = 0usize;
        let mut accum = 0.0f64;

        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            count += 1;
            let d = ai - bi;
            accum += d * d;
        }

        if count == 0 {
            return f64::INFINITY;
        }

        (accum * a.len() as f64 / count as f64).sqrt()
    }

    /// k nearest donors for `feature_idx`, given distances to every fitted row
    fn nearest_donors(&self, distances: &[f64], data: &Array2<f64>, feature_idx: usize) -> Vec<(usize, f64)> {
        let k = self.n_neighbors;
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, &dist) in distances.iter().enumerate() {
            if !dist.is_finite() || is_missing(data[[i, feature_idx]]) {
                continue;
            }
            if heap.len() < k {
                heap.push(DistanceIdx(dist, i));
            } else if let Some(&DistanceIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistanceIdx(dist, i));
                }
            }
        }

        heap.into_iter().map(|DistanceIdx(d, i)| (i, d)).collect()
    }

    /// Impute missing value using neighbors
    fn impute_value(&self, neighbors: &[(usize, f64)], data: &Array2<f64>, means: &Array1<f64>, feature_idx: usize) -> f64 {
        if neighbors.is_empty() {
            return means[feature_idx];
        }

        match self.weights {
            KnnWeights::Distance => {
                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;

                for &(idx, dist) in neighbors {
                    let weight = if dist < 1e-10 { 1e10 } else { 1.0 / dist };
                    weighted_sum += data[[idx, feature_idx]] * weight;
                    weight_sum += weight;
                }

                if weight_sum > 0.0 {
                    weighted_sum / weight_sum
                } else {
                    means[feature_idx]
                }
            }
            KnnWeights::Uniform => {
                let sum: f64 = neighbors.iter().map(|&(idx, _)| data[[idx, feature_idx]]).sum();
                sum / neighbors.len() as f64
            }
        }
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ForecastError::DataError("cannot fit imputer on an empty table".to_string()));
        }

        let mut feature_means = Array1::zeros(x.ncols());
        for (j, column) in x.columns().into_iter().enumerate() {
            let (sum, n) = column
                .iter()
                .filter(|v| !is_missing(**v))
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                return Err(ForecastError::DataError(format!(
                    "column {} has no observed values to impute from",
                    j
                )));
            }
            feature_means[j] = sum / n as f64;
        }

        self.fit_data = Some(x.clone());
        self.feature_means = Some(feature_means);

        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (data, means) = match (&self.fit_data, &self.feature_means) {
            (Some(d), Some(m)) => (d, m),
            _ => return Err(ForecastError::ModelNotFitted),
        };
        if x.ncols() != data.ncols() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} features", data.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let incomplete: Vec<usize> = (0..x.nrows())
            .filter(|&r| x.row(r).iter().any(|&v| is_missing(v)))
            .collect();

        let fills: Vec<(usize, Vec<(usize, f64)>)> = incomplete
            .par_iter()
            .map(|&r| {
                let row = x.row(r);
                let distances: Vec<f64> = data.rows().into_iter().map(|d| Self::distance(row, d)).collect();
                let values = (0..x.ncols())
                    .filter(|&j| is_missing(row[j]))
                    .map(|j| {
                        let neighbors = self.nearest_donors(&distances, data, j);
                        (j, self.impute_value(&neighbors, data, means, j))
                    })
                    .collect();
                (r, values)
            })
            .collect();

        let mut result = x.clone();
        for (r, values) in fills {
            for (j, v) in values {
                result[[r, j]] = v;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_imputer_basic() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0,
                2.5, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3).with_weights(KnnWeights::Uniform);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(!result.iter().any(|&v| v.is_nan()));
        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_knn_imputer_distance_weights() {
        let data = Array2::from_shape_vec(
            (5, 2),
            vec![
                0.0, 0.0,
                1.0, 1.0,
                2.0, 2.0,
                3.0, 3.0,
                0.1, f64::NAN, // Very close to first row
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(result[[4, 1]].abs() < 1.0);
    }

    #[test]
    fn test_donors_must_observe_the_column() {
        // row 1 is the closest but is missing column 1 as well
        let data = Array2::from_shape_vec(
            (3, 2),
            vec![
                0.0, f64::NAN,
                0.0, f64::NAN,
                5.0, 7.0,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(1);
        let result = imputer.fit_transform(&data).unwrap();

        assert_eq!(result[[0, 1]], 7.0);
        assert_eq!(result[[1, 1]], 7.0);
    }

    #[test]
    fn test_unreachable_row_falls_back_to_mean() {
        let data = Array2::from_shape_vec(
            (3, 2),
            vec![
                1.0, 2.0,
                3.0, 4.0,
                f64::NAN, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(2);
        let result = imputer.fit_transform(&data).unwrap();

        assert_eq!(result[[2, 0]], 2.0);
        assert_eq!(result[[2, 1]], 3.0);
    }

    #[test]
    fn test_all_missing_column_is_rejected() {
        let data = Array2::from_shape_vec((2, 2), vec![1.0, f64::NAN, 2.0, f64::NAN]).unwrap();
        let mut imputer = KNNImputer::default();
        assert!(matches!(imputer.fit(&data), Err(ForecastError::DataError(_))));
    }
}
