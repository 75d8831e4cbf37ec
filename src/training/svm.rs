//! Support vector regression
//!
//! Epsilon-insensitive regression trained by projected gradient steps on the
//! dual coefficients over a precomputed kernel matrix.
//!
//! The kernel matrix grows with the square of the sample count, so larger
//! training sets are fit on a seeded random subsample of `max_samples` rows.

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default cap on the rows the kernel matrix is built over (about 200 MB)
pub const DEFAULT_MAX_SAMPLES: usize = 5_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²).
    /// Without an explicit γ, `1 / (n_features · Var(X))` is used.
    RBF { gamma: Option<f64> },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: None }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
    /// Rows beyond this are subsampled before fitting
    pub max_samples: usize,
    /// Seed for the subsample
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            epsilon: 0.1,
            max_samples: DEFAULT_MAX_SAMPLES,
            random_state: 0,
        }
    }
}

/// Kernel with γ resolved against the training data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum FittedKernel {
    Linear,
    Rbf { gamma: f64 },
}

impl FittedKernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            FittedKernel::Linear => a.dot(&b),
            FittedKernel::Rbf { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    kernel: Option<FittedKernel>,
    support_vectors: Option<Array2<f64>>,
    alphas: Option<Array1<f64>>, // alpha - alpha*
    bias: f64,
}

impl SVMRegressor {
    /// Create a new SVM regressor
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: None,
            alphas: None,
            bias: 0.0,
        }
    }

    fn resolve_kernel(&self, x: &Array2<f64>) -> FittedKernel {
        match self.config.kernel {
            KernelType::Linear => FittedKernel::Linear,
            KernelType::RBF { gamma: Some(gamma) } => FittedKernel::Rbf { gamma },
            KernelType::RBF { gamma: None } => {
                let var = x.var(0.0);
                let denom = x.ncols() as f64 * var;
                FittedKernel::Rbf {
                    gamma: if denom > 0.0 { 1.0 / denom } else { 1.0 },
                }
            }
        }
    }

    /// Fit the regressor using gradient steps on the epsilon-insensitive loss
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();

        if n != y.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(ForecastError::TrainingError("cannot fit SVR on zero samples".to_string()));
        }
        if self.config.max_samples == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "max_samples".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if n > self.config.max_samples {
            warn!(
                samples = n,
                max_samples = self.config.max_samples,
                "SVR fit on a random subsample of the training rows"
            );
            let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
            let mut rows = index::sample(&mut rng, n, self.config.max_samples).into_vec();
            rows.sort_unstable();
            let x_sub = x.select(Axis(0), &rows);
            let y_sub = y.select(Axis(0), &rows);
            return self.fit_all(&x_sub, &y_sub);
        }
        self.fit_all(x, y)
    }

    fn fit_all(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        let kernel = self.resolve_kernel(x);
        let kernel_matrix = Self::compute_kernel_matrix(kernel, x);

        let mut alphas: Array1<f64> = Array1::zeros(n); // alpha
        let mut alphas_star: Array1<f64> = Array1::zeros(n); // alpha*
        let mut bias: f64 = 0.0;
        // cached K·(alpha - alpha*)
        let mut fitted: Array1<f64> = Array1::zeros(n);

        let learning_rate: f64 = 0.01;

        for _iter in 0..self.config.max_iter {
            let mut max_change: f64 = 0.0;

            for i in 0..n {
                let error: f64 = fitted[i] + bias - y[i];

                let delta = if error > self.config.epsilon {
                    let new_val = (alphas_star[i] + learning_rate).min(self.config.c);
                    let d = new_val - alphas_star[i];
                    alphas_star[i] = new_val;
                    -d
                } else if error < -self.config.epsilon {
                    let new_val = (alphas[i] + learning_rate).min(self.config.c);
                    let d = new_val - alphas[i];
                    alphas[i] = new_val;
                    d
                } else {
                    0.0
                };
                if delta != 0.0 {
                    fitted.scaled_add(delta, &kernel_matrix.column(i));
                    max_change = max_change.max(delta.abs());
                }

                let bias_update = learning_rate * 0.1 * error;
                max_change = max_change.max(bias_update.abs());
                bias -= bias_update;
            }

            if max_change < self.config.tol {
                break;
            }
        }

        let combined_alphas = &alphas - &alphas_star;

        let support_indices: Vec<usize> = combined_alphas
            .iter()
            .enumerate()
            .filter(|(_, a)| a.abs() > 1e-8)
            .map(|(i, _)| i)
            .collect();

        self.support_vectors = Some(x.select(Axis(0), &support_indices));
        self.alphas = Some(support_indices.iter().map(|&i| combined_alphas[i]).collect());
        self.kernel = Some(kernel);
        self.bias = bias;

        Ok(())
    }

    fn compute_kernel_matrix(kernel: FittedKernel, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut matrix = Array2::zeros((n, n));
        matrix
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                for j in 0..n {
                    row[j] = kernel.eval(x.row(i), x.row(j));
                }
            });
        matrix
    }

    /// Predict target values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, sv, alphas) = match (&self.kernel, &self.support_vectors, &self.alphas) {
            (Some(k), Some(sv), Some(a)) => (*k, sv, a),
            _ => return Err(ForecastError::ModelNotFitted),
        };

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                self.bias
                    + sv.rows()
                        .into_iter()
                        .zip(alphas.iter())
                        .map(|(s, a)| a * kernel.eval(sample, s))
                        .sum::<f64>()
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}
