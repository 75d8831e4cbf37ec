//! Penalised linear models fitted by coordinate descent
//!
//! The objective matches the usual `1/(2n)·‖y − Xw‖² + α·ρ·‖w‖₁ + α·(1−ρ)/2·‖w‖²`
//! scaling, so `alpha` values carry over from other toolkits unchanged.

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Soft-threshold operator for L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Fitted weights and intercept
struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

/// Coordinate descent on centered data with separate L1 and L2 penalties
fn coordinate_descent(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    l1_ratio: f64,
    max_iter: usize,
    tol: f64,
) -> Result<LinearFit> {
    let n_samples = x.nrows();
    let n_features = x.ncols();
    if n_samples != y.len() {
        return Err(ForecastError::ShapeError {
            expected: format!("y length = {}", n_samples),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(alpha >= 0.0) {
        return Err(ForecastError::InvalidParameter {
            name: "alpha".to_string(),
            value: alpha.to_string(),
            reason: "must be non-negative".to_string(),
        });
    }

    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| ForecastError::TrainingError("cannot fit a linear model on zero samples".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    let x_c = x - &x_mean.clone().insert_axis(Axis(0));
    let y_c = y - y_mean;

    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x_c.column(j).mapv(|v| v * v).sum())
        .collect();

    let n = n_samples as f64;
    let l1_penalty = alpha * l1_ratio * n;
    let l2_penalty = alpha * (1.0 - l1_ratio) * n;
    let mut w = Array1::zeros(n_features);

    // Compute residual once; coordinates update it incrementally
    let mut r = y_c.clone();

    for _iter in 0..max_iter {
        let mut max_change = 0.0f64;

        for j in 0..n_features {
            let denom = col_norms[j] + l2_penalty;
            if col_norms[j] < 1e-15 || denom < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let rho = x_c.column(j).dot(&r) + col_norms[j] * w[j];
            let old_wj = w[j];
            w[j] = soft_threshold(rho, l1_penalty) / denom;
            let delta = old_wj - w[j];
            if delta != 0.0 {
                r.scaled_add(delta, &x_c.column(j));
            }
            max_change = max_change.max(delta.abs());
        }

        if max_change < tol {
            break;
        }
    }

    if w.iter().any(|v: &f64| !v.is_finite()) {
        return Err(ForecastError::ComputationError("coordinate descent diverged".to_string()));
    }

    Ok(LinearFit {
        intercept: y_mean - w.dot(&x_mean),
        coefficients: w,
    })
}

fn r2_score(p: &Array1<f64>, y: &Array1<f64>) -> f64 {
    let ym = y.mean().unwrap_or(0.0);
    let ss_res = (p - y).mapv(|v| v * v).sum();
    let ss_tot = y.mapv(|v| (v - ym).powi(2)).sum();
    if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot }
}

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let fit = coordinate_descent(x, y, self.alpha, 1.0, self.max_iter, self.tol)?;
        self.coefficients = Some(fit.coefficients);
        self.intercept = Some(fit.intercept);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.coefficients.as_ref().ok_or(ForecastError::ModelNotFitted)?;
        Ok(x.dot(w) + self.intercept.unwrap_or(0.0))
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(&self.predict(x)?, y))
    }
}

/// Elastic Net Regression (L1 + L2 regularization via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let fit = coordinate_descent(x, y, self.alpha, self.l1_ratio, self.max_iter, self.tol)?;
        self.coefficients = Some(fit.coefficients);
        self.intercept = Some(fit.intercept);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.coefficients.as_ref().ok_or(ForecastError::ModelNotFitted)?;
        Ok(x.dot(w) + self.intercept.unwrap_or(0.0))
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(&self.predict(x)?, y))
    }
}
