//! Regression fits
//!
//! Logistic regression (binomial response, logit link) fitted by
//! iteratively reweighted least squares, and ordinary least squares for the
//! log-linear models. Both return a [`FittedModel`] carrying the estimates,
//! their covariance and the reference distribution for Wald inference.

use log::{debug, trace};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use super::linalg::Cholesky;
use crate::error::{AnalysisError, ModelFailure, Result};

/// Fitted probabilities closer than this to 0 or 1 are reported as
/// quasi-separation.
const SEPARATION_EPSILON: f64 = 1e-10;
/// Clamp for fitted probabilities so that the deviance stays finite
const PROBABILITY_CLAMP: f64 = 1e-15;

/// Convergence and interval settings shared by all fits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Maximum IRLS iterations for logistic fits
    pub max_iterations: usize,
    /// Relative deviance change that counts as converged
    pub tolerance: f64,
    /// Coverage of the reported confidence intervals
    pub confidence_level: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            confidence_level: 0.95,
        }
    }
}

/// Distribution of the Wald statistics of a fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference {
    /// Large-sample normal (logistic fits)
    Normal,
    /// Student-t with the residual degrees of freedom (least squares fits)
    StudentT { df: f64 },
}

/// Estimates and inference quantities of one fit
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub coefficients: Array1<f64>,
    pub covariance: Array2<f64>,
    pub observations: usize,
    pub iterations: usize,
    /// Binomial deviance, or residual sum of squares for least squares
    pub deviance: f64,
    pub aic: f64,
    pub reference: Reference,
    pub warnings: Vec<String>,
}

impl FittedModel {
    #[must_use]
    pub fn parameters(&self) -> usize {
        self.coefficients.len()
    }

    #[must_use]
    pub fn std_error(&self, index: usize) -> f64 {
        self.covariance[[index, index]].max(0.0).sqrt()
    }

    /// Wald statistic `β / se(β)`
    #[must_use]
    pub fn statistic(&self, index: usize) -> f64 {
        self.coefficients[index] / self.std_error(index)
    }

    /// Two-sided p-value of a single coefficient
    pub fn p_value(&self, index: usize) -> Result<f64> {
        let statistic = self.statistic(index).abs();
        let tail = match self.reference {
            Reference::Normal => standard_normal()?.sf(statistic),
            Reference::StudentT { df } => StudentsT::new(0.0, 1.0, df)
                .map_err(|e| AnalysisError::statistics("Student-t distribution", e))?
                .sf(statistic),
        };
        Ok((2.0 * tail).min(1.0))
    }

    /// Joint Wald test that all listed coefficients are zero
    ///
    /// Chi-square with `k` degrees of freedom for logistic fits, `F(k, df)`
    /// for least squares. For a single coefficient this equals
    /// [`Self::p_value`].
    pub fn joint_p_value(&self, indices: &[usize]) -> Result<f64> {
        if let [single] = indices {
            return self.p_value(*single);
        }

        let k = indices.len();
        let mut sub_covariance = Array2::<f64>::zeros((k, k));
        let mut sub_coefficients = Array1::<f64>::zeros(k);
        for (a, &i) in indices.iter().enumerate() {
            sub_coefficients[a] = self.coefficients[i];
            for (b, &j) in indices.iter().enumerate() {
                sub_covariance[[a, b]] = self.covariance[[i, j]];
            }
        }

        let chol = Cholesky::decompose(&sub_covariance).ok_or_else(|| {
            AnalysisError::Statistics("coefficient covariance is not positive definite".into())
        })?;
        let wald = sub_coefficients.dot(&chol.solve(&sub_coefficients));

        match self.reference {
            Reference::Normal => Ok(ChiSquared::new(k as f64)
                .map_err(|e| AnalysisError::statistics("chi-square distribution", e))?
                .sf(wald)),
            Reference::StudentT { df } => Ok(FisherSnedecor::new(k as f64, df)
                .map_err(|e| AnalysisError::statistics("F distribution", e))?
                .sf(wald / k as f64)),
        }
    }

    /// Wald confidence interval on the coefficient scale
    pub fn confidence_interval(&self, index: usize, level: f64) -> Result<(f64, f64)> {
        let quantile = 0.5 + level / 2.0;
        let critical = match self.reference {
            Reference::Normal => standard_normal()?.inverse_cdf(quantile),
            Reference::StudentT { df } => StudentsT::new(0.0, 1.0, df)
                .map_err(|e| AnalysisError::statistics("Student-t distribution", e))?
                .inverse_cdf(quantile),
        };
        let estimate = self.coefficients[index];
        let margin = critical * self.std_error(index);
        Ok((estimate - margin, estimate + margin))
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| AnalysisError::statistics("normal distribution", e))
}

fn logistic(eta: f64) -> f64 {
    let mu = 1.0 / (1.0 + (-eta).exp());
    mu.clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP)
}

fn binomial_deviance(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| yi * mi.ln() + (1.0 - yi) * (1.0 - mi).ln())
        .sum::<f64>()
}

/// `Xᵀ diag(w) X`
fn weighted_cross_product(x: &Array2<f64>, weights: &Array1<f64>) -> Array2<f64> {
    let weighted = x * &weights.view().insert_axis(Axis(1));
    x.t().dot(&weighted)
}

/// Fit a logistic regression by IRLS
///
/// `x` must already contain the intercept column; `y` holds 0/1 responses.
/// Convergence uses the relative deviance change
/// `|D - D_prev| / (|D| + 0.1) < tolerance`.
pub fn fit_logistic(
    x: &Array2<f64>,
    y: &Array1<f64>,
    options: &FitOptions,
) -> std::result::Result<FittedModel, ModelFailure> {
    let (n, p) = x.dim();
    if n <= p {
        return Err(ModelFailure::InsufficientObservations {
            observations: n,
            parameters: p,
        });
    }

    // start from the response itself, shrunk away from 0/1
    let mut mu = y.mapv(|yi| (yi + 0.5) / 2.0);
    let mut eta = mu.mapv(|m| (m / (1.0 - m)).ln());
    let mut deviance = binomial_deviance(y, &mu);
    let mut coefficients = Array1::<f64>::zeros(p);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;

        let weights = mu.mapv(|m| m * (1.0 - m));
        let working = &eta + &((y - &mu) / &weights);
        let information = weighted_cross_product(x, &weights);
        let score = x.t().dot(&(&weights * &working));

        let chol = Cholesky::decompose(&information).ok_or(ModelFailure::SingularDesign)?;
        coefficients = chol.solve(&score);
        if coefficients.iter().any(|b| !b.is_finite()) {
            return Err(ModelFailure::SingularDesign);
        }

        eta = x.dot(&coefficients);
        mu = eta.mapv(logistic);
        let previous = deviance;
        deviance = binomial_deviance(y, &mu);
        trace!("IRLS iteration {iterations}: deviance {deviance:.6}");

        if (deviance - previous).abs() / (deviance.abs() + 0.1) < options.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(ModelFailure::NonConvergence { iterations });
    }

    let weights = mu.mapv(|m| m * (1.0 - m));
    let covariance = Cholesky::decompose(&weighted_cross_product(x, &weights))
        .ok_or(ModelFailure::SingularDesign)?
        .inverse();

    let mut warnings = Vec::new();
    if mu
        .iter()
        .any(|&m| m < SEPARATION_EPSILON || m > 1.0 - SEPARATION_EPSILON)
    {
        warnings.push("fitted probabilities numerically 0 or 1 occurred".to_string());
    }

    debug!("Logistic fit converged after {iterations} iterations (deviance {deviance:.4})");

    Ok(FittedModel {
        coefficients,
        covariance,
        observations: n,
        iterations,
        deviance,
        aic: deviance + 2.0 * p as f64,
        reference: Reference::Normal,
        warnings,
    })
}

/// Fit ordinary least squares
///
/// `x` must already contain the intercept column.
pub fn fit_linear(
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> std::result::Result<FittedModel, ModelFailure> {
    let (n, p) = x.dim();
    if n <= p {
        return Err(ModelFailure::InsufficientObservations {
            observations: n,
            parameters: p,
        });
    }

    let chol = Cholesky::decompose(&x.t().dot(x)).ok_or(ModelFailure::SingularDesign)?;
    let coefficients = chol.solve(&x.t().dot(y));
    if coefficients.iter().any(|b| !b.is_finite()) {
        return Err(ModelFailure::SingularDesign);
    }

    let residuals = y - &x.dot(&coefficients);
    let rss = residuals.dot(&residuals);
    let df = (n - p) as f64;
    let sigma2 = rss / df;
    let covariance = chol.inverse() * sigma2;

    let n_f = n as f64;
    let aic = n_f * ((2.0 * std::f64::consts::PI * rss / n_f).ln() + 1.0) + 2.0 * (p as f64 + 1.0);

    debug!("Least squares fit on {n} observations (rss {rss:.4})");

    Ok(FittedModel {
        coefficients,
        covariance,
        observations: n,
        iterations: 1,
        deviance: rss,
        aic,
        reference: Reference::StudentT { df },
        warnings: Vec::new(),
    })
}
