//! Dense symmetric positive definite solves
//!
//! The fits work on `ndarray` arrays while the factorization itself is done
//! by `faer`. The helpers here copy between the two and wrap faer's LLᵀ
//! decomposition with the relative pivot check the model fits rely on to
//! spot collinear designs.

use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2};

/// Pivots at or below this fraction of the original diagonal entry mark the
/// matrix as singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Copy an `ndarray` matrix into a faer `Mat`
#[must_use]
pub fn to_faer(matrix: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

/// Copy a faer matrix back into `ndarray`
#[must_use]
pub fn from_faer(matrix: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

/// Cholesky factorization `A = L Lᵀ` of a symmetric matrix
pub struct Cholesky {
    llt: Llt<f64>,
    dim: usize,
}

impl Cholesky {
    /// Factorize a symmetric matrix
    ///
    /// Returns `None` when the matrix is not square or not numerically
    /// positive definite. The pivot test is relative to the diagonal entry,
    /// so a column that is (nearly) a linear combination of earlier columns
    /// is detected regardless of its scale.
    #[must_use]
    pub fn decompose(matrix: &Array2<f64>) -> Option<Self> {
        let n = matrix.nrows();
        if n != matrix.ncols() || matrix.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let llt = to_faer(matrix).llt(Side::Lower).ok()?;
        let lower = llt.L();
        for j in 0..n {
            let root = lower[(j, j)];
            let floor = SINGULAR_TOLERANCE * matrix[[j, j]].abs().max(f64::MIN_POSITIVE);
            if !root.is_finite() || root * root <= floor {
                return None;
            }
        }

        Some(Self { llt, dim: n })
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Solve `A x = b`
    #[must_use]
    pub fn solve(&self, rhs: &Array1<f64>) -> Array1<f64> {
        let column = Mat::from_fn(rhs.len(), 1, |i, _| rhs[i]);
        let solution = self.llt.solve(&column);
        Array1::from_shape_fn(self.dim, |i| solution[(i, 0)])
    }

    /// `A⁻¹`
    #[must_use]
    pub fn inverse(&self) -> Array2<f64> {
        let identity = Mat::<f64>::identity(self.dim, self.dim);
        let inverse = self.llt.solve(&identity);
        from_faer(inverse.as_ref())
    }
}
