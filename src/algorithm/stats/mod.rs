//! Statistical routines
//!
//! Regression fitting, contingency-table tests and descriptive summaries.

pub mod contingency;
pub mod descriptive;
pub mod glm;
pub mod linalg;

pub use contingency::{
    Alternative, CellResidual, ContingencyTable, TestMethod, TestResult, adjusted_residuals,
    chi_square_test, fisher_exact_test,
};
pub use glm::{FitOptions, FittedModel, Reference, fit_linear, fit_logistic};
