//! Error handling for the analysis pipeline.

pub mod util;

use std::fmt;
use std::io;

use parquet::errors::ParquetError;

use crate::models::variable::Variable;

/// Specialized error type for the analysis pipeline
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Error opening or reading a file
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<io::Error>,
    },
    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
    /// A sheet is missing columns every record needs
    #[error("Schema error: {0}")]
    Schema(String),
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// JSON or Arrow (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A statistical test or distribution could not be evaluated
    #[error("Statistics error: {0}")]
    Statistics(String),
    /// A background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
    /// A model fit failed for one outcome
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl AnalysisError {
    /// Create an IO error without an underlying source
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error wrapping the original `io::Error`
    pub fn io_error_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a statistics error from any displayable cause
    pub fn statistics<E: fmt::Display>(context: &str, error: E) -> Self {
        Self::Statistics(format!("{context}: {error}"))
    }
}

impl From<io::Error> for AnalysisError {
    fn from(error: io::Error) -> Self {
        Self::io_error_with_source(error.to_string(), error)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {error}"))
    }
}

impl From<serde_arrow::Error> for AnalysisError {
    fn from(error: serde_arrow::Error) -> Self {
        Self::Serialization(format!("Arrow records: {error}"))
    }
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}

/// Why a model fit could not produce a result
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFailure {
    /// IRLS did not reach the convergence tolerance
    NonConvergence { iterations: usize },
    /// The cross-product matrix is not positive definite
    SingularDesign,
    /// The outcome takes a single value over the fitting set
    ZeroVarianceOutcome,
    /// A predictor is constant over the fitting set
    ZeroVariancePredictor(Variable),
    /// Fewer observations than estimated parameters
    InsufficientObservations { observations: usize, parameters: usize },
    /// The model specification itself is inconsistent
    InvalidSpec(String),
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonConvergence { iterations } => {
                write!(f, "fit did not converge after {iterations} iterations")
            }
            Self::SingularDesign => write!(f, "singular design matrix (collinear predictors)"),
            Self::ZeroVarianceOutcome => write!(f, "outcome has zero variance in the fitting set"),
            Self::ZeroVariancePredictor(variable) => {
                write!(f, "predictor {variable} has zero variance in the fitting set")
            }
            Self::InsufficientObservations {
                observations,
                parameters,
            } => write!(
                f,
                "{observations} observations are not enough for {parameters} parameters"
            ),
            Self::InvalidSpec(msg) => write!(f, "invalid model specification: {msg}"),
        }
    }
}

/// A failed fit, with enough context to decide whether to skip or abort
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("model for outcome {outcome} with predictors [{}] failed: {failure}", format_predictors(.predictors))]
pub struct ModelError {
    /// Outcome being modelled
    pub outcome: Variable,
    /// Predictor set of the fit that failed
    pub predictors: Vec<Variable>,
    /// Failure reason
    pub failure: ModelFailure,
}

impl ModelError {
    #[must_use]
    pub fn new(outcome: Variable, predictors: &[Variable], failure: ModelFailure) -> Self {
        Self {
            outcome,
            predictors: predictors.to_vec(),
            failure,
        }
    }
}

fn format_predictors(predictors: &[Variable]) -> String {
    predictors
        .iter()
        .map(Variable::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
