//! Stepwise model selection
//!
//! Two rounds of backward elimination per outcome. Round 1 fits every
//! candidate predictor; every predictor whose Round-1 p-value exceeds the
//! threshold is removed in one step and the model is refitted once. There is
//! no further iteration, so a predictor that would become significant after
//! others are removed is still dropped.

pub mod design;

pub use design::{Design, INTERCEPT, PredictorColumns, term_label};

use log::{debug, info, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::algorithm::stats::{FitOptions, FittedModel, Reference, fit_linear, fit_logistic};
use crate::error::{ModelError, ModelFailure, Result};
use crate::models::{AnalysisRecord, Value, Variable, VariableKind};

/// Significance threshold used when none is configured
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Regression family of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Binomial response, logit link; effects are odds ratios
    Logistic,
    /// Least squares on the natural log of the outcome; effects are
    /// multiplicative
    LogLinear,
}

impl ModelFamily {
    /// Family matching an outcome's kind
    ///
    /// Only the stay measurements are continuous outcomes; age is a
    /// predictor.
    #[must_use]
    pub const fn for_outcome(outcome: Variable) -> Option<Self> {
        match outcome.kind() {
            VariableKind::Binary => Some(Self::Logistic),
            VariableKind::Continuous => match outcome {
                Variable::LengthOfStay | Variable::IcuHours => Some(Self::LogLinear),
                _ => None,
            },
            VariableKind::Categorical => None,
        }
    }

    /// Name of the exponentiated effect
    #[must_use]
    pub const fn effect_name(self) -> &'static str {
        match self {
            Self::Logistic => "odds ratio",
            Self::LogLinear => "multiplicative effect",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logistic => f.write_str("logistic"),
            Self::LogLinear => f.write_str("log_linear"),
        }
    }
}

/// Candidate predictors used when a model lists none
#[must_use]
pub fn default_predictors() -> Vec<Variable> {
    vec![
        Variable::HousingStatus,
        Variable::Age,
        Variable::Sex,
        Variable::DrugAlcoholDisorder,
        Variable::MentalIllness,
        Variable::SpecialtyGroup,
    ]
}

const fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// What to model and how to select predictors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub outcome: Variable,
    #[serde(default = "default_predictors")]
    pub predictors: Vec<Variable>,
    /// Predictors with a Round-1 p-value above this are dropped
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Inferred from the outcome when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ModelFamily>,
}

impl ModelSpec {
    #[must_use]
    pub fn new(outcome: Variable, predictors: Vec<Variable>) -> Self {
        Self {
            outcome,
            predictors,
            threshold: DEFAULT_THRESHOLD,
            family: None,
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_family(mut self, family: ModelFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Check the model definition is consistent and resolve its family
    pub fn validate(&self) -> std::result::Result<ModelFamily, ModelFailure> {
        let inferred = ModelFamily::for_outcome(self.outcome).ok_or_else(|| {
            ModelFailure::InvalidSpec(format!(
                "{} cannot be a model outcome",
                self.outcome
            ))
        })?;
        if let Some(family) = self.family {
            if family != inferred {
                return Err(ModelFailure::InvalidSpec(format!(
                    "{family} family does not fit outcome {} (expected {inferred})",
                    self.outcome
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelFailure::InvalidSpec(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        if self.predictors.contains(&self.outcome) {
            return Err(ModelFailure::InvalidSpec(format!(
                "outcome {} is listed among its own predictors",
                self.outcome
            )));
        }
        for (i, predictor) in self.predictors.iter().enumerate() {
            if self.predictors[..i].contains(predictor) {
                return Err(ModelFailure::InvalidSpec(format!(
                    "predictor {predictor} is listed twice"
                )));
            }
        }
        Ok(inferred)
    }

    fn error(&self, predictors: &[Variable], failure: ModelFailure) -> ModelError {
        ModelError::new(self.outcome, predictors, failure)
    }
}

/// Records a model is fitted on, with their response values
///
/// Logistic models use every record. Log-linear models use only records
/// whose outcome has a defined log, so the ICU-hours model only sees
/// admissions with ICU time.
#[must_use]
pub fn fitting_set<'a>(
    records: &'a [AnalysisRecord],
    outcome: Variable,
    family: ModelFamily,
) -> (Vec<&'a AnalysisRecord>, Array1<f64>) {
    let (kept, response): (Vec<_>, Vec<_>) = records
        .iter()
        .filter_map(|record| {
            let response = match family {
                ModelFamily::Logistic => match outcome.value(record) {
                    Value::Binary(flag) => Some(f64::from(u8::from(flag))),
                    _ => None,
                },
                ModelFamily::LogLinear => outcome.log_value(record),
            };
            response.map(|y| (record, y))
        })
        .unzip();
    (kept, Array1::from(response))
}

/// One estimated term of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientEstimate {
    pub term: String,
    /// Predictor the term belongs to, `None` for the intercept
    pub predictor: Option<Variable>,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// `exp(estimate)`
    pub effect: f64,
    pub effect_lower: f64,
    pub effect_upper: f64,
}

/// Round-1 significance of one predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorTest {
    pub predictor: Variable,
    pub terms: Vec<String>,
    /// Number of coefficients tested jointly
    pub df: usize,
    pub p_value: f64,
}

/// A predictor removed before Round 2
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedPredictor {
    pub predictor: Variable,
    pub p_value: f64,
}

/// Fit statistics of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub observations: usize,
    pub parameters: usize,
    pub iterations: usize,
    /// Binomial deviance or residual sum of squares
    pub deviance: f64,
    pub aic: f64,
    /// Residual degrees of freedom of least squares fits
    pub residual_df: Option<f64>,
}

impl From<&FittedModel> for FitSummary {
    fn from(fit: &FittedModel) -> Self {
        Self {
            observations: fit.observations,
            parameters: fit.parameters(),
            iterations: fit.iterations,
            deviance: fit.deviance,
            aic: fit.aic,
            residual_df: match fit.reference {
                Reference::Normal => None,
                Reference::StudentT { df } => Some(df),
            },
        }
    }
}

/// Final model of one outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub outcome: Variable,
    pub family: ModelFamily,
    pub threshold: f64,
    pub confidence_level: f64,
    /// Predictors kept for Round 2, in configured order
    pub retained: Vec<Variable>,
    pub intercept: CoefficientEstimate,
    /// Round-2 terms, intercept excluded
    pub coefficients: Vec<CoefficientEstimate>,
    pub dropped: Vec<DroppedPredictor>,
    pub round_one: Vec<PredictorTest>,
    pub round_one_coefficients: Vec<CoefficientEstimate>,
    pub fit: FitSummary,
    pub warnings: Vec<String>,
}

impl ModelResult {
    #[must_use]
    pub fn coefficient(&self, term: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.term == term)
    }

    #[must_use]
    pub fn is_intercept_only(&self) -> bool {
        self.retained.is_empty()
    }

    #[must_use]
    pub fn retains(&self, predictor: Variable) -> bool {
        self.retained.contains(&predictor)
    }

    #[must_use]
    pub fn round_one_test(&self, predictor: Variable) -> Option<&PredictorTest> {
        self.round_one.iter().find(|t| t.predictor == predictor)
    }
}

/// Fit the two rounds for one outcome
pub fn select_model(
    records: &[AnalysisRecord],
    spec: &ModelSpec,
    options: &FitOptions,
) -> Result<ModelResult> {
    let family = spec
        .validate()
        .map_err(|failure| spec.error(&spec.predictors, failure))?;

    let (fitting, response) = fitting_set(records, spec.outcome, family);
    debug!(
        "Fitting {} model for {} on {} of {} records",
        family,
        spec.outcome,
        fitting.len(),
        records.len()
    );
    if design::is_constant(&response) {
        return Err(spec
            .error(&spec.predictors, ModelFailure::ZeroVarianceOutcome)
            .into());
    }

    // Round 1
    let full = Design::build(&fitting, &spec.predictors)
        .map_err(|failure| spec.error(&spec.predictors, failure))?;
    let round_one_fit = fit(&full, &response, family, options)
        .map_err(|failure| spec.error(&spec.predictors, failure))?;

    let mut round_one = Vec::with_capacity(spec.predictors.len());
    for columns in &full.predictors {
        round_one.push(PredictorTest {
            predictor: columns.predictor,
            terms: columns.columns.iter().map(|&c| full.terms[c].clone()).collect(),
            df: columns.columns.len(),
            p_value: round_one_fit.joint_p_value(&columns.columns)?,
        });
    }
    let round_one_coefficients = estimates(&full, &round_one_fit, options.confidence_level)?;

    // A zero threshold keeps nothing, even a p-value that underflowed to 0
    let (kept, removed): (Vec<_>, Vec<_>) = round_one
        .iter()
        .partition(|test| spec.threshold > 0.0 && test.p_value <= spec.threshold);
    let retained: Vec<Variable> = kept.iter().map(|t| t.predictor).collect();
    let dropped: Vec<DroppedPredictor> = removed
        .iter()
        .map(|t| DroppedPredictor {
            predictor: t.predictor,
            p_value: t.p_value,
        })
        .collect();

    // Round 2
    let (final_design, final_fit) = if dropped.is_empty() {
        (full, round_one_fit)
    } else {
        let reduced = Design::build(&fitting, &retained)
            .map_err(|failure| spec.error(&retained, failure))?;
        let reduced_fit = fit(&reduced, &response, family, options)
            .map_err(|failure| spec.error(&retained, failure))?;
        (reduced, reduced_fit)
    };

    let mut coefficients = estimates(&final_design, &final_fit, options.confidence_level)?;
    let intercept = coefficients.remove(0);

    let mut warnings = final_fit.warnings.clone();
    if retained.is_empty() {
        warnings.push("no predictor met the threshold; intercept-only model reported".to_string());
    }
    for warning in &warnings {
        warn!("{}: {warning}", spec.outcome);
    }

    info!(
        "{} ({family}): retained [{}], dropped [{}]",
        spec.outcome,
        retained.iter().map(Variable::name).collect::<Vec<_>>().join(", "),
        dropped
            .iter()
            .map(|d| d.predictor.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(ModelResult {
        outcome: spec.outcome,
        family,
        threshold: spec.threshold,
        confidence_level: options.confidence_level,
        retained,
        intercept,
        coefficients,
        dropped,
        round_one,
        round_one_coefficients,
        fit: FitSummary::from(&final_fit),
        warnings,
    })
}

fn fit(
    design: &Design,
    response: &Array1<f64>,
    family: ModelFamily,
    options: &FitOptions,
) -> std::result::Result<FittedModel, ModelFailure> {
    match family {
        ModelFamily::Logistic => fit_logistic(&design.matrix, response, options),
        ModelFamily::LogLinear => fit_linear(&design.matrix, response),
    }
}

fn estimates(
    design: &Design,
    fit: &FittedModel,
    confidence_level: f64,
) -> Result<Vec<CoefficientEstimate>> {
    design
        .terms
        .iter()
        .enumerate()
        .map(|(i, term)| {
            let (ci_lower, ci_upper) = fit.confidence_interval(i, confidence_level)?;
            let estimate = fit.coefficients[i];
            Ok(CoefficientEstimate {
                term: term.clone(),
                predictor: design.predictor_of(i),
                estimate,
                std_error: fit.std_error(i),
                statistic: fit.statistic(i),
                p_value: fit.p_value(i)?,
                ci_lower,
                ci_upper,
                effect: estimate.exp(),
                effect_lower: ci_lower.exp(),
                effect_upper: ci_upper.exp(),
            })
        })
        .collect()
}
