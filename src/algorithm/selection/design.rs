//! Design matrix construction
//!
//! Column 0 is always the intercept. Each predictor contributes one column
//! (binary, continuous) or one column per non-reference level (categorical),
//! and remembers which columns are its own so that it can be tested jointly.

use ndarray::{Array1, Array2};
use smallvec::SmallVec;
use std::collections::BTreeSet;

use crate::error::ModelFailure;
use crate::models::{AnalysisRecord, Value, Variable, VariableKind};

/// Label of the intercept term
pub const INTERCEPT: &str = "(intercept)";

/// Columns belonging to one predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorColumns {
    pub predictor: Variable,
    pub columns: SmallVec<[usize; 4]>,
    /// Reference level of a categorical predictor
    pub reference_level: Option<String>,
}

/// Model matrix with its term labels
#[derive(Debug, Clone)]
pub struct Design {
    pub matrix: Array2<f64>,
    /// One label per column, intercept first
    pub terms: Vec<String>,
    pub predictors: Vec<PredictorColumns>,
}

impl Design {
    /// Build the design for `predictors` over the fitting set
    ///
    /// Constant predictors (including a categorical with a single level
    /// present) are reported as [`ModelFailure::ZeroVariancePredictor`].
    pub fn build(
        records: &[&AnalysisRecord],
        predictors: &[Variable],
    ) -> Result<Self, ModelFailure> {
        let n = records.len();
        let mut columns: Vec<Array1<f64>> = vec![Array1::ones(n)];
        let mut terms = vec![INTERCEPT.to_string()];
        let mut layout = Vec::with_capacity(predictors.len());

        for &predictor in predictors {
            let mut owned = SmallVec::new();
            let mut reference_level = None;

            match predictor.kind() {
                VariableKind::Binary | VariableKind::Continuous => {
                    let column: Array1<f64> =
                        records.iter().map(|r| numeric(predictor, r)).collect();
                    if is_constant(&column) {
                        return Err(ModelFailure::ZeroVariancePredictor(predictor));
                    }
                    owned.push(columns.len());
                    terms.push(term_label(predictor, predictor.indicator_level()));
                    columns.push(column);
                }
                VariableKind::Categorical => {
                    let levels: BTreeSet<&str> = records
                        .iter()
                        .filter_map(|r| match predictor.value(r) {
                            Value::Level(level) => Some(level),
                            _ => None,
                        })
                        .collect();
                    if levels.len() < 2 {
                        return Err(ModelFailure::ZeroVariancePredictor(predictor));
                    }
                    let mut levels = levels.into_iter();
                    reference_level = levels.next().map(str::to_string);
                    for level in levels {
                        let column: Array1<f64> = records
                            .iter()
                            .map(|r| match predictor.value(r) {
                                Value::Level(l) if l == level => 1.0,
                                _ => 0.0,
                            })
                            .collect();
                        owned.push(columns.len());
                        terms.push(term_label(predictor, Some(level)));
                        columns.push(column);
                    }
                }
            }

            layout.push(PredictorColumns {
                predictor,
                columns: owned,
                reference_level,
            });
        }

        let mut matrix = Array2::<f64>::zeros((n, columns.len()));
        for (j, column) in columns.iter().enumerate() {
            matrix.column_mut(j).assign(column);
        }

        Ok(Self {
            matrix,
            terms,
            predictors: layout,
        })
    }

    #[must_use]
    pub fn columns_of(&self, predictor: Variable) -> Option<&[usize]> {
        self.predictors
            .iter()
            .find(|p| p.predictor == predictor)
            .map(|p| p.columns.as_slice())
    }

    /// Predictor owning a column, `None` for the intercept
    #[must_use]
    pub fn predictor_of(&self, column: usize) -> Option<Variable> {
        self.predictors
            .iter()
            .find(|p| p.columns.contains(&column))
            .map(|p| p.predictor)
    }
}

/// `predictor[level]`, or the bare name for derived flags and continuous
/// predictors
#[must_use]
pub fn term_label(predictor: Variable, level: Option<&str>) -> String {
    match level {
        Some(level) => format!("{}[{level}]", predictor.name()),
        None => predictor.name().to_string(),
    }
}

fn numeric(variable: Variable, record: &AnalysisRecord) -> f64 {
    match variable.value(record) {
        Value::Binary(flag) => f64::from(u8::from(flag)),
        Value::Continuous(value) => value,
        Value::Level(_) => f64::NAN,
    }
}

pub(crate) fn is_constant(values: &Array1<f64>) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}
