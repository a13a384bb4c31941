//! Analysis variables
//!
//! The closed set of analysis-record columns that can be used as a model
//! outcome, a model predictor, or the row variable of a contingency table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::analysis::AnalysisRecord;

/// How a variable enters a model or a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Two levels, encoded as a 0/1 indicator
    Binary,
    /// Numeric measurement
    Continuous,
    /// Several labelled levels, dummy coded against a reference level
    Categorical,
}

/// A column of the analysis record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    HousingStatus,
    Sex,
    Age,
    AgeBand,
    SpecialtyGroup,
    Complication,
    Mortality,
    IcuAdmission,
    DrugAlcoholDisorder,
    MentalIllness,
    DischargeAgainstAdvice,
    LengthOfStay,
    IcuHours,
}

/// The value a record holds for one variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Binary(bool),
    Continuous(f64),
    Level(&'a str),
}

impl Variable {
    /// Column name as used in configuration and reports
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HousingStatus => "housing_status",
            Self::Sex => "sex",
            Self::Age => "age",
            Self::AgeBand => "age_band",
            Self::SpecialtyGroup => "specialty_group",
            Self::Complication => "complication",
            Self::Mortality => "mortality",
            Self::IcuAdmission => "icu_admission",
            Self::DrugAlcoholDisorder => "drug_alcohol_disorder",
            Self::MentalIllness => "mental_illness",
            Self::DischargeAgainstAdvice => "discharge_against_advice",
            Self::LengthOfStay => "length_of_stay",
            Self::IcuHours => "icu_hours",
        }
    }

    #[must_use]
    pub const fn kind(&self) -> VariableKind {
        match self {
            Self::Age | Self::LengthOfStay | Self::IcuHours => VariableKind::Continuous,
            Self::AgeBand | Self::SpecialtyGroup => VariableKind::Categorical,
            _ => VariableKind::Binary,
        }
    }

    /// Label of the level a binary indicator of 1 stands for
    ///
    /// Housing status is coded as `homeless` against `domiciled`, sex as `M`
    /// against `F`. Derived flags carry no suffix.
    #[must_use]
    pub const fn indicator_level(&self) -> Option<&'static str> {
        match self {
            Self::HousingStatus => Some("homeless"),
            Self::Sex => Some("M"),
            _ => None,
        }
    }

    /// Read this variable from a record
    #[must_use]
    pub fn value<'a>(&self, record: &'a AnalysisRecord) -> Value<'a> {
        match self {
            Self::HousingStatus => Value::Binary(record.housing_status.is_homeless()),
            Self::Sex => Value::Binary(record.sex.is_male()),
            Self::Age => Value::Continuous(record.age),
            Self::AgeBand => Value::Level(record.age_band.label()),
            Self::SpecialtyGroup => Value::Level(&record.specialty_group),
            Self::Complication => Value::Binary(record.complication),
            Self::Mortality => Value::Binary(record.mortality),
            Self::IcuAdmission => Value::Binary(record.icu_admission),
            Self::DrugAlcoholDisorder => Value::Binary(record.drug_alcohol_disorder),
            Self::MentalIllness => Value::Binary(record.mental_illness),
            Self::DischargeAgainstAdvice => Value::Binary(record.discharge_against_advice),
            Self::LengthOfStay => Value::Continuous(record.length_of_stay),
            Self::IcuHours => Value::Continuous(record.icu_hours),
        }
    }

    /// Natural-log transform of a continuous outcome
    ///
    /// `None` when the measurement is not strictly positive; such records are
    /// outside the fitting set of a log-linear model.
    #[must_use]
    pub fn log_value(&self, record: &AnalysisRecord) -> Option<f64> {
        match self {
            Self::LengthOfStay => record.log_length_of_stay(),
            Self::IcuHours => record.log_icu_hours(),
            _ => None,
        }
    }

    /// Level label used for contingency table rows
    ///
    /// Continuous variables have no levels.
    #[must_use]
    pub fn level_label(&self, record: &AnalysisRecord) -> Option<String> {
        match self {
            Self::HousingStatus => Some(record.housing_status.to_string()),
            Self::Sex => Some(record.sex.to_string()),
            _ => match self.value(record) {
                Value::Binary(flag) => Some(flag.to_string()),
                Value::Level(level) => Some(level.to_string()),
                Value::Continuous(_) => None,
            },
        }
    }

    /// Binary outcomes reported in the outcome tables
    #[must_use]
    pub const fn binary_outcomes() -> [Self; 4] {
        [
            Self::Complication,
            Self::Mortality,
            Self::IcuAdmission,
            Self::DischargeAgainstAdvice,
        ]
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
