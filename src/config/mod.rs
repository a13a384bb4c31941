//! Analysis configuration
//!
//! Loaded from a JSON file; every field has a default, so an empty object
//! is a valid configuration that runs the general and orthopaedic reports
//! on `data/domiciled.csv` and `data/homeless.csv`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::algorithm::features::{DerivationRules, SURGICAL_SPECIALTIES};
use crate::algorithm::selection::{ModelSpec, default_predictors};
use crate::algorithm::stats::FitOptions;
use crate::error::util::safe_read_to_string;
use crate::error::{AnalysisError, Result};
use crate::models::{HousingStatus, Variable};

/// One input sheet and the housing group all of its rows belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetConfig {
    pub name: String,
    pub path: PathBuf,
    pub housing_status: HousingStatus,
}

/// A named report: which specialties to keep and which outcomes to model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    pub specialties: Vec<String>,
    pub outcomes: Vec<ModelSpec>,
}

impl ReportConfig {
    /// All surgical specialties, six outcomes
    #[must_use]
    pub fn general() -> Self {
        let predictors = default_predictors();
        Self {
            name: "general".to_string(),
            specialties: SURGICAL_SPECIALTIES.iter().map(|s| s.to_string()).collect(),
            outcomes: [
                Variable::Complication,
                Variable::Mortality,
                Variable::IcuAdmission,
                Variable::DischargeAgainstAdvice,
                Variable::LengthOfStay,
                Variable::IcuHours,
            ]
            .into_iter()
            .map(|outcome| ModelSpec::new(outcome, predictors.clone()))
            .collect(),
        }
    }

    /// Orthopaedic trauma only
    ///
    /// Both specialties collapse to one group, so the specialty group is not
    /// a candidate predictor here.
    #[must_use]
    pub fn orthopaedic() -> Self {
        let predictors: Vec<Variable> = default_predictors()
            .into_iter()
            .filter(|&p| p != Variable::SpecialtyGroup)
            .collect();
        Self {
            name: "orthopaedic".to_string(),
            specialties: vec!["OT1".to_string(), "OT2".to_string()],
            outcomes: [
                Variable::Complication,
                Variable::Mortality,
                Variable::LengthOfStay,
            ]
            .into_iter()
            .map(|outcome| ModelSpec::new(outcome, predictors.clone()))
            .collect(),
        }
    }
}

/// What to do when an outcome's model cannot be fitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run at the first failed outcome
    Abort,
    /// Record the failure, finish the report, exit non-zero at the end
    #[default]
    Continue,
}

/// Settings for the association tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Row variables of the confounder tables
    pub confounders: Vec<Variable>,
    /// Continuity correction for 2x2 chi-square tests
    pub yates_correction: bool,
    /// Significance level used to flag results in the text summary
    pub alpha: f64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            confounders: vec![
                Variable::Sex,
                Variable::AgeBand,
                Variable::DrugAlcoholDisorder,
                Variable::MentalIllness,
            ],
            yates_correction: true,
            alpha: 0.05,
        }
    }
}

/// Header aliases applied after normalization
#[must_use]
pub fn default_column_aliases() -> BTreeMap<String, String> {
    [
        ("gender", "sex"),
        ("age_years", "age"),
        ("diagnosis_codes", "associated_diagnosis_codes"),
        ("associated_diagnoses", "associated_diagnosis_codes"),
        ("codes", "associated_diagnosis_codes"),
        ("los", "length_of_stay"),
        ("length_of_stay_days", "length_of_stay"),
        ("icu", "icu_hours"),
        ("icu_stay_hours", "icu_hours"),
        ("discharge", "discharge_status"),
        ("discharge_type", "discharge_status"),
        ("specialty_code", "specialty"),
    ]
    .into_iter()
    .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
    .collect()
}

/// Complete configuration of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sheets: Vec<SheetConfig>,
    /// Normalized header to canonical admission field name
    pub column_aliases: BTreeMap<String, String>,
    pub derivation: DerivationRules,
    pub reports: Vec<ReportConfig>,
    pub model: FitOptions,
    pub tables: TableOptions,
    pub output_dir: PathBuf,
    /// Worker threads for outcome fits, all cores when unset
    pub threads: Option<usize>,
    pub on_model_error: FailurePolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sheets: HousingStatus::ALL
                .iter()
                .map(|&housing| SheetConfig {
                    name: housing.label().to_string(),
                    path: PathBuf::from(format!("data/{}.csv", housing.label())),
                    housing_status: housing,
                })
                .collect(),
            column_aliases: default_column_aliases(),
            derivation: DerivationRules::default(),
            reports: vec![ReportConfig::general(), ReportConfig::orthopaedic()],
            model: FitOptions::default(),
            tables: TableOptions::default(),
            output_dir: PathBuf::from("output"),
            threads: None,
            on_model_error: FailurePolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Read a configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = safe_read_to_string(path, "configuration")?;
        serde_json::from_str(&text).map_err(|e| {
            AnalysisError::Config(format!("invalid configuration {}: {e}", path.display()))
        })
    }

    /// Point every sheet of a housing group at `path`, adding a sheet when
    /// the group has none
    pub fn override_sheet(&mut self, housing_status: HousingStatus, path: PathBuf) {
        let mut replaced = false;
        for sheet in self
            .sheets
            .iter_mut()
            .filter(|s| s.housing_status == housing_status)
        {
            sheet.path.clone_from(&path);
            replaced = true;
        }
        if !replaced {
            self.sheets.push(SheetConfig {
                name: housing_status.label().to_string(),
                path,
                housing_status,
            });
        }
    }

    /// Use one significance threshold for every model
    pub fn set_threshold(&mut self, threshold: f64) {
        for spec in self.reports.iter_mut().flat_map(|r| r.outcomes.iter_mut()) {
            spec.threshold = threshold;
        }
    }

    /// Check the configuration before any data is read
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AnalysisError::Config(msg));

        if self.sheets.is_empty() {
            return invalid("no sheets configured".to_string());
        }
        let mut names = BTreeSet::new();
        for sheet in &self.sheets {
            if !names.insert(sheet.name.as_str()) {
                return invalid(format!("sheet name '{}' is used twice", sheet.name));
            }
        }

        if self.reports.is_empty() {
            return invalid("no reports configured".to_string());
        }
        let mut names = BTreeSet::new();
        for report in &self.reports {
            if report.name.trim().is_empty() {
                return invalid("report name is empty".to_string());
            }
            if !names.insert(report.name.as_str()) {
                return invalid(format!("report name '{}' is used twice", report.name));
            }
            if report.specialties.is_empty() {
                return invalid(format!("report '{}' has no specialties", report.name));
            }
            for spec in &report.outcomes {
                spec.validate().map_err(|failure| {
                    AnalysisError::Config(format!(
                        "report '{}', outcome {}: {failure}",
                        report.name, spec.outcome
                    ))
                })?;
            }
        }

        if !(self.model.confidence_level > 0.0 && self.model.confidence_level < 1.0) {
            return invalid(format!(
                "confidence level {} is outside (0, 1)",
                self.model.confidence_level
            ));
        }
        if self.model.max_iterations == 0 || !(self.model.tolerance > 0.0) {
            return invalid("fit options need max_iterations > 0 and tolerance > 0".to_string());
        }
        if self.threads == Some(0) {
            return invalid("threads must be at least 1".to_string());
        }
        for confounder in &self.tables.confounders {
            if confounder.kind() == crate::models::VariableKind::Continuous {
                return invalid(format!("confounder {confounder} is continuous"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Configuration:")?;
        for sheet in &self.sheets {
            writeln!(
                f,
                "  Sheet: {} ({}) {}",
                sheet.name,
                sheet.housing_status,
                sheet.path.display()
            )?;
        }
        for report in &self.reports {
            writeln!(
                f,
                "  Report: {} ({} specialties, {} outcomes)",
                report.name,
                report.specialties.len(),
                report.outcomes.len()
            )?;
        }
        writeln!(f, "  Output Directory: {}", self.output_dir.display())?;
        if let Some(threads) = self.threads {
            writeln!(f, "  Threads: {threads}")?;
        }
        writeln!(f, "  On Model Error: {:?}", self.on_model_error)?;
        Ok(())
    }
}
