//! Analysis-ready records
//!
//! An [`AnalysisRecord`] is produced once per report by the feature deriver
//! and never mutated afterwards. The log transforms used by the log-linear
//! models are computed on access.

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use std::fmt;

use crate::error::Result;
use crate::models::admission::{HousingStatus, Sex};

/// Sentinel stored when an admission has no associated diagnosis codes
pub const NO_DIAGNOSIS_CODES: &str = "NONE";

/// Age groups used by the grouped confounder tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgeBand {
    #[serde(rename = "<40")]
    Under40,
    #[serde(rename = "40-59")]
    From40To59,
    #[serde(rename = "60-79")]
    From60To79,
    #[serde(rename = "80+")]
    From80,
}

impl AgeBand {
    #[must_use]
    pub fn from_age(age: f64) -> Self {
        if age < 40.0 {
            Self::Under40
        } else if age < 60.0 {
            Self::From40To59
        } else if age < 80.0 {
            Self::From60To79
        } else {
            Self::From80
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Under40 => "<40",
            Self::From40To59 => "40-59",
            Self::From60To79 => "60-79",
            Self::From80 => "80+",
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A surgical admission with its derived outcome and exposure fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    /// Sheet the admission was read from
    pub sheet: String,
    /// Row index within the sheet
    pub row: usize,
    pub housing_status: HousingStatus,
    pub sex: Sex,
    pub age: f64,
    /// Diagnosis codes, or [`NO_DIAGNOSIS_CODES`] when none were recorded
    pub associated_diagnosis_codes: String,
    pub specialty: String,
    pub length_of_stay: f64,
    /// ICU hours, 0 when none were recorded
    pub icu_hours: f64,
    pub discharge_status: String,
    /// Any T80-T87 procedural complication code
    pub complication: bool,
    /// Discharge status indicates death
    pub mortality: bool,
    /// Any time spent in intensive care
    pub icu_admission: bool,
    /// F10-F16 or F18-F19 substance use code
    pub drug_alcohol_disorder: bool,
    /// F2x, F3x or F4x code
    pub mental_illness: bool,
    /// Discharged at own risk
    pub discharge_against_advice: bool,
    pub specialty_group: String,
    pub age_band: AgeBand,
}

impl AnalysisRecord {
    /// `ln(length_of_stay)`, undefined for stays that are not positive
    #[must_use]
    pub fn log_length_of_stay(&self) -> Option<f64> {
        (self.length_of_stay > 0.0).then(|| self.length_of_stay.ln())
    }

    /// `ln(icu_hours)`; zero hours means "not admitted", not a zero duration
    #[must_use]
    pub fn log_icu_hours(&self) -> Option<f64> {
        (self.icu_hours > 0.0).then(|| self.icu_hours.ln())
    }
}

/// Flat row layout used for the Parquet export of the analysis record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub sheet: String,
    pub row: u64,
    pub housing_status: String,
    pub sex: String,
    pub age: f64,
    pub age_band: String,
    pub associated_diagnosis_codes: String,
    pub specialty: String,
    pub specialty_group: String,
    pub length_of_stay: f64,
    pub log_length_of_stay: Option<f64>,
    pub icu_hours: f64,
    pub log_icu_hours: Option<f64>,
    pub discharge_status: String,
    pub complication: bool,
    pub mortality: bool,
    pub icu_admission: bool,
    pub drug_alcohol_disorder: bool,
    pub mental_illness: bool,
    pub discharge_against_advice: bool,
}

impl From<&AnalysisRecord> for AnalysisRow {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            sheet: record.sheet.clone(),
            row: record.row as u64,
            housing_status: record.housing_status.to_string(),
            sex: record.sex.to_string(),
            age: record.age,
            age_band: record.age_band.to_string(),
            associated_diagnosis_codes: record.associated_diagnosis_codes.clone(),
            specialty: record.specialty.clone(),
            specialty_group: record.specialty_group.clone(),
            length_of_stay: record.length_of_stay,
            log_length_of_stay: record.log_length_of_stay(),
            icu_hours: record.icu_hours,
            log_icu_hours: record.log_icu_hours(),
            discharge_status: record.discharge_status.clone(),
            complication: record.complication,
            mortality: record.mortality,
            icu_admission: record.icu_admission,
            drug_alcohol_disorder: record.drug_alcohol_disorder,
            mental_illness: record.mental_illness,
            discharge_against_advice: record.discharge_against_advice,
        }
    }
}

impl AnalysisRow {
    /// Arrow fields traced from the row layout
    pub fn fields() -> Result<Vec<FieldRef>> {
        Ok(Vec::<FieldRef>::from_type::<Self>(
            TracingOptions::default().allow_null_fields(true),
        )?)
    }

    /// Convert analysis records to a single record batch
    pub fn to_record_batch(records: &[AnalysisRecord]) -> Result<RecordBatch> {
        let rows: Vec<Self> = records.iter().map(Self::from).collect();
        let fields = Self::fields()?;
        Ok(serde_arrow::to_record_batch(&fields, &rows)?)
    }

    /// Read rows back from a record batch
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        Ok(serde_arrow::from_record_batch(batch)?)
    }
}
