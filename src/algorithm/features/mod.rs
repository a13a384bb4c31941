//! Feature derivation
//!
//! Turns the raw sheets into the analysis record set. Rows outside the
//! specialty allow-list are counted and dropped before anything else looks
//! at them; rows with an invalid required field are rejected with a
//! [`RecordRejection`]. Everything else becomes exactly one
//! [`AnalysisRecord`], in sheet order then row order.

pub mod codes;
pub mod specialty;

pub use codes::CodeSet;
pub use specialty::{SURGICAL_SPECIALTIES, SpecialtyTable, default_specialty_groups};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use crate::models::{
    AdmissionField, AdmissionRecord, AgeBand, AnalysisRecord, HousingStatus, NO_DIAGNOSIS_CODES,
    RawAdmission, RawSheet, RecordRejection, RejectionReason,
};

/// Code sets and string rules used to compute the derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationRules {
    pub complication_codes: CodeSet,
    pub drug_alcohol_codes: CodeSet,
    pub mental_illness_codes: CodeSet,
    /// Matched case-insensitively anywhere in the discharge status
    pub death_indicators: Vec<String>,
    /// Discharge status that marks a discharge against medical advice
    pub own_risk_status: String,
    /// Raw specialty code to consolidated group
    pub specialty_groups: BTreeMap<String, String>,
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self {
            complication_codes: CodeSet::complications(),
            drug_alcohol_codes: CodeSet::drug_alcohol_disorders(),
            mental_illness_codes: CodeSet::mental_illnesses(),
            death_indicators: ["died", "death", "deceased", "expired"]
                .into_iter()
                .map(String::from)
                .collect(),
            own_risk_status: "Discharge at Own Risk".to_string(),
            specialty_groups: default_specialty_groups(),
        }
    }
}

/// Counts describing one derivation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivationSummary {
    /// Rows read across all sheets
    pub total_rows: usize,
    /// Rows whose specialty is not in the allow-list
    pub excluded_by_specialty: usize,
    /// Distinct specialties that were excluded
    pub excluded_specialties: BTreeSet<String>,
    pub rejected: usize,
    pub retained: usize,
    pub retained_domiciled: usize,
    pub retained_homeless: usize,
    /// Retained rows whose diagnosis codes were normalized to the sentinel
    pub missing_diagnosis_codes: usize,
    /// Retained rows whose ICU hours were normalized to 0
    pub missing_icu_hours: usize,
}

/// Output of one derivation pass
#[derive(Debug, Clone)]
pub struct Derivation {
    pub records: Arc<[AnalysisRecord]>,
    pub rejections: Vec<RecordRejection>,
    pub summary: DerivationSummary,
}

enum RowOutcome {
    Excluded(String),
    Rejected(RecordRejection),
    Retained(AnalysisRecord),
}

/// Derives analysis records for one specialty allow-list
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    rules: DerivationRules,
    specialties: SpecialtyTable,
    death_indicators: Vec<String>,
}

impl FeatureDeriver {
    #[must_use]
    pub fn new(rules: &DerivationRules, allow_list: &[String]) -> Self {
        Self {
            specialties: SpecialtyTable::new(allow_list, &rules.specialty_groups),
            death_indicators: rules
                .death_indicators
                .iter()
                .map(|d| d.to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            rules: rules.clone(),
        }
    }

    /// Union the sheets and derive the analysis record set
    #[must_use]
    pub fn derive(&self, sheets: &[RawSheet]) -> Derivation {
        let start = Instant::now();
        let mut summary = DerivationSummary::default();
        let mut records = Vec::new();
        let mut rejections = Vec::new();

        for sheet in sheets {
            debug!(
                "Deriving features for sheet '{}' ({}, {} rows)",
                sheet.name,
                sheet.housing_status,
                sheet.len()
            );
            for raw in &sheet.rows {
                summary.total_rows += 1;
                match self.classify(raw, sheet.housing_status) {
                    RowOutcome::Excluded(specialty) => {
                        summary.excluded_by_specialty += 1;
                        summary.excluded_specialties.insert(specialty);
                    }
                    RowOutcome::Rejected(rejection) => {
                        warn!("Rejected record: {rejection}");
                        summary.rejected += 1;
                        rejections.push(rejection);
                    }
                    RowOutcome::Retained(record) => {
                        if raw.field(AdmissionField::AssociatedDiagnosisCodes).is_none() {
                            summary.missing_diagnosis_codes += 1;
                        }
                        if raw.field(AdmissionField::IcuHours).is_none() {
                            summary.missing_icu_hours += 1;
                        }
                        match record.housing_status {
                            HousingStatus::Domiciled => summary.retained_domiciled += 1,
                            HousingStatus::Homeless => summary.retained_homeless += 1,
                        }
                        records.push(record);
                    }
                }
            }
        }
        summary.retained = records.len();

        info!(
            "Derived {} analysis records from {} rows ({} outside allow-list, {} rejected) in {:?}",
            summary.retained,
            summary.total_rows,
            summary.excluded_by_specialty,
            summary.rejected,
            start.elapsed()
        );

        Derivation {
            records: records.into(),
            rejections,
            summary,
        }
    }

    fn classify(&self, raw: &RawAdmission, housing_status: HousingStatus) -> RowOutcome {
        let Some(specialty) = raw.field(AdmissionField::Specialty) else {
            return RowOutcome::Rejected(RecordRejection {
                sheet: raw.sheet.clone(),
                row: raw.row,
                housing_status,
                field: AdmissionField::Specialty.column_name().to_string(),
                reason: RejectionReason::Missing,
            });
        };
        if !self.specialties.is_allowed(specialty) {
            return RowOutcome::Excluded(specialty.to_string());
        }
        match AdmissionRecord::from_raw(raw, housing_status) {
            Ok(admission) => RowOutcome::Retained(self.derive_record(admission)),
            Err(rejection) => RowOutcome::Rejected(rejection),
        }
    }

    /// Normalize and compute the derived fields of one validated admission
    #[must_use]
    pub fn derive_record(&self, admission: AdmissionRecord) -> AnalysisRecord {
        let codes = admission
            .associated_diagnosis_codes
            .unwrap_or_else(|| NO_DIAGNOSIS_CODES.to_string());
        let icu_hours = admission.icu_hours.unwrap_or(0.0);
        let status = admission.discharge_status.to_lowercase();

        AnalysisRecord {
            complication: self.rules.complication_codes.matches(&codes),
            drug_alcohol_disorder: self.rules.drug_alcohol_codes.matches(&codes),
            mental_illness: self.rules.mental_illness_codes.matches(&codes),
            mortality: self
                .death_indicators
                .iter()
                .any(|indicator| status.contains(indicator.as_str())),
            discharge_against_advice: admission.discharge_status == self.rules.own_risk_status,
            icu_admission: icu_hours > 0.0,
            specialty_group: self.specialties.group(&admission.specialty),
            age_band: AgeBand::from_age(admission.age),
            sheet: admission.sheet,
            row: admission.row,
            housing_status: admission.housing_status,
            sex: admission.sex,
            age: admission.age,
            associated_diagnosis_codes: codes,
            specialty: admission.specialty,
            length_of_stay: admission.length_of_stay,
            icu_hours,
            discharge_status: admission.discharge_status,
        }
    }
}
