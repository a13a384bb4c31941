//! Raw admission records
//!
//! One row per hospital admission as read from a sheet, before any
//! derivation. Every field is kept as the sheet's text so that missing and
//! unparseable values can be told apart when the record is validated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Housing status of the group a sheet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HousingStatus {
    Domiciled,
    Homeless,
}

impl HousingStatus {
    /// Both groups in table column order
    pub const ALL: [Self; 2] = [Self::Domiciled, Self::Homeless];

    #[must_use]
    pub const fn is_homeless(self) -> bool {
        matches!(self, Self::Homeless)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Domiciled => "domiciled",
            Self::Homeless => "homeless",
        }
    }

    /// Column index in a contingency table
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Domiciled => 0,
            Self::Homeless => 1,
        }
    }
}

impl fmt::Display for HousingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HousingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "domiciled" => Ok(Self::Domiciled),
            "homeless" => Ok(Self::Homeless),
            other => Err(format!(
                "unknown housing status '{other}' (expected domiciled or homeless)"
            )),
        }
    }
}

/// Patient sex as recorded on the admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    #[must_use]
    pub const fn is_male(self) -> bool {
        matches!(self, Self::Male)
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => f.write_str("M"),
            Self::Female => f.write_str("F"),
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            other => Err(format!("'{other}' is not a recognised sex")),
        }
    }
}

/// Fields of a raw admission row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionField {
    Sex,
    Age,
    AssociatedDiagnosisCodes,
    Specialty,
    LengthOfStay,
    IcuHours,
    DischargeStatus,
}

impl AdmissionField {
    pub const ALL: [Self; 7] = [
        Self::Sex,
        Self::Age,
        Self::AssociatedDiagnosisCodes,
        Self::Specialty,
        Self::LengthOfStay,
        Self::IcuHours,
        Self::DischargeStatus,
    ];

    /// Canonical (normalized) column name
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Sex => "sex",
            Self::Age => "age",
            Self::AssociatedDiagnosisCodes => "associated_diagnosis_codes",
            Self::Specialty => "specialty",
            Self::LengthOfStay => "length_of_stay",
            Self::IcuHours => "icu_hours",
            Self::DischargeStatus => "discharge_status",
        }
    }

    /// Whether a record without this field can be recovered by normalization
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::AssociatedDiagnosisCodes | Self::IcuHours)
    }
}

impl fmt::Display for AdmissionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// An admission row exactly as read, tagged with its source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawAdmission {
    pub sheet: String,
    pub row: usize,
    pub sex: Option<String>,
    pub age: Option<String>,
    pub associated_diagnosis_codes: Option<String>,
    pub specialty: Option<String>,
    pub length_of_stay: Option<String>,
    pub icu_hours: Option<String>,
    pub discharge_status: Option<String>,
}

impl RawAdmission {
    /// Raw text of a field, `None` when missing or blank
    #[must_use]
    pub fn field(&self, field: AdmissionField) -> Option<&str> {
        let value = match field {
            AdmissionField::Sex => &self.sex,
            AdmissionField::Age => &self.age,
            AdmissionField::AssociatedDiagnosisCodes => &self.associated_diagnosis_codes,
            AdmissionField::Specialty => &self.specialty,
            AdmissionField::LengthOfStay => &self.length_of_stay,
            AdmissionField::IcuHours => &self.icu_hours,
            AdmissionField::DischargeStatus => &self.discharge_status,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set_field(&mut self, field: AdmissionField, value: Option<String>) {
        let slot = match field {
            AdmissionField::Sex => &mut self.sex,
            AdmissionField::Age => &mut self.age,
            AdmissionField::AssociatedDiagnosisCodes => &mut self.associated_diagnosis_codes,
            AdmissionField::Specialty => &mut self.specialty,
            AdmissionField::LengthOfStay => &mut self.length_of_stay,
            AdmissionField::IcuHours => &mut self.icu_hours,
            AdmissionField::DischargeStatus => &mut self.discharge_status,
        };
        *slot = value;
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    /// A required field is absent or blank
    Missing,
    /// A field could not be parsed
    Unparseable(String),
    /// A numeric field is outside its valid range
    OutOfRange(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("required field is missing"),
            Self::Unparseable(detail) => write!(f, "unparseable value: {detail}"),
            Self::OutOfRange(detail) => write!(f, "value out of range: {detail}"),
        }
    }
}

/// A record that could not enter the analysis, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRejection {
    pub sheet: String,
    pub row: usize,
    pub housing_status: HousingStatus,
    pub field: String,
    pub reason: RejectionReason,
}

impl fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sheet '{}' row {} ({}): field {}: {}",
            self.sheet, self.row, self.housing_status, self.field, self.reason
        )
    }
}

/// A validated admission record
///
/// Diagnosis codes and ICU hours stay optional here; normalization happens
/// during feature derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRecord {
    pub sheet: String,
    pub row: usize,
    pub housing_status: HousingStatus,
    pub sex: Sex,
    pub age: f64,
    pub associated_diagnosis_codes: Option<String>,
    pub specialty: String,
    pub length_of_stay: f64,
    pub icu_hours: Option<f64>,
    pub discharge_status: String,
}

impl AdmissionRecord {
    /// Validate a raw row
    ///
    /// The first failing field is reported; a record is either fully valid
    /// or rejected.
    pub fn from_raw(
        raw: &RawAdmission,
        housing_status: HousingStatus,
    ) -> Result<Self, RecordRejection> {
        let reject = |field: AdmissionField, reason: RejectionReason| RecordRejection {
            sheet: raw.sheet.clone(),
            row: raw.row,
            housing_status,
            field: field.column_name().to_string(),
            reason,
        };
        let required = |field: AdmissionField| {
            raw.field(field)
                .ok_or_else(|| reject(field, RejectionReason::Missing))
        };
        let number = |field: AdmissionField, text: &str| {
            text.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| reject(field, RejectionReason::Unparseable(text.to_string())))
        };
        let non_negative = |field: AdmissionField, value: f64| {
            if value < 0.0 {
                Err(reject(
                    field,
                    RejectionReason::OutOfRange(format!("{value} is negative")),
                ))
            } else {
                Ok(value)
            }
        };

        let sex_text = required(AdmissionField::Sex)?;
        let sex = sex_text
            .parse::<Sex>()
            .map_err(|e| reject(AdmissionField::Sex, RejectionReason::Unparseable(e)))?;

        let age = number(AdmissionField::Age, required(AdmissionField::Age)?)?;
        let age = non_negative(AdmissionField::Age, age)?;

        let specialty = required(AdmissionField::Specialty)?.to_string();

        let length_of_stay = number(
            AdmissionField::LengthOfStay,
            required(AdmissionField::LengthOfStay)?,
        )?;
        let length_of_stay = non_negative(AdmissionField::LengthOfStay, length_of_stay)?;

        let icu_hours = match raw.field(AdmissionField::IcuHours) {
            Some(text) => Some(non_negative(
                AdmissionField::IcuHours,
                number(AdmissionField::IcuHours, text)?,
            )?),
            None => None,
        };

        let discharge_status = required(AdmissionField::DischargeStatus)?.to_string();

        Ok(Self {
            sheet: raw.sheet.clone(),
            row: raw.row,
            housing_status,
            sex,
            age,
            associated_diagnosis_codes: raw
                .field(AdmissionField::AssociatedDiagnosisCodes)
                .map(str::to_string),
            specialty,
            length_of_stay,
            icu_hours,
            discharge_status,
        })
    }
}

/// All rows of one sheet, tagged with the sheet's housing status
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub housing_status: HousingStatus,
    pub rows: Vec<RawAdmission>,
}

impl RawSheet {
    #[must_use]
    pub fn new(name: impl Into<String>, housing_status: HousingStatus) -> Self {
        Self {
            name: name.into(),
            housing_status,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
